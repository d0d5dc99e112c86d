//! Media library.
//!
//! Lists uploaded assets from the content snapshot, uploads batches of
//! files, and picks an item for insertion into the editor.

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::content::ContentContext;
use crate::error::{ContentError, ContentResult};
use crate::file::UploadFile;
use crate::models::MediaItem;

/// Whether a destructive action was confirmed by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Confirmed,
    Declined,
}

impl Confirmation {
    pub fn from_flag(confirmed: bool) -> Self {
        if confirmed {
            Confirmation::Confirmed
        } else {
            Confirmation::Declined
        }
    }
}

/// Outcome for one file of a batch upload, in input order.
#[derive(Debug)]
pub struct BatchOutcome {
    pub name: String,
    pub result: ContentResult<MediaItem>,
}

/// Media library bound to a content context.
#[derive(Debug, Clone)]
pub struct MediaLibrary {
    ctx: ContentContext,
}

impl MediaLibrary {
    pub fn new(ctx: ContentContext) -> Self {
        Self { ctx }
    }

    /// All items, newest first.
    pub fn items(&self) -> Vec<MediaItem> {
        self.ctx.media()
    }

    /// Image items only, newest first.
    pub fn images(&self) -> Vec<MediaItem> {
        self.ctx.media().into_iter().filter(MediaItem::is_image).collect()
    }

    /// Start picking an item to insert.
    pub fn selection(&self) -> MediaSelection {
        MediaSelection {
            items: self.items(),
            selected: None,
        }
    }

    /// Upload files concurrently.
    ///
    /// Each file succeeds or fails on its own; one failure does not abort
    /// the others. Cancelling abandons the uploads still in flight.
    pub async fn upload_batch(
        &self,
        files: Vec<UploadFile>,
        cancel: &CancellationToken,
    ) -> Vec<BatchOutcome> {
        let names: Vec<String> = files.iter().map(|f| f.name.clone()).collect();
        let mut results: Vec<Option<ContentResult<MediaItem>>> =
            std::iter::repeat_with(|| None).take(files.len()).collect();

        let mut tasks = JoinSet::new();
        for (index, file) in files.into_iter().enumerate() {
            let ctx = self.ctx.clone();
            let cancel = cancel.clone();
            tasks.spawn(async move { (index, ctx.upload_image(file, |_| {}, &cancel).await) });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => results[index] = Some(result),
                Err(e) => warn!(error = %e, "upload task failed to complete"),
            }
        }

        let outcomes: Vec<BatchOutcome> = names
            .into_iter()
            .zip(results)
            .map(|(name, result)| BatchOutcome {
                name,
                result: result.unwrap_or_else(|| {
                    Err(ContentError::Upload(anyhow::anyhow!("upload task aborted")))
                }),
            })
            .collect();

        let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
        info!(total = outcomes.len(), failed, "batch upload finished");
        outcomes
    }

    /// Delete an item after explicit confirmation.
    pub async fn delete(&self, item: &MediaItem, confirmation: Confirmation) -> ContentResult<()> {
        if confirmation == Confirmation::Declined {
            return Err(ContentError::Validation(
                "deleting media requires confirmation".to_string(),
            ));
        }
        self.ctx.delete_media(item).await
    }

    /// Delete by id, looking the item up in the snapshot.
    pub async fn delete_by_id(&self, id: Uuid, confirmation: Confirmation) -> ContentResult<()> {
        let item = self.ctx.media_by_id(id).ok_or(ContentError::NotFound)?;
        self.delete(&item, confirmation).await
    }
}

/// An open media picker.
///
/// Confirming returns the selected item; closing without a selection
/// returns nothing and has no effect.
#[derive(Debug)]
pub struct MediaSelection {
    items: Vec<MediaItem>,
    selected: Option<usize>,
}

impl MediaSelection {
    pub fn items(&self) -> &[MediaItem] {
        &self.items
    }

    /// Select an item. Returns false if the id is not in the list.
    pub fn select(&mut self, id: Uuid) -> bool {
        match self.items.iter().position(|m| m.id == id) {
            Some(index) => {
                self.selected = Some(index);
                true
            }
            None => false,
        }
    }

    pub fn selected(&self) -> Option<&MediaItem> {
        self.selected.and_then(|i| self.items.get(i))
    }

    pub fn confirm(mut self) -> Option<MediaItem> {
        let index = self.selected?;
        Some(self.items.swap_remove(index))
    }

    pub fn cancel(self) {}
}
