//! Process-wide view of posts and media.
//!
//! The context keeps a snapshot of the posts and media collections, fed by
//! the store's change notifications. Reads are served from the snapshot
//! and never touch the store. Writes go straight to the store and are
//! fire-and-invalidate: their effect shows up once the notification comes
//! back and the snapshot is refreshed.

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::editor::ImageUploader;
use super::slug::unique_slug;
use crate::error::{ContentError, ContentResult};
use crate::file::{FileStorage, UploadFile, storage_filename, validate_upload};
use crate::models::{CreatePost, MediaItem, Post, UpdatePost};
use crate::store::{Collection, ContentStore, StoreError};

/// Immutable view of the cached collections.
#[derive(Debug, Clone, Default)]
pub struct ContentSnapshot {
    /// Incremented on every refresh.
    pub version: u64,
    /// Newest first.
    pub posts: Vec<Post>,
    /// Newest first.
    pub media: Vec<MediaItem>,
}

/// Shared content context. Cheap to clone.
#[derive(Clone)]
pub struct ContentContext {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    store: Arc<dyn ContentStore>,
    storage: Arc<dyn FileStorage>,
    snapshot: watch::Sender<Arc<ContentSnapshot>>,
    shutdown: CancellationToken,
    refresher: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for ContextInner {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl std::fmt::Debug for ContentContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let snapshot = self.snapshot();
        f.debug_struct("ContentContext")
            .field("version", &snapshot.version)
            .field("posts", &snapshot.posts.len())
            .field("media", &snapshot.media.len())
            .finish()
    }
}

/// Collections that need reloading.
#[derive(Debug, Default, Clone, Copy)]
struct Dirty {
    posts: bool,
    media: bool,
}

impl Dirty {
    fn mark(&mut self, collection: Collection) {
        match collection {
            Collection::Posts => self.posts = true,
            Collection::Media => self.media = true,
            Collection::Feedback => {}
        }
    }

    fn all() -> Self {
        Self {
            posts: true,
            media: true,
        }
    }

    fn any(&self) -> bool {
        self.posts || self.media
    }
}

impl ContentContext {
    /// Load the initial snapshot and start following store changes.
    pub async fn start(
        store: Arc<dyn ContentStore>,
        storage: Arc<dyn FileStorage>,
    ) -> ContentResult<Self> {
        // Subscribe before the initial load so no change is missed.
        let changes = store.subscribe();
        let posts = store.list_posts().await?;
        let media = store.list_media().await?;

        let (snapshot, _) = watch::channel(Arc::new(ContentSnapshot {
            version: 0,
            posts,
            media,
        }));

        let shutdown = CancellationToken::new();
        let inner = Arc::new(ContextInner {
            store,
            storage,
            snapshot,
            shutdown: shutdown.clone(),
            refresher: Mutex::new(None),
        });

        let handle = tokio::spawn(refresh_loop(Arc::downgrade(&inner), changes, shutdown));
        *inner.refresher.lock() = Some(handle);

        let snapshot = inner.snapshot.borrow().clone();
        info!(
            posts = snapshot.posts.len(),
            media = snapshot.media.len(),
            "content context started"
        );

        Ok(Self { inner })
    }

    /// Stop following store changes. The last snapshot stays readable.
    pub async fn shutdown(&self) {
        self.inner.shutdown.cancel();
        let handle = self.inner.refresher.lock().take();
        if let Some(handle) = handle
            && let Err(e) = handle.await
        {
            warn!(error = %e, "content refresh task ended abnormally");
        }
        debug!("content context stopped");
    }

    pub fn store(&self) -> &Arc<dyn ContentStore> {
        &self.inner.store
    }

    pub fn storage(&self) -> &Arc<dyn FileStorage> {
        &self.inner.storage
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> Arc<ContentSnapshot> {
        self.inner.snapshot.borrow().clone()
    }

    /// Receiver that observes every future snapshot (last one wins).
    pub fn subscribe(&self) -> watch::Receiver<Arc<ContentSnapshot>> {
        self.inner.snapshot.subscribe()
    }

    /// Wait for the next snapshot after the current one.
    ///
    /// Returns None once the context is shut down.
    pub async fn changed(&self) -> Option<Arc<ContentSnapshot>> {
        let mut rx = self.subscribe();
        let changed = tokio::select! {
            _ = self.inner.shutdown.cancelled() => false,
            res = rx.changed() => res.is_ok(),
        };
        changed.then(|| rx.borrow().clone())
    }

    /// Wait until a snapshot satisfies `pred`, checking the current one first.
    pub async fn wait_until(
        &self,
        mut pred: impl FnMut(&ContentSnapshot) -> bool,
    ) -> Option<Arc<ContentSnapshot>> {
        let mut rx = self.subscribe();
        tokio::select! {
            _ = self.inner.shutdown.cancelled() => None,
            res = rx.wait_for(|snap: &Arc<ContentSnapshot>| pred(snap)) => {
                res.ok().map(|snap| Arc::clone(&*snap))
            }
        }
    }

    /// All posts, newest first.
    pub fn list(&self) -> Vec<Post> {
        self.snapshot().posts.clone()
    }

    /// Published posts, newest first.
    pub fn published(&self) -> Vec<Post> {
        self.snapshot()
            .posts
            .iter()
            .filter(|p| p.is_published())
            .cloned()
            .collect()
    }

    /// Look up a post by slug (case-insensitive).
    pub fn get_by_slug(&self, slug: &str) -> Option<Post> {
        let slug = slug.trim();
        self.snapshot()
            .posts
            .iter()
            .find(|p| p.slug.eq_ignore_ascii_case(slug))
            .cloned()
    }

    pub fn get_by_id(&self, id: Uuid) -> Option<Post> {
        self.snapshot().posts.iter().find(|p| p.id == id).cloned()
    }

    /// All media, newest first.
    pub fn media(&self) -> Vec<MediaItem> {
        self.snapshot().media.clone()
    }

    pub fn media_by_id(&self, id: Uuid) -> Option<MediaItem> {
        self.snapshot().media.iter().find(|m| m.id == id).cloned()
    }

    /// Slug not used by any other post in the current snapshot.
    fn unique_post_slug(&self, base: &str, id: Uuid) -> String {
        let snapshot = self.snapshot();
        unique_slug(base, |candidate| {
            snapshot
                .posts
                .iter()
                .any(|p| p.id != id && p.slug == candidate)
        })
    }

    /// Create a post. Returns its id.
    pub async fn create(&self, data: CreatePost) -> ContentResult<Uuid> {
        if data.title.trim().is_empty() {
            return Err(ContentError::Validation("title is required".to_string()));
        }

        let id = Uuid::now_v7();
        let slug = self.unique_post_slug(&data.base_slug(id), id);
        let post = data.into_post(id, slug, Utc::now());

        self.inner.store.insert_post(&post).await.map_err(|e| {
            warn!(error = %e, post_id = %id, "failed to create post");
            ContentError::StoreWrite(e)
        })?;

        info!(post_id = %id, slug = %post.slug, status = %post.status, "post created");
        Ok(id)
    }

    /// Apply a partial update and return the saved record.
    ///
    /// Reads the current record from the store so an update right after a
    /// create does not depend on the snapshot having caught up. Concurrent
    /// updates race; the last write wins.
    pub async fn update(&self, id: Uuid, patch: UpdatePost) -> ContentResult<Post> {
        if patch.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err(ContentError::Validation("title is required".to_string()));
        }

        let mut post = self
            .inner
            .store
            .get_post(id)
            .await?
            .ok_or(ContentError::NotFound)?;

        post.apply_patch(patch, Utc::now(), |base| self.unique_post_slug(&base, id));

        self.inner
            .store
            .replace_post(&post)
            .await
            .map_err(|e| match e {
                StoreError::NotFound => ContentError::NotFound,
                e => {
                    warn!(error = %e, post_id = %id, "failed to update post");
                    ContentError::StoreWrite(e)
                }
            })?;

        info!(post_id = %id, slug = %post.slug, status = %post.status, "post updated");
        Ok(post)
    }

    /// Delete a post. Media it references is left alone.
    pub async fn delete(&self, id: Uuid) -> ContentResult<()> {
        let deleted = self.inner.store.delete_post(id).await.map_err(|e| {
            warn!(error = %e, post_id = %id, "failed to delete post");
            ContentError::StoreWrite(e)
        })?;
        if !deleted {
            return Err(ContentError::NotFound);
        }
        info!(post_id = %id, "post deleted");
        Ok(())
    }

    /// Upload an image and record it in the media library.
    ///
    /// `on_progress` receives a percentage after each stored chunk.
    /// Cancelling abandons the upload and removes whatever was written; bytes
    /// already sent are not recalled. If the object is stored but the record
    /// cannot be written, the error carries the URL.
    pub async fn upload_image(
        &self,
        file: UploadFile,
        mut on_progress: impl FnMut(u8) + Send,
        cancel: &CancellationToken,
    ) -> ContentResult<MediaItem> {
        let mime_type = validate_upload(&file)?;

        let id = Uuid::now_v7();
        let now = Utc::now();
        let filename = storage_filename(&file.name, now, id);
        let storage = &self.inner.storage;
        let uri = storage.media_uri(&filename);
        let total = file.data.len() as u64;

        let written = {
            let mut report = |bytes: u64| on_progress(percent(bytes, total));
            let write = storage.write(&uri, &file.data, &mut report);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                res = write => Some(res),
            }
        };

        match written {
            None => {
                self.discard_object(&uri);
                info!(uri = %uri, "upload cancelled");
                return Err(ContentError::UploadCancelled);
            }
            Some(Err(e)) => {
                warn!(error = %e, uri = %uri, "upload failed");
                return Err(ContentError::Upload(e));
            }
            Some(Ok(())) if cancel.is_cancelled() => {
                self.discard_object(&uri);
                info!(uri = %uri, "upload cancelled after storing");
                return Err(ContentError::UploadCancelled);
            }
            Some(Ok(())) => {}
        }

        let url = storage.public_url(&uri);
        let item = MediaItem {
            id,
            url: url.clone(),
            storage_path: uri,
            filename,
            original_name: file.name,
            mime_type,
            size: total as i64,
            uploaded_at: now,
        };

        if let Err(source) = self.inner.store.insert_media(&item).await {
            error!(error = %source, url = %url, "stored upload has no media record");
            return Err(ContentError::MetadataWrite { url, source });
        }

        info!(media_id = %item.id, uri = %item.storage_path, size = item.size, "image uploaded");
        Ok(item)
    }

    /// Best-effort removal of an abandoned object.
    fn discard_object(&self, uri: &str) {
        let storage = Arc::clone(&self.inner.storage);
        let uri = uri.to_string();
        tokio::spawn(async move {
            if let Err(e) = storage.delete(&uri).await {
                debug!(error = %e, uri = %uri, "could not remove abandoned upload");
            }
        });
    }

    /// Delete a media item: the record first, then the stored object.
    ///
    /// A storage failure after the record is gone is logged, not rolled
    /// back. The record is authoritative for listings.
    pub async fn delete_media(&self, item: &MediaItem) -> ContentResult<()> {
        let deleted = self.inner.store.delete_media(item.id).await.map_err(|e| {
            warn!(error = %e, media_id = %item.id, "failed to delete media record");
            ContentError::StoreWrite(e)
        })?;
        if !deleted {
            return Err(ContentError::NotFound);
        }

        if let Err(e) = self.inner.storage.delete(&item.storage_path).await {
            warn!(
                error = %e,
                media_id = %item.id,
                uri = %item.storage_path,
                "media record deleted but stored object remains"
            );
        }

        info!(media_id = %item.id, "media deleted");
        Ok(())
    }
}

fn percent(written: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    (written.saturating_mul(100) / total).min(100) as u8
}

#[async_trait]
impl ImageUploader for ContentContext {
    async fn upload(&self, file: UploadFile) -> ContentResult<String> {
        match self
            .upload_image(file, |_| {}, &CancellationToken::new())
            .await
        {
            Ok(item) => Ok(item.url),
            // The asset exists; the editor can still use it.
            Err(ContentError::MetadataWrite { url, .. }) => Ok(url),
            Err(e) => Err(e),
        }
    }
}

/// Follow store notifications and refresh the snapshot.
///
/// Notifications that queue up while a refresh runs are coalesced into one
/// reload per collection.
async fn refresh_loop(
    inner: Weak<ContextInner>,
    mut changes: broadcast::Receiver<Collection>,
    shutdown: CancellationToken,
) {
    loop {
        let first = tokio::select! {
            _ = shutdown.cancelled() => break,
            msg = changes.recv() => msg,
        };

        let mut dirty = Dirty::default();
        match first {
            Ok(collection) => dirty.mark(collection),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "content notifications lagged, reloading everything");
                dirty = Dirty::all();
            }
            Err(broadcast::error::RecvError::Closed) => {
                debug!("content notification channel closed");
                break;
            }
        }

        loop {
            match changes.try_recv() {
                Ok(collection) => dirty.mark(collection),
                Err(broadcast::error::TryRecvError::Lagged(_)) => dirty = Dirty::all(),
                Err(_) => break,
            }
        }

        if !dirty.any() {
            continue;
        }
        let Some(inner) = inner.upgrade() else { break };
        inner.refresh(dirty).await;
    }
}

impl ContextInner {
    async fn refresh(&self, dirty: Dirty) {
        let posts = if dirty.posts {
            match self.store.list_posts().await {
                Ok(posts) => Some(posts),
                Err(e) => {
                    warn!(error = %e, "failed to reload posts, keeping previous snapshot");
                    None
                }
            }
        } else {
            None
        };

        let media = if dirty.media {
            match self.store.list_media().await {
                Ok(media) => Some(media),
                Err(e) => {
                    warn!(error = %e, "failed to reload media, keeping previous snapshot");
                    None
                }
            }
        } else {
            None
        };

        if posts.is_none() && media.is_none() {
            return;
        }

        self.snapshot.send_modify(|current| {
            let mut next = ContentSnapshot::clone(current);
            next.version += 1;
            if let Some(posts) = posts {
                next.posts = posts;
            }
            if let Some(media) = media {
                next.media = media;
            }
            *current = Arc::new(next);
        });
        debug!(posts = dirty.posts, media = dirty.media, "content snapshot refreshed");
    }
}
