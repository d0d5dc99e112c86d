//! In-process store for tests and local development.

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::broadcast;
use uuid::Uuid;

use super::{CHANGE_CHANNEL_CAPACITY, Collection, ContentStore, StoreError, StoreResult};
use crate::models::{Feedback, FeedbackStatus, MediaItem, Post};

/// Store that keeps every collection in memory.
///
/// Notifications are sent synchronously after each write, mirroring the
/// trigger-driven notifications of the PostgreSQL backend.
pub struct MemoryContentStore {
    posts: RwLock<Vec<Post>>,
    media: RwLock<Vec<MediaItem>>,
    feedback: RwLock<Vec<Feedback>>,
    changes: broadcast::Sender<Collection>,
    /// When set, every write fails. Used to exercise error paths.
    fail_writes: RwLock<Option<Collection>>,
}

impl MemoryContentStore {
    /// Create an empty store.
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            posts: RwLock::new(Vec::new()),
            media: RwLock::new(Vec::new()),
            feedback: RwLock::new(Vec::new()),
            changes,
            fail_writes: RwLock::new(None),
        }
    }

    /// Make writes to `collection` fail until cleared with `None`.
    pub fn fail_writes_to(&self, collection: Option<Collection>) {
        *self.fail_writes.write() = collection;
    }

    fn check_writable(&self, collection: Collection) -> StoreResult<()> {
        if *self.fail_writes.read() == Some(collection) {
            return Err(StoreError::Unavailable(format!(
                "writes to {} are disabled",
                collection.as_str()
            )));
        }
        Ok(())
    }

    fn notify(&self, collection: Collection) {
        // Ignore the SendError: it only means there are zero receivers.
        let _ = self.changes.send(collection);
    }
}

impl Default for MemoryContentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryContentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryContentStore")
            .field("posts", &self.posts.read().len())
            .field("media", &self.media.read().len())
            .field("feedback", &self.feedback.read().len())
            .finish()
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn list_posts(&self) -> StoreResult<Vec<Post>> {
        let mut posts = self.posts.read().clone();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(posts)
    }

    async fn list_posts_page(&self, limit: i64, offset: i64) -> StoreResult<Vec<Post>> {
        let posts = self.list_posts().await?;
        let offset = usize::try_from(offset.max(0)).unwrap_or(usize::MAX);
        let limit = usize::try_from(limit.max(0)).unwrap_or(usize::MAX);
        Ok(posts.into_iter().skip(offset).take(limit).collect())
    }

    async fn get_post(&self, id: Uuid) -> StoreResult<Option<Post>> {
        Ok(self.posts.read().iter().find(|p| p.id == id).cloned())
    }

    async fn insert_post(&self, post: &Post) -> StoreResult<()> {
        self.check_writable(Collection::Posts)?;
        {
            let mut posts = self.posts.write();
            if posts.iter().any(|p| p.id == post.id) {
                return Err(StoreError::Conflict(format!("post {} already exists", post.id)));
            }
            posts.push(post.clone());
        }
        self.notify(Collection::Posts);
        Ok(())
    }

    async fn replace_post(&self, post: &Post) -> StoreResult<()> {
        self.check_writable(Collection::Posts)?;
        {
            let mut posts = self.posts.write();
            let Some(existing) = posts.iter_mut().find(|p| p.id == post.id) else {
                return Err(StoreError::NotFound);
            };
            *existing = post.clone();
        }
        self.notify(Collection::Posts);
        Ok(())
    }

    async fn delete_post(&self, id: Uuid) -> StoreResult<bool> {
        self.check_writable(Collection::Posts)?;
        let removed = {
            let mut posts = self.posts.write();
            let before = posts.len();
            posts.retain(|p| p.id != id);
            posts.len() != before
        };
        if removed {
            self.notify(Collection::Posts);
        }
        Ok(removed)
    }

    async fn list_media(&self) -> StoreResult<Vec<MediaItem>> {
        let mut media = self.media.read().clone();
        media.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at).then(b.id.cmp(&a.id)));
        Ok(media)
    }

    async fn insert_media(&self, item: &MediaItem) -> StoreResult<()> {
        self.check_writable(Collection::Media)?;
        self.media.write().push(item.clone());
        self.notify(Collection::Media);
        Ok(())
    }

    async fn delete_media(&self, id: Uuid) -> StoreResult<bool> {
        self.check_writable(Collection::Media)?;
        let removed = {
            let mut media = self.media.write();
            let before = media.len();
            media.retain(|m| m.id != id);
            media.len() != before
        };
        if removed {
            self.notify(Collection::Media);
        }
        Ok(removed)
    }

    async fn insert_feedback(&self, feedback: &Feedback) -> StoreResult<()> {
        self.check_writable(Collection::Feedback)?;
        self.feedback.write().push(feedback.clone());
        self.notify(Collection::Feedback);
        Ok(())
    }

    async fn list_feedback(&self) -> StoreResult<Vec<Feedback>> {
        let mut feedback = self.feedback.read().clone();
        feedback.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(feedback)
    }

    async fn set_feedback_status(&self, id: Uuid, status: FeedbackStatus) -> StoreResult<bool> {
        self.check_writable(Collection::Feedback)?;
        let updated = {
            let mut feedback = self.feedback.write();
            match feedback.iter_mut().find(|f| f.id == id) {
                Some(record) => {
                    record.status = status;
                    true
                }
                None => false,
            }
        };
        if updated {
            self.notify(Collection::Feedback);
        }
        Ok(updated)
    }

    async fn delete_feedback(&self, id: Uuid) -> StoreResult<bool> {
        self.check_writable(Collection::Feedback)?;
        let removed = {
            let mut feedback = self.feedback.write();
            let before = feedback.len();
            feedback.retain(|f| f.id != id);
            feedback.len() != before
        };
        if removed {
            self.notify(Collection::Feedback);
        }
        Ok(removed)
    }

    fn subscribe(&self) -> broadcast::Receiver<Collection> {
        self.changes.subscribe()
    }

    async fn healthy(&self) -> bool {
        true
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::models::CreatePost;
    use chrono::{Duration, Utc};

    fn post(title: &str, age_secs: i64) -> Post {
        CreatePost {
            title: title.to_string(),
            ..Default::default()
        }
        .into_post(
            Uuid::now_v7(),
            crate::content::slug::slugify(title),
            Utc::now() - Duration::seconds(age_secs),
        )
    }

    #[tokio::test]
    async fn writes_notify_subscribers() {
        let store = MemoryContentStore::new();
        let mut rx = store.subscribe();

        store.insert_post(&post("One", 0)).await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), Collection::Posts);
    }

    #[tokio::test]
    async fn posts_are_listed_newest_first_and_paged() {
        let store = MemoryContentStore::new();
        store.insert_post(&post("Old", 30)).await.unwrap();
        store.insert_post(&post("New", 0)).await.unwrap();
        store.insert_post(&post("Mid", 10)).await.unwrap();

        let titles: Vec<_> = store
            .list_posts()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.title)
            .collect();
        assert_eq!(titles, ["New", "Mid", "Old"]);

        let page = store.list_posts_page(2, 2).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].title, "Old");
    }

    #[tokio::test]
    async fn failing_writes_surface_as_errors() {
        let store = MemoryContentStore::new();
        store.fail_writes_to(Some(Collection::Posts));
        assert!(store.insert_post(&post("Nope", 0)).await.is_err());

        store.fail_writes_to(None);
        assert!(store.insert_post(&post("Yes", 0)).await.is_ok());
    }

    #[tokio::test]
    async fn replace_missing_post_is_not_found() {
        let store = MemoryContentStore::new();
        let err = store.replace_post(&post("Ghost", 0)).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
    }
}
