//! Document store for posts, media and feedback.
//!
//! The store is the remote source of truth. Readers never query it per
//! request; they subscribe to change notifications and keep a snapshot (see
//! [`crate::content::ContentContext`]).

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::{Feedback, FeedbackStatus, MediaItem, Post};

pub use memory::MemoryContentStore;
pub use postgres::PgContentStore;

/// Buffer size for change notifications.
pub(crate) const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// Store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error")]
    Database(#[from] sqlx::Error),

    #[error("record not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Result type alias using StoreError.
pub type StoreResult<T> = Result<T, StoreError>;

/// A named collection whose contents changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Posts,
    Media,
    Feedback,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Posts => "posts",
            Collection::Media => "media",
            Collection::Feedback => "feedback",
        }
    }

    /// Parse a notification payload (the table name).
    pub fn from_table(name: &str) -> Option<Self> {
        match name {
            "posts" => Some(Collection::Posts),
            "media" => Some(Collection::Media),
            "feedback" => Some(Collection::Feedback),
            _ => None,
        }
    }
}

/// Document store backend.
///
/// Writes are direct calls against a named collection. Every successful
/// write produces a [`Collection`] notification for subscribers, possibly
/// from another process.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// All posts, newest first.
    async fn list_posts(&self) -> StoreResult<Vec<Post>>;

    /// One page of posts, newest first.
    async fn list_posts_page(&self, limit: i64, offset: i64) -> StoreResult<Vec<Post>>;

    /// Fetch a post by id.
    async fn get_post(&self, id: Uuid) -> StoreResult<Option<Post>>;

    /// Insert a new post.
    async fn insert_post(&self, post: &Post) -> StoreResult<()>;

    /// Overwrite an existing post. Last write wins.
    async fn replace_post(&self, post: &Post) -> StoreResult<()>;

    /// Delete a post. Returns false if it did not exist.
    async fn delete_post(&self, id: Uuid) -> StoreResult<bool>;

    /// All media items, newest first.
    async fn list_media(&self) -> StoreResult<Vec<MediaItem>>;

    /// Insert a media record.
    async fn insert_media(&self, item: &MediaItem) -> StoreResult<()>;

    /// Delete a media record. Returns false if it did not exist.
    async fn delete_media(&self, id: Uuid) -> StoreResult<bool>;

    /// Insert a feedback record.
    async fn insert_feedback(&self, feedback: &Feedback) -> StoreResult<()>;

    /// All feedback, newest first.
    async fn list_feedback(&self) -> StoreResult<Vec<Feedback>>;

    /// Change the triage status. Returns false if the record did not exist.
    async fn set_feedback_status(&self, id: Uuid, status: FeedbackStatus) -> StoreResult<bool>;

    /// Delete a feedback record. Returns false if it did not exist.
    async fn delete_feedback(&self, id: Uuid) -> StoreResult<bool>;

    /// Subscribe to change notifications.
    fn subscribe(&self) -> broadcast::Receiver<Collection>;

    /// Check if the backend is reachable.
    async fn healthy(&self) -> bool;
}
