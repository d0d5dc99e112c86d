//! PostgreSQL document store.
//!
//! Table triggers call `pg_notify('content_changes', <table>)`; a listener
//! task forwards those notifications to subscribers, so writes made by any
//! process reach every instance's snapshot.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::postgres::PgListener;
use sqlx::types::Json;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{CHANGE_CHANNEL_CAPACITY, Collection, ContentStore, StoreError, StoreResult};
use crate::models::{Feedback, FeedbackStatus, MediaItem, Post, PostStatus};

/// Notification channel used by the table triggers.
pub const NOTIFY_CHANNEL: &str = "content_changes";

/// Delay before re-listening after the notification connection fails.
const RELISTEN_DELAY: Duration = Duration::from_secs(2);

const POST_COLUMNS: &str = "id, title, slug, excerpt, content, featured_image, featured_badges, \
     author_name, author_title, status, toc_hidden, created_at, updated_at, published_at";

const MEDIA_COLUMNS: &str =
    "id, url, storage_path, filename, original_name, mime_type, size, uploaded_at";

const FEEDBACK_COLUMNS: &str = "id, name, email, message, status, source, created_at";

/// Database row for a post.
#[derive(sqlx::FromRow)]
struct PostRow {
    id: Uuid,
    title: String,
    slug: String,
    excerpt: String,
    content: String,
    featured_image: Option<String>,
    featured_badges: Json<Vec<String>>,
    author_name: String,
    author_title: String,
    status: String,
    toc_hidden: Json<Vec<String>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    published_at: Option<DateTime<Utc>>,
}

impl From<PostRow> for Post {
    fn from(row: PostRow) -> Self {
        let status = row.status.parse().unwrap_or_else(|e: String| {
            warn!(post_id = %row.id, error = %e, "unknown post status, treating as draft");
            PostStatus::Draft
        });
        Self {
            id: row.id,
            title: row.title,
            slug: row.slug,
            excerpt: row.excerpt,
            content: row.content,
            featured_image: row.featured_image,
            featured_badges: row.featured_badges.0,
            author_name: row.author_name,
            author_title: row.author_title,
            status,
            toc_hidden: row.toc_hidden.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
            published_at: row.published_at,
        }
    }
}

/// Database row for a media item.
#[derive(sqlx::FromRow)]
struct MediaRow {
    id: Uuid,
    url: String,
    storage_path: String,
    filename: String,
    original_name: String,
    mime_type: String,
    size: i64,
    uploaded_at: DateTime<Utc>,
}

impl From<MediaRow> for MediaItem {
    fn from(row: MediaRow) -> Self {
        Self {
            id: row.id,
            url: row.url,
            storage_path: row.storage_path,
            filename: row.filename,
            original_name: row.original_name,
            mime_type: row.mime_type,
            size: row.size,
            uploaded_at: row.uploaded_at,
        }
    }
}

/// Database row for feedback.
#[derive(sqlx::FromRow)]
struct FeedbackRow {
    id: Uuid,
    name: String,
    email: String,
    message: String,
    status: String,
    source: String,
    created_at: DateTime<Utc>,
}

impl From<FeedbackRow> for Feedback {
    fn from(row: FeedbackRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            email: row.email,
            message: row.message,
            status: row.status.parse().unwrap_or_default(),
            source: row.source,
            created_at: row.created_at,
        }
    }
}

/// Store backed by PostgreSQL.
pub struct PgContentStore {
    pool: PgPool,
    changes: broadcast::Sender<Collection>,
    listener: JoinHandle<()>,
}

impl PgContentStore {
    /// Create the store and start forwarding table notifications.
    pub fn new(pool: PgPool) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        let listener = tokio::spawn(listen_for_changes(pool.clone(), changes.clone()));
        Self {
            pool,
            changes,
            listener,
        }
    }

    /// Get the underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl Drop for PgContentStore {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

impl std::fmt::Debug for PgContentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgContentStore").finish()
    }
}

/// Forward `content_changes` notifications until the task is aborted.
///
/// Notifications can be lost while the connection is down, so every
/// reconnect is followed by a change event for each collection.
async fn listen_for_changes(pool: PgPool, changes: broadcast::Sender<Collection>) {
    loop {
        let mut listener = match PgListener::connect_with(&pool).await {
            Ok(l) => l,
            Err(e) => {
                warn!(error = %e, "failed to open notification connection");
                tokio::time::sleep(RELISTEN_DELAY).await;
                continue;
            }
        };

        if let Err(e) = listener.listen(NOTIFY_CHANNEL).await {
            warn!(error = %e, "failed to LISTEN for content changes");
            tokio::time::sleep(RELISTEN_DELAY).await;
            continue;
        }

        info!(channel = NOTIFY_CHANNEL, "listening for content changes");
        for c in [Collection::Posts, Collection::Media, Collection::Feedback] {
            let _ = changes.send(c);
        }

        loop {
            match listener.recv().await {
                Ok(notification) => match Collection::from_table(notification.payload()) {
                    Some(c) => {
                        debug!(collection = c.as_str(), "content change notification");
                        let _ = changes.send(c);
                    }
                    None => {
                        debug!(payload = %notification.payload(), "ignoring unknown notification");
                    }
                },
                Err(e) => {
                    warn!(error = %e, "notification connection failed");
                    break;
                }
            }
        }

        tokio::time::sleep(RELISTEN_DELAY).await;
    }
}

#[async_trait]
impl ContentStore for PgContentStore {
    async fn list_posts(&self) -> StoreResult<Vec<Post>> {
        let rows: Vec<PostRow> = sqlx::query_as(&format!(
            "SELECT {POST_COLUMNS} FROM posts ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Post::from).collect())
    }

    async fn list_posts_page(&self, limit: i64, offset: i64) -> StoreResult<Vec<Post>> {
        let rows: Vec<PostRow> = sqlx::query_as(&format!(
            "SELECT {POST_COLUMNS} FROM posts ORDER BY created_at DESC, id DESC LIMIT $1 OFFSET $2"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Post::from).collect())
    }

    async fn get_post(&self, id: Uuid) -> StoreResult<Option<Post>> {
        let row: Option<PostRow> =
            sqlx::query_as(&format!("SELECT {POST_COLUMNS} FROM posts WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(Post::from))
    }

    async fn insert_post(&self, post: &Post) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO posts (id, title, slug, excerpt, content, featured_image, featured_badges,
                author_name, author_title, status, toc_hidden, created_at, updated_at, published_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(post.id)
        .bind(&post.title)
        .bind(&post.slug)
        .bind(&post.excerpt)
        .bind(&post.content)
        .bind(&post.featured_image)
        .bind(Json(&post.featured_badges))
        .bind(&post.author_name)
        .bind(&post.author_title)
        .bind(post.status.as_str())
        .bind(Json(&post.toc_hidden))
        .bind(post.created_at)
        .bind(post.updated_at)
        .bind(post.published_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn replace_post(&self, post: &Post) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE posts SET title = $2, slug = $3, excerpt = $4, content = $5,
                featured_image = $6, featured_badges = $7, author_name = $8, author_title = $9,
                status = $10, toc_hidden = $11, updated_at = $12, published_at = $13
            WHERE id = $1
            "#,
        )
        .bind(post.id)
        .bind(&post.title)
        .bind(&post.slug)
        .bind(&post.excerpt)
        .bind(&post.content)
        .bind(&post.featured_image)
        .bind(Json(&post.featured_badges))
        .bind(&post.author_name)
        .bind(&post.author_title)
        .bind(post.status.as_str())
        .bind(Json(&post.toc_hidden))
        .bind(post.updated_at)
        .bind(post.published_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn delete_post(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_media(&self) -> StoreResult<Vec<MediaItem>> {
        let rows: Vec<MediaRow> = sqlx::query_as(&format!(
            "SELECT {MEDIA_COLUMNS} FROM media ORDER BY uploaded_at DESC, id DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(MediaItem::from).collect())
    }

    async fn insert_media(&self, item: &MediaItem) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO media (id, url, storage_path, filename, original_name, mime_type, size, uploaded_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(item.id)
        .bind(&item.url)
        .bind(&item.storage_path)
        .bind(&item.filename)
        .bind(&item.original_name)
        .bind(&item.mime_type)
        .bind(item.size)
        .bind(item.uploaded_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete_media(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM media WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn insert_feedback(&self, feedback: &Feedback) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO feedback (id, name, email, message, status, source, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(feedback.id)
        .bind(&feedback.name)
        .bind(&feedback.email)
        .bind(&feedback.message)
        .bind(feedback.status.as_str())
        .bind(&feedback.source)
        .bind(feedback.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_feedback(&self) -> StoreResult<Vec<Feedback>> {
        let rows: Vec<FeedbackRow> = sqlx::query_as(&format!(
            "SELECT {FEEDBACK_COLUMNS} FROM feedback ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Feedback::from).collect())
    }

    async fn set_feedback_status(&self, id: Uuid, status: FeedbackStatus) -> StoreResult<bool> {
        let result = sqlx::query("UPDATE feedback SET status = $1 WHERE id = $2")
            .bind(status.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_feedback(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM feedback WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    fn subscribe(&self) -> broadcast::Receiver<Collection> {
        self.changes.subscribe()
    }

    async fn healthy(&self) -> bool {
        crate::db::check_health(&self.pool).await
    }
}
