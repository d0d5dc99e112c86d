//! Admin API for blog posts.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Extension, Json, Router};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::AdminIdentity;
use crate::models::{CreatePost, Post, PostStatus, UpdatePost};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/posts", get(list_posts).post(create_post))
        .route(
            "/posts/{id}",
            get(get_post).patch(update_post).delete(delete_post),
        )
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    status: Option<PostStatus>,
}

/// GET /posts: all posts, newest first, optionally filtered by status.
async fn list_posts(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Json<Vec<Post>> {
    let posts = state
        .content()
        .list()
        .into_iter()
        .filter(|p| query.status.is_none_or(|s| p.status == s))
        .collect();
    Json(posts)
}

/// POST /posts: create and return the stored post.
async fn create_post(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminIdentity>,
    Json(input): Json<CreatePost>,
) -> AppResult<(StatusCode, Json<Post>)> {
    let id = state.content().create(input).await?;
    let post = state
        .store()
        .get_post(id)
        .await?
        .ok_or(AppError::NotFound)?;
    info!(post_id = %id, admin = %admin.email, "post created via admin API");
    Ok((StatusCode::CREATED, Json(post)))
}

/// GET /posts/{id}
///
/// Served from the snapshot; a post created moments ago may not be there
/// yet, so a miss falls back to the store.
async fn get_post(State(state): State<AppState>, Path(id): Path<Uuid>) -> AppResult<Json<Post>> {
    if let Some(post) = state.content().get_by_id(id) {
        return Ok(Json(post));
    }
    let post = state
        .store()
        .get_post(id)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(post))
}

/// PATCH /posts/{id}: partial update. Concurrent saves race; last write wins.
async fn update_post(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminIdentity>,
    Path(id): Path<Uuid>,
    Json(patch): Json<UpdatePost>,
) -> AppResult<Json<Post>> {
    let post = state.content().update(id, patch).await?;
    info!(post_id = %id, admin = %admin.email, "post updated via admin API");
    Ok(Json(post))
}

/// DELETE /posts/{id}: irreversible. Media used by the post is kept.
async fn delete_post(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminIdentity>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state.content().delete(id).await?;
    info!(post_id = %id, admin = %admin.email, "post deleted via admin API");
    Ok(StatusCode::NO_CONTENT)
}
