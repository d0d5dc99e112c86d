//! Social preview pages for shared blog links.

use axum::Router;
use axum::extract::{Query, State};
use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use serde::Deserialize;
use tracing::debug;

use super::helpers::method_not_allowed;
use crate::error::{AppError, AppResult};
use crate::services::social::{
    PREVIEW_CACHE_CONTROL, PreviewMeta, find_published_by_slug, render_preview,
};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route(
        "/api/blog-preview",
        get(blog_preview).fallback(|| async { method_not_allowed("GET, HEAD") }),
    )
}

#[derive(Debug, Deserialize)]
struct PreviewQuery {
    slug: Option<String>,
}

/// GET|HEAD /api/blog-preview?slug=
///
/// Looks the slug up in the store rather than the cached snapshot so a
/// freshly published post previews correctly on any instance.
async fn blog_preview(
    State(state): State<AppState>,
    Query(query): Query<PreviewQuery>,
) -> AppResult<Response> {
    let slug = query
        .slug
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::validation("slug", "slug is required"))?;

    let site = state.site();
    let (status, preview) = match find_published_by_slug(state.store().as_ref(), slug).await? {
        Some(post) => (StatusCode::OK, PreviewMeta::for_post(&post, site)),
        None => {
            debug!(slug, "no published post for preview");
            (StatusCode::NOT_FOUND, PreviewMeta::site_default(site))
        }
    };

    Ok((
        status,
        [(header::CACHE_CONTROL, PREVIEW_CACHE_CONTROL)],
        Html(render_preview(&preview, site)),
    )
        .into_response())
}
