//! Shared route helpers for page rendering.

use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use serde::Serialize;
use tracing::error;

use crate::error::AppError;
use crate::models::Post;
use crate::state::AppState;

/// Post fields used by the page templates.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostView<'a> {
    pub title: &'a str,
    pub slug: &'a str,
    pub excerpt: &'a str,
    pub featured_image: Option<&'a str>,
    /// The badges shown on cards, at most two.
    pub badges: &'a [String],
    pub author_name: &'a str,
    pub author_title: &'a str,
    pub published_at: Option<String>,
}

impl<'a> PostView<'a> {
    pub fn new(post: &'a Post) -> Self {
        Self {
            title: &post.title,
            slug: &post.slug,
            excerpt: &post.excerpt,
            featured_image: post.featured_image.as_deref(),
            badges: post.display_badges(),
            author_name: &post.author_name,
            author_title: &post.author_title,
            published_at: post.published_at.map(|t| t.to_rfc3339()),
        }
    }
}

/// Render a themed page, or the error page if rendering fails.
pub fn render_page(
    state: &AppState,
    template: &str,
    title: &str,
    description: &str,
    path: &str,
    context: &mut tera::Context,
) -> Response {
    match state
        .theme()
        .render_page(template, title, description, path, context)
    {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            error!(error = ?e, template, "page render failed");
            let detail = format!("{e:?}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Html(state.theme().render_error("Something went wrong", Some(&detail))),
            )
                .into_response()
        }
    }
}

/// Themed 404 page.
pub fn not_found_page(state: &AppState) -> Response {
    (
        StatusCode::NOT_FOUND,
        Html(state.theme().render_error("Page not found", None)),
    )
        .into_response()
}

/// Client address as forwarded by the edge: `cf-connecting-ip`, else the
/// first `x-forwarded-for` entry.
pub fn client_ip(headers: &HeaderMap) -> Option<String> {
    let header_value = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    if let Some(ip) = header_value("cf-connecting-ip") {
        return Some(ip.to_string());
    }
    header_value("x-forwarded-for")
        .and_then(|list| list.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_string)
}

/// 405 with an `Allow` header and a JSON error body.
pub fn method_not_allowed(allow: &'static str) -> Response {
    ([(header::ALLOW, allow)], AppError::MethodNotAllowed).into_response()
}
