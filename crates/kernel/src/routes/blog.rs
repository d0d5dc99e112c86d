//! Public blog pages.

use axum::Router;
use axum::extract::{Path, State};
use axum::response::Response;
use axum::routing::get;

use super::helpers::{PostView, not_found_page, render_page};
use crate::state::AppState;
use crate::theme::sanitize_post_html;
use crate::toc;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/blog", get(blog_index))
        .route("/blog/{slug}", get(blog_post))
}

async fn blog_index(State(state): State<AppState>) -> Response {
    let published = state.content().published();
    let posts: Vec<PostView<'_>> = published.iter().map(PostView::new).collect();

    let mut context = tera::Context::new();
    context.insert("posts", &posts);
    render_page(
        &state,
        "blog.html",
        "Blog",
        "Notes on building habits that last.",
        "/blog",
        &mut context,
    )
}

/// A published post, with heading ids filled in and the outline beside it.
async fn blog_post(State(state): State<AppState>, Path(slug): Path<String>) -> Response {
    let Some(post) = state
        .content()
        .get_by_slug(&slug)
        .filter(|p| p.is_published())
    else {
        return not_found_page(&state);
    };

    let annotated = toc::annotate_headings(&post.content, &post.toc_hidden);
    let body = sanitize_post_html(&annotated.html);
    let image = post
        .featured_image
        .as_deref()
        .or(state.site().default_image.as_deref())
        .map(|img| state.site().absolute(img));

    let mut context = tera::Context::new();
    context.insert("post", &PostView::new(&post));
    context.insert("body", &body);
    context.insert("outline", &annotated.outline);
    context.insert("image", &image);

    let path = format!("/blog/{}", post.slug);
    render_page(&state, "post.html", &post.title, &post.excerpt, &path, &mut context)
}
