//! Static public pages: home, legal pages, feedback form, account deletion.

use axum::Router;
use axum::extract::State;
use axum::response::Response;
use axum::routing::get;

use super::helpers::{PostView, render_page};
use crate::state::AppState;

/// Posts listed on the home page.
const HOME_POST_COUNT: usize = 3;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(home))
        .route("/privacy", get(privacy))
        .route("/terms", get(terms))
        .route("/feedback", get(feedback))
        .route("/delete-account", get(delete_account))
}

async fn home(State(state): State<AppState>) -> Response {
    let published = state.content().published();
    let posts: Vec<PostView<'_>> = published
        .iter()
        .take(HOME_POST_COUNT)
        .map(PostView::new)
        .collect();

    let mut context = tera::Context::new();
    context.insert("posts", &posts);
    render_page(&state, "home.html", "", "", "/", &mut context)
}

async fn privacy(State(state): State<AppState>) -> Response {
    render_page(
        &state,
        "privacy.html",
        "Privacy Policy",
        "",
        "/privacy",
        &mut tera::Context::new(),
    )
}

async fn terms(State(state): State<AppState>) -> Response {
    render_page(
        &state,
        "terms.html",
        "Terms of Service",
        "",
        "/terms",
        &mut tera::Context::new(),
    )
}

async fn feedback(State(state): State<AppState>) -> Response {
    let mut context = tera::Context::new();
    context.insert("turnstile_site_key", &state.config().turnstile_site_key);
    render_page(
        &state,
        "feedback.html",
        "Feedback",
        "Tell us what you think of Cadence.",
        "/feedback",
        &mut context,
    )
}

async fn delete_account(State(state): State<AppState>) -> Response {
    render_page(
        &state,
        "delete_account.html",
        "Delete your account",
        "How to permanently delete your account and data.",
        "/delete-account",
        &mut tera::Context::new(),
    )
}
