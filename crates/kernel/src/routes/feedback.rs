//! Public feedback intake.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{Value, json};

use super::helpers::{client_ip, method_not_allowed};
use crate::error::{AppError, AppResult};
use crate::services::FeedbackSubmission;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route(
        "/api/feedback",
        post(submit_feedback).fallback(|| async { method_not_allowed("POST") }),
    )
}

/// POST /api/feedback
///
/// Body: `{name, email, message, turnstileToken}`. Returns `{ok: true}`.
async fn submit_feedback(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<FeedbackSubmission>, axum::extract::rejection::JsonRejection>,
) -> AppResult<Json<Value>> {
    let Json(submission) = body.map_err(|e| {
        tracing::debug!(error = %e, "malformed feedback body");
        AppError::bad_request("Invalid request body")
    })?;

    let ip = client_ip(&headers);
    state.feedback().submit(submission, ip.as_deref()).await?;
    Ok(Json(json!({ "ok": true })))
}
