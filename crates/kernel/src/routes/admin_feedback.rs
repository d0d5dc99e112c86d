//! Admin API for feedback triage.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, patch};
use axum::{Json, Router};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{Feedback, FeedbackStatus};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/feedback", get(list_feedback))
        .route(
            "/feedback/{id}",
            patch(update_feedback).delete(delete_feedback),
        )
}

#[derive(Debug, Deserialize)]
struct StatusUpdate {
    status: FeedbackStatus,
}

async fn list_feedback(State(state): State<AppState>) -> AppResult<Json<Vec<Feedback>>> {
    Ok(Json(state.feedback().list().await?))
}

async fn update_feedback(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(update): Json<StatusUpdate>,
) -> AppResult<StatusCode> {
    state.feedback().set_status(id, update.status).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_feedback(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state.feedback().delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
