//! Admin API for the media library.

use axum::extract::{DefaultBodyLimit, Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{delete, get};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::warn;
use uuid::Uuid;

use crate::error::{AppError, AppResult, ContentError};
use crate::file::{MAX_FILE_SIZE, UploadFile};
use crate::media::Confirmation;
use crate::models::MediaItem;
use crate::state::AppState;

/// Files accepted in one upload request.
const MAX_FILES_PER_REQUEST: usize = 10;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/media",
            get(list_media)
                .post(upload_media)
                .layer(DefaultBodyLimit::max(MAX_FILE_SIZE * MAX_FILES_PER_REQUEST + 64 * 1024)),
        )
        .route("/media/{id}", delete(delete_media))
}

async fn list_media(State(state): State<AppState>) -> Json<Vec<MediaItem>> {
    Json(state.media().items())
}

#[derive(Debug, Serialize)]
struct UploadFailure {
    name: String,
    error: String,
    /// Set when the object was stored but its record was not.
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<String>,
}

#[derive(Debug, Serialize)]
struct UploadResponse {
    uploaded: Vec<MediaItem>,
    failed: Vec<UploadFailure>,
}

/// POST /media (multipart, one or more `file` fields)
///
/// Files are uploaded concurrently and independently. A single-file request
/// that fails returns that file's error status; otherwise the response
/// lists successes and failures.
async fn upload_media(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<UploadResponse>)> {
    let mut files = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }
        if files.len() == MAX_FILES_PER_REQUEST {
            return Err(AppError::bad_request(format!(
                "at most {MAX_FILES_PER_REQUEST} files per request"
            )));
        }
        let name = field.file_name().unwrap_or("upload").to_string();
        let mime_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let data = field.bytes().await.map_err(multipart_error)?;
        files.push(UploadFile::new(name, mime_type, data.to_vec()));
    }

    if files.is_empty() {
        return Err(AppError::validation("file", "no file provided"));
    }

    let single = files.len() == 1;
    let outcomes = state
        .media()
        .upload_batch(files, &CancellationToken::new())
        .await;

    let mut response = UploadResponse {
        uploaded: Vec::new(),
        failed: Vec::new(),
    };
    for outcome in outcomes {
        match outcome.result {
            Ok(item) => response.uploaded.push(item),
            Err(e) if single => return Err(e.into()),
            Err(e) => {
                let url = match &e {
                    ContentError::MetadataWrite { url, .. } => Some(url.clone()),
                    _ => None,
                };
                warn!(name = %outcome.name, error = %e, "file in batch failed");
                response.failed.push(UploadFailure {
                    name: outcome.name,
                    error: e.to_string(),
                    url,
                });
            }
        }
    }

    let status = if response.uploaded.is_empty() {
        StatusCode::UNPROCESSABLE_ENTITY
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(response)))
}

fn multipart_error(e: axum::extract::multipart::MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(e.body_text())
    } else {
        AppError::bad_request(e.body_text())
    }
}

#[derive(Debug, Deserialize)]
struct DeleteQuery {
    #[serde(default)]
    confirm: bool,
}

/// DELETE /media/{id}?confirm=true
///
/// Irreversible. Without `confirm=true` nothing is deleted.
async fn delete_media(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<DeleteQuery>,
) -> AppResult<StatusCode> {
    state
        .media()
        .delete_by_id(id, Confirmation::from_flag(query.confirm))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
