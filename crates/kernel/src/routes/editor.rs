//! Admin editor helpers: outline preview and HTML normalization.

use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::content::Editor;
use crate::state::AppState;
use crate::toc::{self, OutlineEntry};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/editor/outline", post(outline))
        .route("/editor/normalize", post(normalize))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OutlineRequest {
    content: String,
    #[serde(default)]
    toc_hidden: Vec<String>,
}

#[derive(Debug, Serialize)]
struct OutlineResponse {
    outline: Vec<OutlineEntry>,
}

/// POST /editor/outline: the outline the public page will show.
async fn outline(Json(req): Json<OutlineRequest>) -> Json<OutlineResponse> {
    Json(OutlineResponse {
        outline: toc::derive_outline(&req.content, &req.toc_hidden),
    })
}

#[derive(Debug, Deserialize)]
struct NormalizeRequest {
    content: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NormalizeResponse {
    content: String,
    /// Toc anchor ids in document order.
    anchor_ids: Vec<String>,
}

/// POST /editor/normalize: load the HTML into the document model and
/// serialize it back, the way the editor stores it.
async fn normalize(Json(req): Json<NormalizeRequest>) -> Json<NormalizeResponse> {
    let editor = Editor::from_html(&req.content);
    Json(NormalizeResponse {
        anchor_ids: editor.toc_anchors().into_iter().map(|a| a.id).collect(),
        content: editor.html().to_string(),
    })
}
