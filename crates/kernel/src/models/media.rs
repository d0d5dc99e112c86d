//! Media library records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An uploaded asset and the object that backs it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaItem {
    pub id: Uuid,
    /// Public download URL.
    pub url: String,
    /// Storage URI (e.g. `local://media/1760000000000_photo.png`).
    pub storage_path: String,
    /// Time-prefixed, sanitized file name.
    pub filename: String,
    /// Name the file had on the uploader's machine.
    pub original_name: String,
    pub mime_type: String,
    /// Size in bytes.
    pub size: i64,
    pub uploaded_at: DateTime<Utc>,
}

impl MediaItem {
    /// Check whether this item can be placed in an image node.
    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }
}
