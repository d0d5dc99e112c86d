//! Upload validation and storage naming.
//!
//! Only images are accepted into the media library. The declared MIME type
//! is checked against an allow-list and, when the content is recognizable,
//! against the sniffed type.

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use super::storage::sanitize_filename;

/// Maximum file size (10 MB).
pub const MAX_FILE_SIZE: usize = 10 * 1024 * 1024;

/// Allowed MIME types for upload.
pub const ALLOWED_MIME_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/webp",
    "image/svg+xml",
];

/// A file handed to the media library.
#[derive(Debug, Clone)]
pub struct UploadFile {
    /// Name on the uploader's machine.
    pub name: String,
    /// Declared MIME type.
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl UploadFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            data,
        }
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// Why an upload was refused before reaching storage.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadRejection {
    #[error("file is empty")]
    Empty,

    #[error("file too large: {size} bytes (max {max} bytes)")]
    TooLarge { size: usize, max: usize },

    #[error("file type not allowed: {0}")]
    UnsupportedType(String),

    #[error("file content is {detected}, not {declared}")]
    TypeMismatch { declared: String, detected: String },
}

/// Check size and type. Returns the normalized MIME type to record.
pub fn validate_upload(file: &UploadFile) -> Result<String, UploadRejection> {
    if file.data.is_empty() {
        return Err(UploadRejection::Empty);
    }
    if file.data.len() > MAX_FILE_SIZE {
        return Err(UploadRejection::TooLarge {
            size: file.data.len(),
            max: MAX_FILE_SIZE,
        });
    }

    let declared = file
        .mime_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    let declared = if declared == "image/jpg" {
        "image/jpeg".to_string()
    } else {
        declared
    };

    if !ALLOWED_MIME_TYPES.contains(&declared.as_str()) {
        return Err(UploadRejection::UnsupportedType(declared));
    }

    // SVG is text and has no magic number; other images must sniff as what
    // they claim to be when the sniffer recognizes them.
    if let Some(kind) = infer::get(&file.data)
        && kind.mime_type() != declared
    {
        return Err(UploadRejection::TypeMismatch {
            declared,
            detected: kind.mime_type().to_string(),
        });
    }

    Ok(declared)
}

/// Storage file name: `{unix_millis}_{id fragment}_{sanitized original}`.
///
/// The fragment is the random tail of `id`, so files with the same name
/// uploaded in the same millisecond still get distinct objects.
pub fn storage_filename(original: &str, now: DateTime<Utc>, id: Uuid) -> String {
    let unique = id.simple().to_string();
    format!(
        "{}_{}_{}",
        now.timestamp_millis(),
        &unique[unique.len() - 12..],
        sanitize_filename(original)
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const PNG_HEADER: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];

    #[test]
    fn accepts_matching_png() {
        let file = UploadFile::new("a.png", "image/png", PNG_HEADER.to_vec());
        assert_eq!(validate_upload(&file).unwrap(), "image/png");
    }

    #[test]
    fn rejects_non_images() {
        let file = UploadFile::new("a.pdf", "application/pdf", b"%PDF-1.4".to_vec());
        assert!(matches!(
            validate_upload(&file),
            Err(UploadRejection::UnsupportedType(_))
        ));
    }

    #[test]
    fn rejects_disguised_content() {
        let file = UploadFile::new("a.jpg", "image/jpeg", PNG_HEADER.to_vec());
        assert!(matches!(
            validate_upload(&file),
            Err(UploadRejection::TypeMismatch { .. })
        ));
    }

    #[test]
    fn rejects_oversize_and_empty() {
        let big = UploadFile::new("a.png", "image/png", vec![0; MAX_FILE_SIZE + 1]);
        assert!(matches!(
            validate_upload(&big),
            Err(UploadRejection::TooLarge { .. })
        ));
        let empty = UploadFile::new("a.png", "image/png", Vec::new());
        assert_eq!(validate_upload(&empty), Err(UploadRejection::Empty));
    }

    #[test]
    fn svg_passes_without_magic_number() {
        let file = UploadFile::new("i.svg", "image/svg+xml", b"<svg></svg>".to_vec());
        assert_eq!(validate_upload(&file).unwrap(), "image/svg+xml");
    }

    #[test]
    fn filename_is_time_prefixed_and_unique() {
        let now = Utc.timestamp_millis_opt(1_760_000_000_123).unwrap();
        let id = Uuid::parse_str("01890a5d-ac96-774b-bcce-b302099a8057").unwrap();
        assert_eq!(
            storage_filename("My Photo.png", now, id),
            "1760000000123_b302099a8057_My_Photo.png"
        );

        let a = storage_filename("image.png", now, Uuid::now_v7());
        let b = storage_filename("image.png", now, Uuid::now_v7());
        assert_ne!(a, b);
    }
}
