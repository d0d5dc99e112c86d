//! File and media storage.
//!
//! Provides upload validation and the object storage backends.

pub mod service;
pub mod storage;

pub use service::{
    ALLOWED_MIME_TYPES, MAX_FILE_SIZE, UploadFile, UploadRejection, storage_filename,
    validate_upload,
};
pub use storage::{FileStorage, LocalFileStorage, sanitize_filename};

#[cfg(feature = "s3")]
pub use storage::S3FileStorage;
