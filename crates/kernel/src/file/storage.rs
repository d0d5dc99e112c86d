//! Object storage backends.
//!
//! Provides trait and implementations for storing uploaded media locally or in S3.

use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// Bytes written per chunk; progress is reported after each one.
pub const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

/// Directory (or key prefix) that holds media objects.
const MEDIA_DIR: &str = "media";

/// Object storage backend trait.
#[async_trait]
pub trait FileStorage: Send + Sync {
    /// Write data to storage at the given URI.
    ///
    /// Never replaces an existing local object. `progress` receives the cumulative number of bytes written after each
    /// chunk.
    async fn write(
        &self,
        uri: &str,
        data: &[u8],
        progress: &mut (dyn FnMut(u64) + Send),
    ) -> Result<()>;

    /// Delete an object from storage.
    async fn delete(&self, uri: &str) -> Result<()>;

    /// Check if an object exists.
    async fn exists(&self, uri: &str) -> Result<bool>;

    /// Get the public URL for an object.
    fn public_url(&self, uri: &str) -> String;

    /// Build the storage URI for a media file name.
    fn media_uri(&self, filename: &str) -> String {
        format!("{}://{MEDIA_DIR}/{filename}", self.scheme())
    }

    /// Get the storage scheme (e.g., "local", "s3").
    fn scheme(&self) -> &'static str;
}

/// Local filesystem storage.
pub struct LocalFileStorage {
    /// Base path for file storage.
    base_path: PathBuf,
    /// Base URL for public file access.
    base_url: String,
}

impl LocalFileStorage {
    /// Create a new local file storage.
    pub fn new(base_path: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            base_path: base_path.into(),
            base_url: base_url.into(),
        }
    }

    /// Directory served under the public files URL.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Parse a local:// URI to get the filesystem path.
    ///
    /// Rejects paths containing `..` components to prevent directory traversal.
    fn parse_uri(&self, uri: &str) -> Result<PathBuf> {
        let path = uri
            .strip_prefix("local://")
            .context("invalid local URI, must start with local://")?;
        for component in Path::new(path).components() {
            if matches!(component, Component::ParentDir | Component::RootDir) {
                anyhow::bail!("directory traversal not allowed in storage URI");
            }
        }
        Ok(self.base_path.join(path))
    }
}

#[async_trait]
impl FileStorage for LocalFileStorage {
    async fn write(
        &self,
        uri: &str,
        data: &[u8],
        progress: &mut (dyn FnMut(u64) + Send),
    ) -> Result<()> {
        let path = self.parse_uri(uri)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .context("failed to create directories")?;
        }

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .with_context(|| format!("failed to create file {}", path.display()))?;

        let mut written = 0u64;
        for chunk in data.chunks(UPLOAD_CHUNK_SIZE) {
            file.write_all(chunk)
                .await
                .context("failed to write file")?;
            written += chunk.len() as u64;
            progress(written);
        }
        if data.is_empty() {
            progress(0);
        }

        file.flush().await.context("failed to flush file")?;

        debug!(uri = %uri, path = ?path, size = data.len(), "file written");
        Ok(())
    }

    async fn delete(&self, uri: &str) -> Result<()> {
        let path = self.parse_uri(uri)?;

        if fs::try_exists(&path).await.unwrap_or(false) {
            fs::remove_file(&path)
                .await
                .context("failed to delete file")?;
            debug!(uri = %uri, "file deleted");
        } else {
            warn!(uri = %uri, "file not found for deletion");
        }

        Ok(())
    }

    async fn exists(&self, uri: &str) -> Result<bool> {
        let path = self.parse_uri(uri)?;
        Ok(fs::try_exists(&path).await.unwrap_or(false))
    }

    fn public_url(&self, uri: &str) -> String {
        let path = uri.strip_prefix("local://").unwrap_or(uri);
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    fn scheme(&self) -> &'static str {
        "local"
    }
}

impl std::fmt::Debug for LocalFileStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalFileStorage")
            .field("base_path", &self.base_path)
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// S3-compatible object storage.
#[cfg(feature = "s3")]
pub struct S3FileStorage {
    client: aws_sdk_s3::Client,
    bucket: String,
    /// Optional prefix for all keys.
    prefix: Option<String>,
    /// Base URL for public access (e.g., CloudFront distribution).
    base_url: String,
}

#[cfg(feature = "s3")]
impl S3FileStorage {
    /// Create a new S3 file storage.
    ///
    /// Uses the default AWS credential chain. `endpoint_url` targets
    /// S3-compatible services like MinIO.
    pub async fn new(
        bucket: impl Into<String>,
        prefix: Option<String>,
        endpoint_url: Option<&str>,
        base_url: impl Into<String>,
    ) -> Self {
        let config = match endpoint_url {
            Some(endpoint) => aws_config::from_env().endpoint_url(endpoint).load().await,
            None => aws_config::load_from_env().await,
        };
        let client = aws_sdk_s3::Client::new(&config);

        Self {
            client,
            bucket: bucket.into(),
            prefix,
            base_url: base_url.into(),
        }
    }

    /// Parse an s3:// URI to get the S3 key.
    fn parse_uri(&self, uri: &str) -> Result<String> {
        let path = uri
            .strip_prefix("s3://")
            .context("invalid S3 URI, must start with s3://")?;

        match &self.prefix {
            Some(prefix) => Ok(format!("{}/{}", prefix.trim_end_matches('/'), path)),
            None => Ok(path.to_string()),
        }
    }
}

#[cfg(feature = "s3")]
#[async_trait]
impl FileStorage for S3FileStorage {
    async fn write(
        &self,
        uri: &str,
        data: &[u8],
        progress: &mut (dyn FnMut(u64) + Send),
    ) -> Result<()> {
        let key = self.parse_uri(uri)?;

        // Single PUT; progress jumps from 0 to complete.
        progress(0);
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(aws_sdk_s3::primitives::ByteStream::from(data.to_vec()))
            .send()
            .await
            .context("failed to upload to S3")?;
        progress(data.len() as u64);

        debug!(uri = %uri, key = %key, size = data.len(), "file written to S3");
        Ok(())
    }

    async fn delete(&self, uri: &str) -> Result<()> {
        let key = self.parse_uri(uri)?;

        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .context("failed to delete from S3")?;

        debug!(uri = %uri, "file deleted from S3");
        Ok(())
    }

    async fn exists(&self, uri: &str) -> Result<bool> {
        let key = self.parse_uri(uri)?;

        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(err) => {
                if let Some(service_err) = err.as_service_error()
                    && service_err.is_not_found()
                {
                    return Ok(false);
                }
                Err(err).context("failed to check S3 object existence")
            }
        }
    }

    fn public_url(&self, uri: &str) -> String {
        let path = uri.strip_prefix("s3://").unwrap_or(uri);
        match &self.prefix {
            Some(prefix) => format!(
                "{}/{}/{}",
                self.base_url.trim_end_matches('/'),
                prefix.trim_end_matches('/'),
                path
            ),
            None => format!("{}/{}", self.base_url.trim_end_matches('/'), path),
        }
    }

    fn scheme(&self) -> &'static str {
        "s3"
    }
}

#[cfg(feature = "s3")]
impl std::fmt::Debug for S3FileStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3FileStorage")
            .field("bucket", &self.bucket)
            .field("prefix", &self.prefix)
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Sanitize a filename for safe storage.
///
/// Keeps only the final path component and replaces anything outside
/// `[A-Za-z0-9._-]` with an underscore.
pub fn sanitize_filename(filename: &str) -> String {
    let name = Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(filename);

    let cleaned: String = name
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '.' | '-' | '_' => c,
            _ => '_',
        })
        .take(200)
        .collect();

    if cleaned.trim_matches(['.', '_']).is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("test.jpg"), "test.jpg");
        assert_eq!(sanitize_filename("my file.jpg"), "my_file.jpg");
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("test<script>.jpg"), "test_script_.jpg");
        assert_eq!(sanitize_filename(".."), "upload");
    }

    #[test]
    fn test_sanitize_filename_traversal_vectors() {
        let result = sanitize_filename("..\\..\\windows\\system32\\config");
        assert!(!result.contains('\\'), "backslashes should be sanitized");
        let result = sanitize_filename("shell.php\0.jpg");
        assert!(!result.contains('\0'));
        let result = sanitize_filename("..%2F..%2Fetc%2Fpasswd");
        assert!(!result.contains('%'));
        assert!(!result.contains('/'));
    }

    #[test]
    fn test_media_uri_and_public_url() {
        let storage = LocalFileStorage::new("/tmp/uploads", "https://example.com/files/");
        let uri = storage.media_uri("1760000000000_photo.png");
        assert_eq!(uri, "local://media/1760000000000_photo.png");
        assert_eq!(
            storage.public_url(&uri),
            "https://example.com/files/media/1760000000000_photo.png"
        );
    }

    #[test]
    fn test_parse_uri_rejects_traversal() {
        let storage = LocalFileStorage::new("/tmp/uploads", "/files");
        assert!(storage.parse_uri("local://../secret").is_err());
        assert!(storage.parse_uri("s3://media/a.png").is_err());
        assert!(storage.parse_uri("local://media/a.png").is_ok());
    }

    #[tokio::test]
    async fn test_chunked_write_reports_progress() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalFileStorage::new(dir.path(), "/files");
        let data = vec![7u8; UPLOAD_CHUNK_SIZE * 2 + 10];

        let mut seen = Vec::new();
        storage
            .write("local://media/blob.bin", &data, &mut |n| seen.push(n))
            .await
            .unwrap();

        assert_eq!(seen.len(), 3);
        assert_eq!(*seen.last().unwrap(), data.len() as u64);
        assert!(storage.exists("local://media/blob.bin").await.unwrap());

        storage.delete("local://media/blob.bin").await.unwrap();
        assert!(!storage.exists("local://media/blob.bin").await.unwrap());
    }

    #[tokio::test]
    async fn test_write_never_replaces_existing_object() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalFileStorage::new(dir.path(), "/files");
        let uri = "local://media/taken.png";

        storage.write(uri, b"first", &mut |_| {}).await.unwrap();
        assert!(storage.write(uri, b"second", &mut |_| {}).await.is_err());

        let kept = std::fs::read(dir.path().join("media/taken.png")).unwrap();
        assert_eq!(kept, b"first");
    }
}
