//! Photo attachment storage.
//!
//! Photos are opaque byte blobs addressed by a generated filename. The
//! [`PhotoStore`] owns naming and validation; a [`PhotoBackend`] only moves
//! bytes, either to a local directory or to a remote blob service.

mod http;
mod local;

pub use http::HttpPhotoBackend;
pub use local::LocalPhotoBackend;

use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;

use crate::config::PhotoBackendConfig;
use crate::errors::AppError;
use crate::ids;

/// Extension used when the client gives no usable one.
pub const DEFAULT_EXTENSION: &str = ".jpg";

const MAX_EXTENSION_LEN: usize = 8;
const MAX_NAME_LEN: usize = 255;

/// A byte stream type used for reading photo contents.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

/// An opened photo, ready to be streamed to a client.
pub struct PhotoStream {
    pub body: ByteStream,
    pub content_type: String,
    pub content_length: Option<u64>,
}

/// Byte-level storage for photos.
#[async_trait]
pub trait PhotoBackend: Send + Sync + 'static {
    /// Backend type name ("local", "http").
    fn kind(&self) -> &'static str;

    /// Write `data` under `name`, replacing nothing (names are fresh).
    async fn put(&self, name: &str, data: Bytes) -> Result<(), AppError>;

    /// Open a photo for streaming. Missing photos are `AppError::NotFound`.
    async fn open(&self, name: &str) -> Result<PhotoStream, AppError>;

    /// Remove a photo. Removing a missing photo succeeds.
    async fn remove(&self, name: &str) -> Result<(), AppError>;
}

/// Photo attachment store shared by the update feed and the upload route.
#[derive(Clone)]
pub struct PhotoStore {
    backend: Arc<dyn PhotoBackend>,
}

impl PhotoStore {
    pub fn new(backend: Arc<dyn PhotoBackend>) -> Self {
        Self { backend }
    }

    /// Build the store described by the configuration.
    pub async fn from_config(config: &PhotoBackendConfig) -> Result<Self, AppError> {
        let backend: Arc<dyn PhotoBackend> = match config {
            PhotoBackendConfig::Local { uploads_dir } => {
                Arc::new(LocalPhotoBackend::new(uploads_dir).await?)
            }
            PhotoBackendConfig::Http { base_url, token } => {
                Arc::new(HttpPhotoBackend::new(base_url, token.clone())?)
            }
        };
        Ok(Self::new(backend))
    }

    pub fn kind(&self) -> &'static str {
        self.backend.kind()
    }

    /// Persist photo bytes under a freshly generated filename and return it.
    pub async fn store(&self, data: Bytes, suggested_name: Option<&str>) -> Result<String, AppError> {
        let name = ids::photo_filename(&extension_of(suggested_name));
        let size = data.len();
        self.backend.put(&name, data).await?;
        tracing::debug!(photo = %name, bytes = size, backend = self.kind(), "Stored photo");
        Ok(name)
    }

    /// Open a stored photo. Names that could never have been generated are NotFound.
    pub async fn retrieve(&self, name: &str) -> Result<PhotoStream, AppError> {
        if !is_valid_photo_name(name) {
            return Err(AppError::NotFound(format!("Photo {} not found", name)));
        }
        self.backend.open(name).await
    }

    /// Delete a stored photo; missing photos and invalid names are a no-op.
    pub async fn delete(&self, name: &str) -> Result<(), AppError> {
        if !is_valid_photo_name(name) {
            tracing::warn!(photo = %name, "Ignoring delete of invalid photo name");
            return Ok(());
        }
        self.backend.remove(name).await?;
        tracing::debug!(photo = %name, backend = self.kind(), "Deleted photo");
        Ok(())
    }
}

/// Extension (with dot) to use for a stored photo given the client's filename.
pub fn extension_of(suggested_name: Option<&str>) -> String {
    suggested_name
        .and_then(|n| Path::new(n).extension())
        .and_then(|e| e.to_str())
        .filter(|e| {
            !e.is_empty()
                && e.len() <= MAX_EXTENSION_LEN
                && e.chars().all(|c| c.is_ascii_alphanumeric())
        })
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
}

/// Whether `name` is a plain filename that is safe to hand to a backend.
pub fn is_valid_photo_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_NAME_LEN
        && !name.starts_with('.')
        && !name.contains("..")
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

/// MIME type for a photo filename.
pub fn content_type_for(name: &str) -> &'static str {
    let ext = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("heic") => "image/heic",
        Some("heif") => "image/heif",
        Some("avif") => "image/avif",
        Some("bmp") => "image/bmp",
        Some("svg") => "image/svg+xml",
        _ => "application/octet-stream",
    }
}
