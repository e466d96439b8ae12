//! Local filesystem photo backend.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;
use tokio_util::io::ReaderStream;

use super::{content_type_for, PhotoBackend, PhotoStream};
use crate::errors::AppError;

/// Photos stored as plain files in one directory.
#[derive(Debug, Clone)]
pub struct LocalPhotoBackend {
    root: PathBuf,
}

impl LocalPhotoBackend {
    /// Create the backend, creating the uploads directory if needed.
    pub async fn new(root: impl AsRef<Path>) -> Result<Self, AppError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await.map_err(|e| {
            AppError::Storage(format!(
                "Failed to create uploads directory {}: {}",
                root.display(),
                e
            ))
        })?;
        Ok(Self { root })
    }

    fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

#[async_trait]
impl PhotoBackend for LocalPhotoBackend {
    fn kind(&self) -> &'static str {
        "local"
    }

    async fn put(&self, name: &str, data: Bytes) -> Result<(), AppError> {
        let path = self.path(name);

        // Write to a hidden temp file, then rename into place
        let temp_path = self.root.join(format!(".{}.tmp", name));
        if let Err(e) = fs::write(&temp_path, &data).await {
            fs::remove_file(&temp_path).await.ok();
            return Err(AppError::Storage(format!("Failed to write photo {}: {}", name, e)));
        }
        fs::rename(&temp_path, &path).await.map_err(|e| {
            AppError::Storage(format!("Failed to move photo {} into place: {}", name, e))
        })?;

        Ok(())
    }

    async fn open(&self, name: &str) -> Result<PhotoStream, AppError> {
        // Open directly; a missing file surfaces as NotFound from the open itself
        let file = fs::File::open(self.path(name)).await?;

        let content_length = file.metadata().await.ok().map(|m| m.len());
        Ok(PhotoStream {
            body: Box::pin(ReaderStream::new(file)),
            content_type: content_type_for(name).to_string(),
            content_length,
        })
    }

    async fn remove(&self, name: &str) -> Result<(), AppError> {
        match fs::remove_file(self.path(name)).await {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            result => Ok(result?),
        }
    }
}
