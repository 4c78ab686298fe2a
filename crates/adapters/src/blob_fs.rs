//! Local filesystem object store

use async_trait::async_trait;
use bytes::Bytes;
use postsaga_domain::{BlobError, BlobStore};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Stores each object as one file directly under `root`
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl AsRef<Path>) -> Result<Self, BlobError> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, key: &str) -> Result<PathBuf, BlobError> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }
}

/// Keys are flat file names; anything that could escape the root is rejected
pub(crate) fn validate_key(key: &str) -> Result<(), BlobError> {
    if key.trim().is_empty()
        || key.contains('/')
        || key.contains('\\')
        || key == "."
        || key == ".."
    {
        return Err(BlobError::InvalidKey(key.to_string()));
    }
    Ok(())
}

fn map_io(key: &str, e: std::io::Error) -> BlobError {
    match e.kind() {
        ErrorKind::NotFound => BlobError::NotFound(key.to_string()),
        _ => BlobError::Unavailable(format!("{}: {}", key, e)),
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, key: &str, data: Bytes) -> Result<(), BlobError> {
        let path = self.object_path(key)?;
        tokio::fs::write(&path, &data)
            .await
            .map_err(|e| map_io(key, e))?;
        tracing::debug!(key = %key, size = data.len(), "Object written");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes, BlobError> {
        let path = self.object_path(key)?;
        let data = tokio::fs::read(&path).await.map_err(|e| map_io(key, e))?;
        Ok(Bytes::from(data))
    }

    async fn delete(&self, key: &str) -> Result<(), BlobError> {
        let path = self.object_path(key)?;
        tokio::fs::remove_file(&path)
            .await
            .map_err(|e| map_io(key, e))?;
        tracing::debug!(key = %key, "Object deleted");
        Ok(())
    }
}
