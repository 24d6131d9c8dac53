use std::path::{Path, PathBuf};

use async_trait::async_trait;
use reqwest::Url;

use super::{validate_key, BlobStore};
use crate::error::BlobError;

/// Blob store rooted at a local directory. Keys map to relative paths and
/// resolve to `file://` URLs.
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, key: &str) -> Result<PathBuf, BlobError> {
        validate_key(key)?;
        Ok(key.split('/').fold(self.root.clone(), |p, s| p.join(s)))
    }

    /// Writes an object, creating parent directories. Used by local
    /// processors and tests.
    pub fn put(&self, key: &str, content: &[u8]) -> Result<PathBuf, BlobError> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| BlobError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        std::fs::write(&path, content).map_err(|e| BlobError::Io {
            path: path.clone(),
            source: e,
        })?;
        Ok(path)
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn resolve_url(&self, key: &str) -> Result<Option<String>, BlobError> {
        let path = self.path_for(key)?;
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => return Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(BlobError::Io { path, source: e }),
        }

        let absolute = std::path::absolute(&path).map_err(|e| BlobError::Io {
            path: path.clone(),
            source: e,
        })?;
        let url = Url::from_file_path(&absolute).map_err(|_| BlobError::InvalidKey {
            key: key.to_string(),
            reason: format!("cannot express '{}' as a file URL", absolute.display()),
        })?;
        Ok(Some(url.to_string()))
    }

    fn name(&self) -> &'static str {
        "filesystem"
    }
}
