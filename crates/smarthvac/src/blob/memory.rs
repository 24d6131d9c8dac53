use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use super::{validate_key, BlobStore};
use crate::error::BlobError;

/// In-process blob store. Objects resolve to `memory://<key>` URLs.
#[derive(Default)]
pub struct MemoryBlobStore {
    objects: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: &str, bytes: impl Into<Vec<u8>>) -> Result<(), BlobError> {
        validate_key(key)?;
        let mut objects = match self.objects.write() {
            Ok(g) => g,
            Err(poisoned) => {
                log::warn!("Blob store lock was poisoned, recovering");
                poisoned.into_inner()
            }
        };
        objects.insert(key.to_string(), bytes.into());
        Ok(())
    }

    pub fn contains(&self, key: &str) -> bool {
        match self.objects.read() {
            Ok(g) => g.contains_key(key),
            Err(poisoned) => poisoned.into_inner().contains_key(key),
        }
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn resolve_url(&self, key: &str) -> Result<Option<String>, BlobError> {
        validate_key(key)?;
        Ok(self
            .contains(key)
            .then(|| format!("memory://{}", key)))
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
