//! Blob store abstraction.
//!
//! The external processor uploads result artifacts under
//! `results/<jobId>/`. The client only needs to turn a key into a URL it can
//! hand to a viewer; a missing object is not an error.

use async_trait::async_trait;

use crate::error::BlobError;

pub mod filesystem;
pub mod firebase;
pub mod memory;

pub use filesystem::FsBlobStore;
pub use firebase::FirebaseStorage;
pub use memory::MemoryBlobStore;

/// Prefix under which the processor stores per-job artifacts.
pub const RESULTS_PREFIX: &str = "results";

/// File name of the zone temperature plot.
pub const RESULT_PLOT_FILE: &str = "zone_plot.png";

/// Key of the result plot for a job.
pub fn result_plot_key(job_id: &str) -> String {
    format!("{}/{}/{}", RESULTS_PREFIX, job_id, RESULT_PLOT_FILE)
}

/// Rejects keys that would escape a rooted namespace.
pub fn validate_key(key: &str) -> Result<(), BlobError> {
    let invalid = |reason: &str| BlobError::InvalidKey {
        key: key.to_string(),
        reason: reason.to_string(),
    };

    if key.is_empty() {
        return Err(invalid("empty key"));
    }
    if key.starts_with('/') || key.contains('\\') {
        return Err(invalid("key must be a relative path using '/'"));
    }
    if key
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return Err(invalid("empty, '.' or '..' segment"));
    }
    Ok(())
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Resolves `key` to a fetchable URL, or `None` when no such object exists.
    async fn resolve_url(&self, key: &str) -> Result<Option<String>, BlobError>;

    fn name(&self) -> &'static str;
}
