//! Document store error types.

use thiserror::Error;

use super::sqlite::DatabaseError;

/// Errors from document store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Create-if-absent found an existing document.
    #[error("Document '{collection}/{key}' already exists")]
    AlreadyExists { collection: String, key: String },

    /// Update targeted a missing document.
    #[error("Document '{collection}/{key}' not found")]
    NotFound { collection: String, key: String },

    /// Transport failure talking to a hosted store.
    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The hosted store answered with an error status.
    #[error("Store returned {status}: {message}")]
    Service { status: u16, message: String },

    /// Local SQLite failure.
    #[error(transparent)]
    Database(#[from] DatabaseError),

    /// The store did not answer within the request timeout.
    #[error("Store did not answer within {0:?}")]
    Timeout(std::time::Duration),

    /// A document or response could not be decoded.
    #[error("Malformed document: {0}")]
    Decode(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Decode(e.to_string())
    }
}
