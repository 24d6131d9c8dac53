//! Errors of the SQLite document store.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// The directory holding the database file could not be created.
    #[error("Cannot create document store directory '{path}': {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A schema step failed; the store is left at the previous version.
    #[error("Schema upgrade to v{version} ({description}) failed: {reason}")]
    SchemaUpgrade {
        version: u32,
        description: &'static str,
        reason: String,
    },

    /// The file was written by a newer client with an unknown schema.
    #[error("Document store schema v{found} is newer than supported v{supported}")]
    SchemaTooNew { found: u32, supported: u32 },

    /// A stored body is not a JSON object.
    #[error("Stored document '{collection}/{id}' is unreadable: {reason}")]
    CorruptDocument {
        collection: String,
        id: String,
        reason: String,
    },

    #[error("Document store connection lock poisoned")]
    LockPoisoned,
}
