//! Schema versions of the SQLite document store.
//!
//! The applied version lives in `PRAGMA user_version`. Each step runs in its
//! own transaction together with the version bump, so a failed step leaves
//! the file at the previous version.

use rusqlite::{Connection, Transaction, TransactionBehavior};

use super::error::DatabaseError;

struct SchemaStep {
    version: u32,
    description: &'static str,
    sql: &'static str,
}

const STEPS: &[SchemaStep] = &[
    SchemaStep {
        version: 1,
        description: "documents table",
        sql: include_str!("sql/001_create_documents.sql"),
    },
    SchemaStep {
        version: 2,
        description: "created_at index",
        sql: include_str!("sql/002_index_documents_created_at.sql"),
    },
];

/// Highest schema version this build knows.
pub fn latest_version() -> u32 {
    STEPS.last().map(|s| s.version).unwrap_or(0)
}

pub fn schema_version(conn: &Connection) -> Result<u32, DatabaseError> {
    Ok(conn.query_row("PRAGMA user_version", [], |r| r.get(0))?)
}

/// Brings the document store schema up to [`latest_version`].
pub fn upgrade(conn: &Connection) -> Result<(), DatabaseError> {
    let found = schema_version(conn)?;
    let supported = latest_version();
    if found > supported {
        return Err(DatabaseError::SchemaTooNew { found, supported });
    }

    for step in STEPS.iter().filter(|s| s.version > found) {
        log::info!(
            "Upgrading document store schema to v{} ({})",
            step.version,
            step.description
        );

        let failed = |e: rusqlite::Error| DatabaseError::SchemaUpgrade {
            version: step.version,
            description: step.description,
            reason: e.to_string(),
        };

        let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
        tx.execute_batch(step.sql).map_err(failed)?;
        tx.pragma_update(None, "user_version", step.version)
            .map_err(failed)?;
        tx.commit()?;
    }

    Ok(())
}
