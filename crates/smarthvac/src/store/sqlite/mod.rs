//! Self-hosted document store on top of SQLite.
//!
//! Documents are stored as JSON text, keyed by `(collection, id)`. The
//! `Database` handle wraps a single rusqlite connection behind a `Mutex`;
//! WAL mode lets an external processor write to the same file.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use serde_json::Value;

use super::{
    format_timestamp, generate_key, Direction, Document, DocumentStore, Query, ServerClock,
    StoreError, StoredDocument, CREATED_AT_FIELD, UPDATED_AT_FIELD,
};

pub mod error;
pub mod migrations;

pub use error::DatabaseError;

/// Thread-safe database handle wrapping a single rusqlite connection.
///
/// Cloning is cheap (inner `Arc`).
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Opens (or creates) the database at the given path and runs all
    /// pending migrations.
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| DatabaseError::CreateDir {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA busy_timeout=5000;")?;

        migrations::upgrade(&conn)?;

        log::info!("Database opened at {}", path.display());

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Opens an in-memory database for testing. Runs all migrations.
    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()?;
        migrations::upgrade(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Provides locked access to the underlying connection.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, DatabaseError>
    where
        F: FnOnce(&Connection) -> Result<T, DatabaseError>,
    {
        let conn = self.conn.lock().map_err(|_| DatabaseError::LockPoisoned)?;
        f(&conn)
    }
}

/// Returns the canonical database path: `~/.smarthvac/data/documents.db`.
pub fn default_database_path() -> Option<PathBuf> {
    crate::config::smarthvac_home().map(|h| h.join("data").join("documents.db"))
}

/// Document store persisted in a local SQLite file.
///
/// Has no push channel: writes may come from another process, so
/// subscriptions poll it.
pub struct SqliteStore {
    db: Database,
    clock: ServerClock,
}

impl SqliteStore {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            clock: ServerClock::new(),
        }
    }

    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        Ok(Self::new(Database::open(path)?))
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    fn insert_new(&self, collection: &str, key: &str, mut data: Document) -> Result<(), StoreError> {
        let now = format_timestamp(self.clock.now());
        data.insert(CREATED_AT_FIELD.to_string(), Value::String(now.clone()));
        data.insert(UPDATED_AT_FIELD.to_string(), Value::String(now.clone()));
        let json = serde_json::to_string(&data)?;

        let inserted = self.db.with_conn(|conn| {
            let changed = conn.execute(
                "INSERT INTO documents (collection, id, data, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)
                 ON CONFLICT (collection, id) DO NOTHING",
                params![collection, key, json, now],
            )?;
            Ok(changed > 0)
        })?;

        if inserted {
            Ok(())
        } else {
            Err(StoreError::AlreadyExists {
                collection: collection.to_string(),
                key: key.to_string(),
            })
        }
    }
}

fn parse_document(id: String, json: &str) -> Result<StoredDocument, StoreError> {
    match serde_json::from_str::<Value>(json)? {
        Value::Object(data) => Ok(StoredDocument::new(id, data)),
        other => Err(StoreError::Decode(format!(
            "document '{}' is not an object: {}",
            id, other
        ))),
    }
}

/// JSON path for a top-level field. Only plain identifiers are accepted.
fn field_path(field: &str) -> Result<String, StoreError> {
    if field.is_empty() || !field.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(StoreError::Decode(format!("invalid order field: {}", field)));
    }
    Ok(format!("$.{}", field))
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn create(&self, collection: &str, key: &str, data: Document) -> Result<(), StoreError> {
        self.insert_new(collection, key, data)
    }

    async fn create_with_generated_key(
        &self,
        collection: &str,
        data: Document,
    ) -> Result<String, StoreError> {
        let key = generate_key();
        self.insert_new(collection, &key, data)?;
        Ok(key)
    }

    async fn update(
        &self,
        collection: &str,
        key: &str,
        patch: Document,
    ) -> Result<(), StoreError> {
        let now = format_timestamp(self.clock.now());

        // Read and write under one write lock so a concurrent writer on
        // another connection cannot slip in between.
        let found = self.db.with_conn(|conn| {
            let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
            let current: Option<String> = tx
                .query_row(
                    "SELECT data FROM documents WHERE collection = ?1 AND id = ?2",
                    params![collection, key],
                    |r| r.get(0),
                )
                .optional()?;
            let Some(json) = current else {
                return Ok(false);
            };

            let corrupt = |reason: String| DatabaseError::CorruptDocument {
                collection: collection.to_string(),
                id: key.to_string(),
                reason,
            };
            let mut doc = match serde_json::from_str::<Value>(&json) {
                Ok(Value::Object(data)) => data,
                Ok(other) => return Err(corrupt(format!("not an object: {}", other))),
                Err(e) => return Err(corrupt(e.to_string())),
            };
            for (field, value) in patch {
                if field == CREATED_AT_FIELD {
                    continue;
                }
                doc.insert(field, value);
            }
            doc.insert(UPDATED_AT_FIELD.to_string(), Value::String(now.clone()));
            let merged = serde_json::to_string(&doc).map_err(|e| corrupt(e.to_string()))?;

            tx.execute(
                "UPDATE documents SET data = ?3, updated_at = ?4 WHERE collection = ?1 AND id = ?2",
                params![collection, key, merged, now],
            )?;
            tx.commit()?;
            Ok(true)
        })?;

        if !found {
            return Err(StoreError::NotFound {
                collection: collection.to_string(),
                key: key.to_string(),
            });
        }
        Ok(())
    }

    async fn get(&self, collection: &str, key: &str) -> Result<Option<StoredDocument>, StoreError> {
        let row: Option<String> = self.db.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT data FROM documents WHERE collection = ?1 AND id = ?2",
                    params![collection, key],
                    |r| r.get(0),
                )
                .optional()?)
        })?;

        row.map(|json| parse_document(key.to_string(), &json))
            .transpose()
    }

    async fn query(&self, query: &Query) -> Result<Vec<StoredDocument>, StoreError> {
        let path = field_path(&query.order_by)?;
        let direction = match query.direction {
            Direction::Ascending => "ASC",
            Direction::Descending => "DESC",
        };
        let limit: i64 = query.limit.map(|l| l as i64).unwrap_or(-1);

        let sql = format!(
            "SELECT id, data FROM documents WHERE collection = ?1
             ORDER BY json_extract(data, ?2) {dir}, id {dir} LIMIT ?3",
            dir = direction
        );

        let rows: Vec<(String, String)> = self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![query.collection, path, limit], |r| {
                    Ok((r.get(0)?, r.get(1)?))
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;

        rows.into_iter()
            .map(|(id, json)| parse_document(id, &json))
            .collect()
    }

    fn name(&self) -> &'static str {
        "sqlite"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn body(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    fn store() -> SqliteStore {
        SqliteStore::new(Database::open_in_memory().expect("open in-memory DB"))
    }

    #[test]
    fn test_open_file_db() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("test.db");
        let db = Database::open(&path).unwrap();
        let version = db.with_conn(migrations::schema_version).unwrap();
        assert_eq!(version, migrations::latest_version());
        assert!(path.exists());
    }

    #[test]
    fn test_default_database_path() {
        let path = default_database_path();
        assert!(path.is_some());
        let path = path.unwrap();
        assert!(path.ends_with("documents.db"));
        assert!(path.to_string_lossy().contains(".smarthvac"));
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let store = store();
        store
            .create("jobs", "job_1", body(json!({"status": "queued", "resultPath": null})))
            .await
            .unwrap();

        let doc = store.get("jobs", "job_1").await.unwrap().unwrap();
        assert_eq!(doc.id, "job_1");
        assert_eq!(doc.field("status"), Some(&json!("queued")));
        assert_eq!(doc.field("resultPath"), Some(&Value::Null));
        assert!(doc.field(CREATED_AT_FIELD).is_some());

        assert!(store.get("jobs", "missing").await.unwrap().is_none());
        assert!(store.get("other", "job_1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_existing_key_fails_without_overwrite() {
        let store = store();
        store
            .create("jobs", "k", body(json!({"inputText": "first"})))
            .await
            .unwrap();
        let err = store
            .create("jobs", "k", body(json!({"inputText": "second"})))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists { .. }));

        let doc = store.get("jobs", "k").await.unwrap().unwrap();
        assert_eq!(doc.field("inputText"), Some(&json!("first")));
    }

    #[tokio::test]
    async fn test_update_merges_fields() {
        let store = store();
        store
            .create("jobs", "k", body(json!({"status": "queued", "inputText": "t"})))
            .await
            .unwrap();
        store
            .update("jobs", "k", body(json!({"status": "error", "errorMessage": "boom"})))
            .await
            .unwrap();

        let doc = store.get("jobs", "k").await.unwrap().unwrap();
        assert_eq!(doc.field("status"), Some(&json!("error")));
        assert_eq!(doc.field("errorMessage"), Some(&json!("boom")));
        assert_eq!(doc.field("inputText"), Some(&json!("t")));
        assert_ne!(doc.field(CREATED_AT_FIELD), doc.field(UPDATED_AT_FIELD));

        let err = store.update("jobs", "nope", Document::new()).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_update_keeps_write_from_second_connection() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shared.db");
        let client = SqliteStore::open(&path).unwrap();
        let processor = SqliteStore::open(&path).unwrap();

        client
            .create("jobs", "k", body(json!({"status": "queued", "resultPath": null})))
            .await
            .unwrap();
        processor
            .update("jobs", "k", body(json!({"status": "running"})))
            .await
            .unwrap();
        client
            .update("jobs", "k", body(json!({"resultPath": "results/k"})))
            .await
            .unwrap();

        let doc = processor.get("jobs", "k").await.unwrap().unwrap();
        assert_eq!(doc.field("status"), Some(&json!("running")));
        assert_eq!(doc.field("resultPath"), Some(&json!("results/k")));
    }

    #[tokio::test]
    async fn test_update_reports_corrupt_document() {
        let store = store();
        store
            .database()
            .with_conn(|conn| {
                conn.execute(
                    "INSERT INTO documents (collection, id, data, created_at, updated_at)
                     VALUES ('jobs', 'bad', '[1, 2]', 't', 't')",
                    [],
                )?;
                Ok(())
            })
            .unwrap();

        let err = store
            .update("jobs", "bad", body(json!({"status": "done"})))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Database(DatabaseError::CorruptDocument { .. })
        ));
    }

    #[tokio::test]
    async fn test_query_orders_and_limits() {
        let store = store();
        for key in ["a", "b", "c", "d"] {
            store.create("jobs", key, Document::new()).await.unwrap();
        }
        store.create("other", "z", Document::new()).await.unwrap();

        let docs = store
            .query(&Query::newest_first("jobs").limit(3))
            .await
            .unwrap();
        let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["d", "c", "b"]);

        let all = store
            .query(&Query::newest_first("jobs").order_by(CREATED_AT_FIELD, Direction::Ascending))
            .await
            .unwrap();
        assert_eq!(all.len(), 4);
        assert_eq!(all[0].id, "a");
    }

    #[tokio::test]
    async fn test_query_rejects_odd_field_names() {
        let store = store();
        let query = Query::newest_first("jobs").order_by("a') --", Direction::Ascending);
        assert!(store.query(&query).await.is_err());
    }

    #[tokio::test]
    async fn test_generated_key_create() {
        let store = store();
        let key = store
            .create_with_generated_key("test_connectivity", body(json!({"message": "hi"})))
            .await
            .unwrap();
        let doc = store.get("test_connectivity", &key).await.unwrap().unwrap();
        assert_eq!(doc.field("message"), Some(&json!("hi")));
    }

    #[test]
    fn test_sqlite_store_has_no_push_feed() {
        assert!(store().change_feed().is_none());
    }
}
