//! Document store abstraction.
//!
//! The job collection lives in an external document store. This module
//! defines the operations the client relies on and ships three adapters:
//! an in-process store, a SQLite-backed store and a Firestore REST adapter.

use std::cmp::Ordering;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, SecondsFormat, Utc};
use serde_json::{Map, Value};
use tokio::sync::broadcast;

pub mod error;
pub mod firestore;
pub mod memory;
pub mod sqlite;
pub mod subscription;

pub use error::StoreError;
pub use firestore::FirestoreStore;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use subscription::{ChangeKind, DocumentChange, QuerySnapshot, Subscription};

/// Field the store stamps on create.
pub const CREATED_AT_FIELD: &str = "createdAt";
/// Field the store stamps on every write.
pub const UPDATED_AT_FIELD: &str = "updatedAt";

/// Document body: a JSON object.
pub type Document = Map<String, Value>;

/// A document as returned by the store, with its key.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub id: String,
    pub data: Document,
}

impl StoredDocument {
    pub fn new(id: impl Into<String>, data: Document) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.data.get(name)
    }
}

/// Sort direction of an ordered query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// An ordered, optionally limited query over one collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub collection: String,
    pub order_by: String,
    pub direction: Direction,
    pub limit: Option<usize>,
}

impl Query {
    /// All documents of `collection`, newest first.
    pub fn newest_first(collection: &str) -> Self {
        Self {
            collection: collection.to_string(),
            order_by: CREATED_AT_FIELD.to_string(),
            direction: Direction::Descending,
            limit: None,
        }
    }

    pub fn order_by(mut self, field: &str, direction: Direction) -> Self {
        self.order_by = field.to_string();
        self.direction = direction;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Sorts and truncates documents the way the store is expected to.
    pub fn apply(&self, mut docs: Vec<StoredDocument>) -> Vec<StoredDocument> {
        docs.sort_by(|a, b| {
            let ord = compare_values(a.field(&self.order_by), b.field(&self.order_by))
                .then_with(|| a.id.cmp(&b.id));
            match self.direction {
                Direction::Ascending => ord,
                Direction::Descending => ord.reverse(),
            }
        });
        if let Some(limit) = self.limit {
            docs.truncate(limit);
        }
        docs
    }
}

/// Total order over the JSON values used as sort keys.
/// Missing and null values sort first, then booleans, numbers, strings.
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(v: Option<&Value>) -> u8 {
        match v {
            None | Some(Value::Null) => 0,
            Some(Value::Bool(_)) => 1,
            Some(Value::Number(_)) => 2,
            Some(Value::String(_)) => 3,
            Some(Value::Array(_)) => 4,
            Some(Value::Object(_)) => 5,
        }
    }

    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

/// Notice that a document in a collection changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeNotice {
    pub collection: String,
    pub id: String,
}

/// Operations the client needs from the external document store.
///
/// Stores assign `createdAt` on create and `updatedAt` on every write.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Creates `key` in `collection`. Fails with [`StoreError::AlreadyExists`]
    /// when the key is taken; never overwrites.
    async fn create(&self, collection: &str, key: &str, data: Document) -> Result<(), StoreError>;

    /// Creates a document under a key chosen by the store and returns it.
    async fn create_with_generated_key(
        &self,
        collection: &str,
        data: Document,
    ) -> Result<String, StoreError>;

    /// Merges `patch` into an existing document. Fails with
    /// [`StoreError::NotFound`] when the document is absent.
    async fn update(&self, collection: &str, key: &str, patch: Document)
        -> Result<(), StoreError>;

    async fn get(&self, collection: &str, key: &str) -> Result<Option<StoredDocument>, StoreError>;

    async fn query(&self, query: &Query) -> Result<Vec<StoredDocument>, StoreError>;

    /// Push notifications for writes, when the store can deliver them.
    /// Stores returning `None` are polled by subscriptions.
    fn change_feed(&self) -> Option<broadcast::Receiver<ChangeNotice>> {
        None
    }

    /// Short backend name for logs.
    fn name(&self) -> &'static str;
}

/// Server-side clock handing out strictly increasing timestamps, so that
/// documents created back to back still have a total creation order.
pub(crate) struct ServerClock {
    last: Mutex<Option<DateTime<Utc>>>,
}

impl ServerClock {
    pub(crate) fn new() -> Self {
        Self {
            last: Mutex::new(None),
        }
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        let mut last = match self.last.lock() {
            Ok(g) => g,
            Err(poisoned) => {
                log::warn!("Server clock lock was poisoned, recovering");
                poisoned.into_inner()
            }
        };
        let mut now = Utc::now();
        if let Some(prev) = *last {
            if now <= prev {
                now = prev + ChronoDuration::microseconds(1);
            }
        }
        *last = Some(now);
        now
    }
}

/// Timestamps are stored as fixed-width RFC 3339 strings so that string
/// order equals chronological order.
pub fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Generates a 20 character alphanumeric key, the shape hosted stores use
/// for generated document ids.
pub fn generate_key() -> String {
    uuid::Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(20)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(id: &str, created: &str) -> StoredDocument {
        let mut data = Document::new();
        data.insert(CREATED_AT_FIELD.to_string(), json!(created));
        StoredDocument::new(id, data)
    }

    #[test]
    fn test_query_apply_orders_newest_first_and_limits() {
        let query = Query::newest_first("jobs").limit(2);
        let docs = vec![
            doc("a", "2026-01-01T00:00:00.000000Z"),
            doc("b", "2026-01-03T00:00:00.000000Z"),
            doc("c", "2026-01-02T00:00:00.000000Z"),
        ];

        let result = query.apply(docs);
        let ids: Vec<&str> = result.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[test]
    fn test_query_apply_ascending() {
        let query = Query::newest_first("jobs").order_by(CREATED_AT_FIELD, Direction::Ascending);
        let docs = vec![
            doc("late", "2026-01-02T00:00:00.000000Z"),
            doc("early", "2026-01-01T00:00:00.000000Z"),
        ];
        let result = query.apply(docs);
        assert_eq!(result[0].id, "early");
    }

    #[test]
    fn test_missing_sort_field_sorts_last_when_descending() {
        let query = Query::newest_first("jobs");
        let docs = vec![
            StoredDocument::new("pending", Document::new()),
            doc("stamped", "2026-01-01T00:00:00.000000Z"),
        ];
        let result = query.apply(docs);
        assert_eq!(result[0].id, "stamped");
        assert_eq!(result[1].id, "pending");
    }

    #[test]
    fn test_compare_values_numbers() {
        assert_eq!(
            compare_values(Some(&json!(2)), Some(&json!(10))),
            Ordering::Less
        );
        assert_eq!(
            compare_values(None, Some(&json!("x"))),
            Ordering::Less
        );
    }

    #[test]
    fn test_server_clock_is_strictly_increasing() {
        let clock = ServerClock::new();
        let mut prev = clock.now();
        for _ in 0..100 {
            let next = clock.now();
            assert!(next > prev);
            prev = next;
        }
    }

    #[test]
    fn test_format_timestamp_sorts_lexically() {
        let a = "2026-01-01T00:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let b = a + ChronoDuration::milliseconds(5);
        assert!(format_timestamp(a) < format_timestamp(b));
        assert!(format_timestamp(a).ends_with('Z'));
    }

    #[test]
    fn test_generate_key_shape() {
        let key = generate_key();
        assert_eq!(key.len(), 20);
        assert!(key.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(key, generate_key());
    }
}
