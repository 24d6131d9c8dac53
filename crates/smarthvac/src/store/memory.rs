//! In-process document store with push change notifications.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;

use super::{
    format_timestamp, generate_key, ChangeNotice, Document, DocumentStore, Query, ServerClock,
    StoreError, StoredDocument, CREATED_AT_FIELD, UPDATED_AT_FIELD,
};

type Collections = HashMap<String, BTreeMap<String, Document>>;

/// Document store held entirely in memory.
///
/// Every write is announced on a broadcast channel, so subscriptions
/// re-query immediately instead of polling.
pub struct MemoryStore {
    collections: RwLock<Collections>,
    clock: ServerClock,
    changes: broadcast::Sender<ChangeNotice>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(256);
        Self {
            collections: RwLock::new(HashMap::new()),
            clock: ServerClock::new(),
            changes,
        }
    }

    /// Removes a document. Returns whether it existed.
    pub fn remove(&self, collection: &str, key: &str) -> bool {
        let removed = self
            .write_guard()
            .get_mut(collection)
            .and_then(|docs| docs.remove(key))
            .is_some();
        if removed {
            self.notify(collection, key);
        }
        removed
    }

    /// Number of documents in a collection.
    pub fn len(&self, collection: &str) -> usize {
        self.read_guard()
            .get(collection)
            .map(|docs| docs.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }

    fn read_guard(&self) -> std::sync::RwLockReadGuard<'_, Collections> {
        match self.collections.read() {
            Ok(g) => g,
            Err(poisoned) => {
                log::warn!("Memory store lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write_guard(&self) -> std::sync::RwLockWriteGuard<'_, Collections> {
        match self.collections.write() {
            Ok(g) => g,
            Err(poisoned) => {
                log::warn!("Memory store lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn notify(&self, collection: &str, key: &str) {
        // No subscribers is fine
        let _ = self.changes.send(ChangeNotice {
            collection: collection.to_string(),
            id: key.to_string(),
        });
    }

    fn insert_new(&self, collection: &str, key: &str, mut data: Document) -> Result<(), StoreError> {
        {
            let mut guard = self.write_guard();
            let docs = guard.entry(collection.to_string()).or_default();
            if docs.contains_key(key) {
                return Err(StoreError::AlreadyExists {
                    collection: collection.to_string(),
                    key: key.to_string(),
                });
            }
            let now = Value::String(format_timestamp(self.clock.now()));
            data.insert(CREATED_AT_FIELD.to_string(), now.clone());
            data.insert(UPDATED_AT_FIELD.to_string(), now);
            docs.insert(key.to_string(), data);
        }
        self.notify(collection, key);
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
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
        {
            let mut guard = self.write_guard();
            let doc = guard
                .get_mut(collection)
                .and_then(|docs| docs.get_mut(key))
                .ok_or_else(|| StoreError::NotFound {
                    collection: collection.to_string(),
                    key: key.to_string(),
                })?;
            for (field, value) in patch {
                if field == CREATED_AT_FIELD {
                    continue;
                }
                doc.insert(field, value);
            }
            doc.insert(
                UPDATED_AT_FIELD.to_string(),
                Value::String(format_timestamp(self.clock.now())),
            );
        }
        self.notify(collection, key);
        Ok(())
    }

    async fn get(&self, collection: &str, key: &str) -> Result<Option<StoredDocument>, StoreError> {
        Ok(self
            .read_guard()
            .get(collection)
            .and_then(|docs| docs.get(key))
            .map(|data| StoredDocument::new(key, data.clone())))
    }

    async fn query(&self, query: &Query) -> Result<Vec<StoredDocument>, StoreError> {
        let docs: Vec<StoredDocument> = self
            .read_guard()
            .get(&query.collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, data)| StoredDocument::new(id.clone(), data.clone()))
                    .collect()
            })
            .unwrap_or_default();
        Ok(query.apply(docs))
    }

    fn change_feed(&self) -> Option<broadcast::Receiver<ChangeNotice>> {
        Some(self.changes.subscribe())
    }

    fn name(&self) -> &'static str {
        "memory"
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

    #[tokio::test]
    async fn test_create_stamps_server_timestamps() {
        let store = MemoryStore::new();
        store
            .create("jobs", "job-1", body(json!({"status": "queued"})))
            .await
            .unwrap();

        let doc = store.get("jobs", "job-1").await.unwrap().unwrap();
        assert_eq!(doc.field("status"), Some(&json!("queued")));
        assert!(doc.field(CREATED_AT_FIELD).is_some());
        assert_eq!(doc.field(CREATED_AT_FIELD), doc.field(UPDATED_AT_FIELD));
    }

    #[tokio::test]
    async fn test_create_refuses_existing_key() {
        let store = MemoryStore::new();
        store
            .create("jobs", "dup", body(json!({"n": 1})))
            .await
            .unwrap();
        let err = store
            .create("jobs", "dup", body(json!({"n": 2})))
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::AlreadyExists { .. }));
        let doc = store.get("jobs", "dup").await.unwrap().unwrap();
        assert_eq!(doc.field("n"), Some(&json!(1)));
    }

    #[tokio::test]
    async fn test_update_merges_and_keeps_created_at() {
        let store = MemoryStore::new();
        store
            .create("jobs", "j", body(json!({"status": "queued", "inputText": "x"})))
            .await
            .unwrap();
        let before = store.get("jobs", "j").await.unwrap().unwrap();

        store
            .update(
                "jobs",
                "j",
                body(json!({"status": "done", "createdAt": "1970-01-01T00:00:00Z"})),
            )
            .await
            .unwrap();

        let after = store.get("jobs", "j").await.unwrap().unwrap();
        assert_eq!(after.field("status"), Some(&json!("done")));
        assert_eq!(after.field("inputText"), Some(&json!("x")));
        assert_eq!(after.field(CREATED_AT_FIELD), before.field(CREATED_AT_FIELD));
        assert_ne!(after.field(UPDATED_AT_FIELD), before.field(UPDATED_AT_FIELD));
    }

    #[tokio::test]
    async fn test_update_missing_document() {
        let store = MemoryStore::new();
        let err = store
            .update("jobs", "ghost", Document::new())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_generated_keys_are_distinct() {
        let store = MemoryStore::new();
        let a = store
            .create_with_generated_key("test_connectivity", Document::new())
            .await
            .unwrap();
        let b = store
            .create_with_generated_key("test_connectivity", Document::new())
            .await
            .unwrap();
        assert_ne!(a, b);
        assert_eq!(store.len("test_connectivity"), 2);
    }

    #[tokio::test]
    async fn test_query_newest_first() {
        let store = MemoryStore::new();
        for key in ["first", "second", "third"] {
            store.create("jobs", key, Document::new()).await.unwrap();
        }

        let docs = store
            .query(&Query::newest_first("jobs").limit(2))
            .await
            .unwrap();
        let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["third", "second"]);
    }

    #[tokio::test]
    async fn test_change_feed_announces_writes() {
        let store = MemoryStore::new();
        let mut feed = store.change_feed().unwrap();

        store.create("jobs", "j", Document::new()).await.unwrap();
        store
            .update("jobs", "j", body(json!({"status": "running"})))
            .await
            .unwrap();
        assert!(store.remove("jobs", "j"));

        for _ in 0..3 {
            let notice = feed.try_recv().unwrap();
            assert_eq!(notice.collection, "jobs");
            assert_eq!(notice.id, "j");
        }
        assert!(feed.try_recv().is_err());
    }
}
