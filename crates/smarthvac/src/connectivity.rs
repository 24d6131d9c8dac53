use std::time::{Duration, Instant};

use chrono::Utc;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::store::{format_timestamp, DocumentStore, StoreError};

pub const CONNECTIVITY_COLLECTION: &str = "test_connectivity";
pub const CONNECTIVITY_MESSAGE: &str = "SmartHVAC Studio connected";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectivityReport {
    pub backend: String,
    pub collection: String,
    pub key: String,
    pub elapsed_ms: u64,
}

/// Writes a probe document under a store-generated key.
pub async fn check_connectivity(
    store: &dyn DocumentStore,
    timeout: Duration,
) -> Result<ConnectivityReport, StoreError> {
    let mut probe = Map::new();
    probe.insert(
        "message".to_string(),
        Value::String(CONNECTIVITY_MESSAGE.to_string()),
    );
    probe.insert(
        "timestamp".to_string(),
        Value::String(format_timestamp(Utc::now())),
    );

    let started = Instant::now();
    let key = tokio::time::timeout(
        timeout,
        store.create_with_generated_key(CONNECTIVITY_COLLECTION, probe),
    )
    .await
    .map_err(|_| StoreError::Timeout(timeout))??;
    let elapsed_ms = started.elapsed().as_millis() as u64;

    log::info!(
        "Connectivity probe written to {}/{} on {} in {}ms",
        CONNECTIVITY_COLLECTION,
        key,
        store.name(),
        elapsed_ms
    );

    Ok(ConnectivityReport {
        backend: store.name().to_string(),
        collection: CONNECTIVITY_COLLECTION.to_string(),
        key,
        elapsed_ms,
    })
}
