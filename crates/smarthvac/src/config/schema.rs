use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    pub version: String,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub jobs: JobsConfig,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// JSON file standing in for device storage. Defaults to
    /// `~/.smarthvac/local_storage.json`.
    #[serde(default)]
    pub local_storage: Option<PathBuf>,
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            backend: BackendConfig::default(),
            jobs: JobsConfig::default(),
            request_timeout_secs: default_request_timeout_secs(),
            local_storage: None,
        }
    }
}

/// Where job documents and result blobs live.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BackendConfig {
    /// In-process stores; nothing survives the process.
    Memory,
    /// SQLite document store plus a blob directory.
    Local(LocalBackendConfig),
    /// Hosted Firestore and Firebase Storage.
    Firebase(FirebaseConfig),
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig::Local(LocalBackendConfig::default())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalBackendConfig {
    /// Defaults to `~/.smarthvac/data/documents.db`.
    #[serde(default)]
    pub database: Option<PathBuf>,
    /// Defaults to `~/.smarthvac/blobs`.
    #[serde(default)]
    pub blob_root: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirebaseConfig {
    pub project_id: String,
    #[serde(default)]
    pub api_key: Option<String>,
    pub storage_bucket: String,
    #[serde(default = "default_database")]
    pub database: String,
    #[serde(default = "default_firestore_url")]
    pub firestore_url: String,
    #[serde(default = "default_storage_url")]
    pub storage_url: String,
    /// OAuth bearer token, when the rules require an authenticated caller.
    #[serde(default)]
    pub auth_token: Option<String>,
}

fn default_database() -> String {
    "(default)".to_string()
}

fn default_firestore_url() -> String {
    "https://firestore.googleapis.com/v1".to_string()
}

fn default_storage_url() -> String {
    "https://firebasestorage.googleapis.com".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobsConfig {
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default = "default_list_limit")]
    pub list_limit: usize,
    /// Re-query interval for stores without push notifications.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

fn default_collection() -> String {
    "jobs".to_string()
}

fn default_list_limit() -> usize {
    10
}

fn default_poll_interval_secs() -> u64 {
    30
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            collection: default_collection(),
            list_limit: default_list_limit(),
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}
