//! Client context: the backends and shared channels every component uses.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::blob::{BlobStore, FirebaseStorage, FsBlobStore, MemoryBlobStore};
use crate::config::{
    default_blob_root, default_local_storage_path, BackendConfig, ClientConfig,
    LocalBackendConfig,
};
use crate::connectivity::{check_connectivity, ConnectivityReport};
use crate::error::{ClientError, ConfigError, StoreError};
use crate::observer::JobObserver;
use crate::settings::LocalSettings;
use crate::store::sqlite::default_database_path;
use crate::store::{DocumentStore, FirestoreStore, MemoryStore, SqliteStore};
use crate::submit::JobSubmitter;

/// Capacity of the refresh channel; refreshes carry no data, so lagging
/// receivers lose nothing.
const REFRESH_CAPACITY: usize = 16;

pub struct ClientContext {
    config: ClientConfig,
    store: Arc<dyn DocumentStore>,
    blobs: Arc<dyn BlobStore>,
    settings: LocalSettings,
    refresh: broadcast::Sender<()>,
    shutdown: CancellationToken,
}

impl ClientContext {
    /// Builds a context from already constructed backends.
    pub fn new(
        config: ClientConfig,
        store: Arc<dyn DocumentStore>,
        blobs: Arc<dyn BlobStore>,
        settings: LocalSettings,
    ) -> Self {
        let (refresh, _) = broadcast::channel(REFRESH_CAPACITY);
        Self {
            config,
            store,
            blobs,
            settings,
            refresh,
            shutdown: CancellationToken::new(),
        }
    }

    /// Builds the backends named by `config`.
    pub fn init(config: ClientConfig) -> Result<Self, ClientError> {
        let timeout = Duration::from_secs(config.request_timeout_secs);

        let (store, blobs): (Arc<dyn DocumentStore>, Arc<dyn BlobStore>) = match &config.backend
        {
            BackendConfig::Memory => (
                Arc::new(MemoryStore::new()),
                Arc::new(MemoryBlobStore::new()),
            ),
            BackendConfig::Local(local) => open_local(local)?,
            BackendConfig::Firebase(firebase) => (
                Arc::new(FirestoreStore::new(firebase, timeout)?),
                Arc::new(FirebaseStorage::new(firebase, timeout)?),
            ),
        };

        let settings = match config
            .local_storage
            .clone()
            .or_else(default_local_storage_path)
        {
            Some(path) => LocalSettings::from_file(path),
            None => {
                log::warn!("No local storage path available, simulation config will be empty");
                LocalSettings::empty()
            }
        };

        log::info!(
            "Client initialized with {} store and {} blobs",
            store.name(),
            blobs.name()
        );

        Ok(Self::new(config, store, blobs, settings))
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub fn blobs(&self) -> &Arc<dyn BlobStore> {
        &self.blobs
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.config.request_timeout_secs)
    }

    pub fn submitter(&self) -> JobSubmitter {
        JobSubmitter::new(
            self.store.clone(),
            self.settings.clone(),
            self.config.jobs.collection.clone(),
            self.request_timeout(),
            self.refresh.clone(),
        )
    }

    pub fn observer(&self) -> JobObserver {
        JobObserver::new(
            self.store.clone(),
            self.blobs.clone(),
            &self.config.jobs,
            self.request_timeout(),
            self.refresh.clone(),
            self.shutdown.clone(),
        )
    }

    pub async fn check_connectivity(&self) -> Result<ConnectivityReport, StoreError> {
        check_connectivity(self.store.as_ref(), self.request_timeout()).await
    }

    /// Token cancelled on shutdown.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Stops every feed opened through this context.
    pub fn shutdown(&self) {
        if !self.shutdown.is_cancelled() {
            log::info!("Shutting down client context");
            self.shutdown.cancel();
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

impl Drop for ClientContext {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

fn open_local(
    local: &LocalBackendConfig,
) -> Result<(Arc<dyn DocumentStore>, Arc<dyn BlobStore>), ClientError> {
    let database = local
        .database
        .clone()
        .or_else(default_database_path)
        .ok_or(ConfigError::NoHomeDirectory)?;
    let blob_root = local
        .blob_root
        .clone()
        .or_else(default_blob_root)
        .ok_or(ConfigError::NoHomeDirectory)?;

    let store = SqliteStore::open(&database)?;
    Ok((Arc::new(store), Arc::new(FsBlobStore::new(blob_root))))
}
