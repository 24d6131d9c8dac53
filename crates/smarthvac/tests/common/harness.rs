//! Test harness for isolated client execution.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Map, Value};
use tempfile::TempDir;

use smarthvac::blob::result_plot_key;
use smarthvac::config::{BackendConfig, ClientConfig, LocalBackendConfig};
use smarthvac::observer::{FeedUpdate, JobFeed, JobListView};
use smarthvac::{
    ClientContext, DocumentStore, FsBlobStore, LocalSettings, MemoryBlobStore, MemoryStore,
    SqliteStore,
};

/// How the harness uploads result plots.
enum PlotWriter {
    Memory(Arc<MemoryBlobStore>),
    Filesystem(FsBlobStore),
}

/// Isolated client plus a stand-in for the external job processor.
pub struct TestHarness {
    temp_dir: TempDir,
    /// Client under test.
    pub context: ClientContext,
    /// The processor's handle on the job collection.
    processor: Arc<dyn DocumentStore>,
    plots: PlotWriter,
    /// File standing in for device storage.
    pub local_storage: PathBuf,
}

impl TestHarness {
    /// Harness on in-process stores with push notifications.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let local_storage = temp_dir.path().join("local_storage.json");

        let store = Arc::new(MemoryStore::new());
        let blobs = Arc::new(MemoryBlobStore::new());
        let config = ClientConfig {
            backend: BackendConfig::Memory,
            ..ClientConfig::default()
        };
        let context = ClientContext::new(
            config,
            store.clone(),
            blobs.clone(),
            LocalSettings::from_file(&local_storage),
        );

        Self {
            temp_dir,
            context,
            processor: store,
            plots: PlotWriter::Memory(blobs),
            local_storage,
        }
    }

    /// Harness on the SQLite backend. The processor writes through its own
    /// connection, like a separate process would, so the client has to poll.
    pub fn local(poll_interval_secs: u64) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();
        let local_storage = base.join("local_storage.json");
        let database = base.join("data").join("documents.db");
        let blob_root = base.join("blobs");

        let mut config = ClientConfig {
            backend: BackendConfig::Local(LocalBackendConfig {
                database: Some(database.clone()),
                blob_root: Some(blob_root.clone()),
            }),
            local_storage: Some(local_storage.clone()),
            ..ClientConfig::default()
        };
        config.jobs.poll_interval_secs = poll_interval_secs;

        let context = ClientContext::init(config).expect("Failed to init client");
        let processor = SqliteStore::open(&database).expect("Failed to open processor db");

        Self {
            temp_dir,
            context,
            processor: Arc::new(processor),
            plots: PlotWriter::Filesystem(FsBlobStore::new(blob_root)),
            local_storage,
        }
    }

    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Stores a simulation config the way the settings page would.
    pub fn write_simulation_config(&self, config: &Value) {
        let entries = json!({ "smartHVAC_config": config.to_string() });
        std::fs::write(&self.local_storage, entries.to_string())
            .expect("Failed to write local storage");
    }

    fn collection(&self) -> String {
        self.context.config().jobs.collection.clone()
    }

    /// Applies a processor-side patch to a job.
    pub async fn processor_update(&self, job_id: &str, patch: Value) {
        let Value::Object(patch) = patch else {
            panic!("patch must be an object");
        };
        self.processor
            .update(&self.collection(), job_id, patch)
            .await
            .expect("Processor update failed");
    }

    /// Inserts a job document directly, bypassing the submitter.
    pub async fn insert_job(&self, job_id: &str, fields: Value) {
        let Value::Object(fields) = fields else {
            panic!("fields must be an object");
        };
        self.processor
            .create(&self.collection(), job_id, fields)
            .await
            .expect("Processor insert failed");
    }

    pub async fn mark_running(&self, job_id: &str) {
        self.processor_update(
            job_id,
            json!({
                "status": "running",
                "idfFilePath": format!("inputs/{}/model.idf", job_id),
                "weatherFilePath": format!("inputs/{}/weather.epw", job_id),
            }),
        )
        .await;
    }

    pub async fn mark_done(&self, job_id: &str) {
        self.processor_update(
            job_id,
            json!({ "status": "done", "resultPath": format!("results/{}/", job_id) }),
        )
        .await;
    }

    pub async fn mark_failed(&self, job_id: &str, message: Option<&str>) {
        self.processor_update(
            job_id,
            json!({ "status": "error", "errorMessage": message }),
        )
        .await;
    }

    /// Uploads the zone plot of a job.
    pub fn upload_plot(&self, job_id: &str) {
        let key = result_plot_key(job_id);
        let png = b"\x89PNG\r\n\x1a\n".to_vec();
        match &self.plots {
            PlotWriter::Memory(blobs) => blobs.insert(&key, png).expect("Failed to insert plot"),
            PlotWriter::Filesystem(blobs) => {
                blobs.put(&key, &png).expect("Failed to write plot");
            }
        }
    }

    /// Raw stored document of a job.
    pub async fn document(&self, job_id: &str) -> Option<Map<String, Value>> {
        self.processor
            .get(&self.collection(), job_id)
            .await
            .expect("Processor read failed")
            .map(|doc| doc.data)
    }

    pub async fn job_count(&self) -> usize {
        let query = smarthvac::Query::newest_first(&self.collection());
        self.processor
            .query(&query)
            .await
            .expect("Processor query failed")
            .len()
    }
}

/// Waits for the next rendered list that satisfies `accept`, skipping
/// intermediate renders.
pub async fn wait_for_render<F>(feed: &mut JobFeed, accept: F) -> JobListView
where
    F: Fn(&JobListView) -> bool,
{
    let deadline = Duration::from_secs(5);
    tokio::time::timeout(deadline, async {
        loop {
            match feed.next_update().await {
                Some(FeedUpdate::Rendered(view)) if accept(&view) => return view,
                Some(_) => continue,
                None => panic!("feed closed while waiting for a render"),
            }
        }
    })
    .await
    .expect("Timed out waiting for a matching render")
}
