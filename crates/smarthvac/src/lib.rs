pub mod blob;
pub mod config;
pub mod connectivity;
pub mod context;
pub mod error;
pub mod job;
pub mod observer;
pub mod settings;
pub mod store;
pub mod submit;

pub use blob::{BlobStore, FirebaseStorage, FsBlobStore, MemoryBlobStore};
pub use config::{load_config, load_or_default, BackendConfig, ClientConfig, JobsConfig};
pub use connectivity::{check_connectivity, ConnectivityReport};
pub use context::ClientContext;
pub use error::{BlobError, ClientError, ConfigError, Result, SettingsError, StoreError, SubmitError};
pub use job::{Job, JobStatus, NewJob};
pub use observer::{FeedUpdate, JobDetailView, JobFeed, JobListView, JobObserver, ResultPanel, RowAccent};
pub use settings::LocalSettings;
pub use store::{DocumentStore, FirestoreStore, MemoryStore, Query, SqliteStore, Subscription};
pub use submit::{JobSubmitter, SubmissionForm, SubmittedJob};
