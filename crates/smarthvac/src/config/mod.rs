pub mod loader;
pub mod schema;

use std::path::PathBuf;

pub use loader::{load_config, load_config_from_str, load_or_default, CONFIG_ENV_VAR};
pub use schema::{BackendConfig, ClientConfig, FirebaseConfig, JobsConfig, LocalBackendConfig};

/// `~/.smarthvac`, the root of all per-user client state.
pub fn smarthvac_home() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".smarthvac"))
}

/// Returns the default config path: `~/.smarthvac/config.json`.
pub fn default_config_path() -> Option<PathBuf> {
    smarthvac_home().map(|h| h.join("config.json"))
}

/// Returns the default local storage file: `~/.smarthvac/local_storage.json`.
pub fn default_local_storage_path() -> Option<PathBuf> {
    smarthvac_home().map(|h| h.join("local_storage.json"))
}

/// Returns the default blob directory of the local backend.
pub fn default_blob_root() -> Option<PathBuf> {
    smarthvac_home().map(|h| h.join("blobs"))
}
