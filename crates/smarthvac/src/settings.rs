//! Read-only access to locally cached client settings.
//!
//! Device storage is modelled as a JSON object of string keys, kept in a file
//! on disk. The submitter copies the simulation configuration blob stored
//! under [`SIMULATION_CONFIG_KEY`] into every new job.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::error::SettingsError;

/// Key of the cached simulation configuration.
pub const SIMULATION_CONFIG_KEY: &str = "smartHVAC_config";

#[derive(Debug, Clone)]
enum Source {
    File(PathBuf),
    Fixed(Map<String, Value>),
}

#[derive(Debug, Clone)]
pub struct LocalSettings {
    source: Source,
}

impl LocalSettings {
    /// Settings backed by a JSON file. A missing file reads as empty.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Self {
        Self {
            source: Source::File(path.as_ref().to_path_buf()),
        }
    }

    /// Settings with fixed entries.
    pub fn from_entries(entries: Map<String, Value>) -> Self {
        Self {
            source: Source::Fixed(entries),
        }
    }

    pub fn empty() -> Self {
        Self::from_entries(Map::new())
    }

    fn entries(&self) -> Result<Map<String, Value>, SettingsError> {
        match &self.source {
            Source::Fixed(entries) => Ok(entries.clone()),
            Source::File(path) => {
                let content = match std::fs::read_to_string(path) {
                    Ok(c) => c,
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
                    Err(e) => {
                        return Err(SettingsError::ReadFile {
                            path: path.clone(),
                            source: e,
                        })
                    }
                };
                if content.trim().is_empty() {
                    return Ok(Map::new());
                }
                Ok(serde_json::from_str(&content)?)
            }
        }
    }

    pub fn get_item(&self, key: &str) -> Result<Option<Value>, SettingsError> {
        Ok(self.entries()?.remove(key))
    }

    /// The cached simulation configuration, or `{}` when none is stored.
    ///
    /// Values may be stored as JSON text or as structured JSON. Unreadable
    /// or malformed settings are logged and treated as absent.
    pub fn simulation_config(&self) -> Value {
        let empty = || Value::Object(Map::new());

        let item = match self.get_item(SIMULATION_CONFIG_KEY) {
            Ok(item) => item,
            Err(e) => {
                log::warn!("Could not read local settings, using empty config: {}", e);
                return empty();
            }
        };

        match item {
            None | Some(Value::Null) => empty(),
            Some(Value::String(text)) if text.trim().is_empty() => empty(),
            Some(Value::String(text)) => match serde_json::from_str(&text) {
                Ok(value) => value,
                Err(e) => {
                    log::warn!(
                        "Cached '{}' is not valid JSON, using empty config: {}",
                        SIMULATION_CONFIG_KEY,
                        e
                    );
                    empty()
                }
            },
            Some(value) => value,
        }
    }
}
