use std::path::{Path, PathBuf};

use crate::config::schema::{BackendConfig, ClientConfig};
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../../../schema/client-config-v1.json");

/// Environment variable overriding the config file location.
pub const CONFIG_ENV_VAR: &str = "SMARTHVAC_CONFIG";

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<ClientConfig, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<ClientConfig, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let config: ClientConfig = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

/// Resolves and loads the client configuration.
///
/// An explicit path, or one named by `SMARTHVAC_CONFIG`, must exist. The
/// default `~/.smarthvac/config.json` is optional; when it is absent the
/// built-in defaults apply.
pub fn load_or_default(explicit: Option<&Path>) -> Result<ClientConfig, ConfigError> {
    let from_env = std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from);
    if let Some(path) = explicit.map(Path::to_path_buf).or(from_env) {
        log::debug!("Loading config from {}", path.display());
        return load_config(path);
    }

    match super::default_config_path() {
        Some(path) if path.exists() => {
            log::debug!("Loading config from {}", path.display());
            load_config(path)
        }
        Some(path) => {
            log::info!("No config at {}, using defaults", path.display());
            Ok(ClientConfig::default())
        }
        None => Ok(ClientConfig::default()),
    }
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

fn validate_config(config: &ClientConfig) -> Result<(), ConfigError> {
    let invalid = |message: &str| {
        Err(ConfigError::Validation {
            message: message.to_string(),
        })
    };

    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    if config.jobs.collection.trim().is_empty() {
        return invalid("jobs.collection must not be empty");
    }
    if config.jobs.collection.contains('/') {
        return invalid("jobs.collection must not contain '/'");
    }
    if config.jobs.list_limit == 0 {
        return invalid("jobs.listLimit must be at least 1");
    }
    if config.jobs.poll_interval_secs == 0 {
        return invalid("jobs.pollIntervalSecs must be at least 1");
    }
    if config.request_timeout_secs == 0 {
        return invalid("requestTimeoutSecs must be at least 1");
    }

    if let BackendConfig::Firebase(firebase) = &config.backend {
        if firebase.project_id.trim().is_empty() {
            return invalid("backend.projectId must not be empty");
        }
        if firebase.storage_bucket.trim().is_empty() {
            return invalid("backend.storageBucket must not be empty");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_minimal_config_uses_defaults() {
        let config = load_config_from_str(r#"{ "version": "1.0" }"#).unwrap();
        assert_eq!(config.jobs.collection, "jobs");
        assert_eq!(config.jobs.list_limit, 10);
        assert_eq!(config.jobs.poll_interval_secs, 30);
        assert_eq!(config.request_timeout_secs, 30);
        assert!(matches!(config.backend, BackendConfig::Local(_)));
    }

    #[test]
    fn test_load_firebase_config() {
        let config_json = r#"
        {
            "version": "1.0",
            "backend": {
                "kind": "firebase",
                "projectId": "smarthvac-studio",
                "apiKey": "AIza-test",
                "storageBucket": "smarthvac-studio.appspot.com"
            },
            "jobs": { "listLimit": 25, "pollIntervalSecs": 5 },
            "requestTimeoutSecs": 10
        }
        "#;

        let config = load_config_from_str(config_json).unwrap();
        match &config.backend {
            BackendConfig::Firebase(fb) => {
                assert_eq!(fb.project_id, "smarthvac-studio");
                assert_eq!(fb.api_key.as_deref(), Some("AIza-test"));
                assert_eq!(fb.database, "(default)");
                assert_eq!(fb.firestore_url, "https://firestore.googleapis.com/v1");
            }
            other => panic!("unexpected backend {:?}", other),
        }
        assert_eq!(config.jobs.list_limit, 25);
        assert_eq!(config.request_timeout_secs, 10);
    }

    #[test]
    fn test_load_local_config() {
        let config = load_config_from_str(
            r#"{ "version": "1.0", "backend": { "kind": "local", "database": "/tmp/d.db", "blobRoot": "/tmp/blobs" } }"#,
        )
        .unwrap();
        match config.backend {
            BackendConfig::Local(local) => {
                assert_eq!(local.database, Some(PathBuf::from("/tmp/d.db")));
                assert_eq!(local.blob_root, Some(PathBuf::from("/tmp/blobs")));
            }
            other => panic!("unexpected backend {:?}", other),
        }
    }

    #[test]
    fn test_schema_rejects_unknown_backend() {
        let result = load_config_from_str(r#"{ "version": "1.0", "backend": { "kind": "s3" } }"#);
        assert!(matches!(result, Err(ConfigError::SchemaValidation { .. })));
    }

    #[test]
    fn test_schema_rejects_firebase_without_bucket() {
        let result = load_config_from_str(
            r#"{ "version": "1.0", "backend": { "kind": "firebase", "projectId": "p" } }"#,
        );
        assert!(matches!(result, Err(ConfigError::SchemaValidation { .. })));
    }

    #[test]
    fn test_schema_rejects_unknown_field() {
        let result = load_config_from_str(r#"{ "version": "1.0", "workers": 4 }"#);
        assert!(matches!(result, Err(ConfigError::SchemaValidation { .. })));
    }

    #[test]
    fn test_invalid_version() {
        let result = load_config_from_str(r#"{ "version": "2.0" }"#);
        assert!(matches!(result, Err(ConfigError::Validation { .. })));
    }

    #[test]
    fn test_zero_limit_rejected() {
        let result = load_config_from_str(r#"{ "version": "1.0", "jobs": { "listLimit": 0 } }"#);
        match result {
            Err(ConfigError::Validation { message }) => assert!(message.contains("listLimit")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_empty_project_rejected() {
        let result = load_config_from_str(
            r#"{ "version": "1.0", "backend": { "kind": "firebase", "projectId": " ", "storageBucket": "b" } }"#,
        );
        assert!(matches!(result, Err(ConfigError::Validation { .. })));
    }

    #[test]
    fn test_invalid_json() {
        let result = load_config_from_str("{ not json");
        assert!(matches!(result, Err(ConfigError::ParseJson(_))));
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let result = load_or_default(Some(&dir.path().join("missing.json")));
        assert!(matches!(result, Err(ConfigError::ReadFile { .. })));
    }

    #[test]
    fn test_explicit_file_is_loaded() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "version": "1.0", "backend": { "kind": "memory" } }"#).unwrap();

        let config = load_or_default(Some(&path)).unwrap();
        assert!(matches!(config.backend, BackendConfig::Memory));
    }
}
