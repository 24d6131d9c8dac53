use std::path::PathBuf;
use thiserror::Error;

pub use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Blob store error: {0}")]
    Blob(#[from] BlobError),

    #[error("Database error: {0}")]
    Database(#[from] crate::store::sqlite::DatabaseError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },

    #[error("Could not determine a home directory for default paths")]
    NoHomeDirectory,
}

#[derive(Error, Debug)]
pub enum BlobError {
    #[error("Blob request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Blob service returned {status} for '{key}'")]
    Status { key: String, status: u16 },

    #[error("Invalid blob key '{key}': {reason}")]
    InvalidKey { key: String, reason: String },

    #[error("Failed to access blob '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum SubmitError {
    #[error("Please enter a description.")]
    EmptyInput,

    #[error("{0}")]
    Store(#[from] StoreError),

    #[error("Store did not answer within {0:?}")]
    Timeout(std::time::Duration),

    #[error("No free job id left for '{base}' after {attempts} attempts")]
    IdsExhausted { base: String, attempts: u32 },
}

impl SubmitError {
    /// True for errors raised before any store interaction.
    pub fn is_validation(&self) -> bool {
        matches!(self, SubmitError::EmptyInput)
    }
}

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to read local settings '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse local settings: {0}")]
    ParseJson(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ClientError>;
