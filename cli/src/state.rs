//! Per-invocation CLI state.

use std::path::Path;

use smarthvac::config::load_or_default;
use smarthvac::{ClientContext, ClientError};

/// How command results are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human { color: bool },
    Json,
}

pub struct AppState {
    pub context: ClientContext,
    pub output: OutputMode,
}

impl AppState {
    /// Loads the configuration and opens the configured backends.
    pub fn load(config_path: Option<&Path>, output: OutputMode) -> Result<Self, ClientError> {
        let config = load_or_default(config_path)?;
        let context = ClientContext::init(config)?;
        Ok(Self { context, output })
    }
}
