//! Error types for CLI operations.

use thiserror::Error;

/// Errors raised while assembling the bridge for a run
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Image source could not be created
    #[error("Failed to create image source: {0}")]
    Transport(#[from] transport::TransportError),

    /// Bridge core could not be initialized
    #[error("Failed to initialize bridge: {0}")]
    Bridge(#[from] frame_bridge::BridgeError),

    /// Dispatcher could not be built
    #[error("Failed to build dispatcher: {0}")]
    Dispatcher(#[from] dispatcher::DispatcherError),
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }
}

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
