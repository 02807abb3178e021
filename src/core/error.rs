//! Error types for asset-gate
//!
//! Denials and missing files are outcomes of the gate, not errors. The
//! types here cover startup and infrastructure failures only.

use thiserror::Error;

use crate::asset::AssetError;
use crate::config::ConfigError;
use crate::logging::LoggingError;

/// Result type alias for asset-gate operations
pub type Result<T> = std::result::Result<T, GateError>;

/// Main error type for asset-gate
#[derive(Error, Debug)]
pub enum GateError {
    #[error("Asset server error: {0}")]
    Asset(#[from] AssetError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Logging error: {0}")]
    Logging(#[from] LoggingError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl GateError {
    /// Whether the error happened before the server could accept requests
    pub fn is_startup_failure(&self) -> bool {
        matches!(
            self,
            GateError::Config(_)
                | GateError::Logging(_)
                | GateError::Asset(AssetError::BindFailed { .. })
        )
    }
}
