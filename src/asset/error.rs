//! Asset server error types

use thiserror::Error;

/// Asset server error type
#[derive(Error, Debug)]
pub enum AssetError {
    #[error("Asset not found: {path}")]
    NotFound { path: String },

    #[error("Server bind failed: {reason}")]
    BindFailed { reason: String },

    #[error("Placeholder rendering failed: {reason}")]
    Render { reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal server error: {reason}")]
    Internal { reason: String },
}

