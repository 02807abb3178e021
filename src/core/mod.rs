//! asset-gate Core Module
//!
//! Error types shared across the crate and small helpers used by the
//! gate and the asset server.

pub mod error;
pub mod utils;

pub use error::{GateError, Result};
