//! Asset Gate - access control for the static files of a multi-site CMS
//!
//! This crate provides:
//! - A composite access gate (IP allow-list, tokens, path classes, key cookies)
//! - An HTTP server streaming the document root through the gate
//! - Placeholder images for missing or refused files
//! - A session handshake and a diagnostics page for trusted callers
//! - Layered configuration and structured audit logging

pub mod asset;
pub mod config;
pub mod core;
pub mod gate;
pub mod logging;

// Re-export commonly used items
pub use crate::asset::{AssetGateServer, AssetServerState, DenialHandler};
pub use crate::config::{ConfigLoader, GateConfig, GateSecrets};
pub use crate::core::error::{GateError, Result};
pub use crate::gate::{Decision, Gate, RequestContext, Verdict};
pub use crate::logging::{LoggingConfig, LoggingSystem};
