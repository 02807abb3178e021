//! Configuration Module for asset-gate
//!
//! Layered configuration loading:
//! - Built-in defaults
//! - Optional JSON file
//! - `ASSET_GATE__*` environment overrides
//! - `SECURITY_TOKEN` / `APP_SECRET` secrets
//!
//! Secrets are read exactly once here and injected into [`GateSecrets`];
//! nothing else in the crate reads them from the environment.

mod settings;

pub use settings::{
    ConfigLoader, ConfigError, ConfigResult, GateConfig, GateSecrets,
    ServerConfig, AccessConfig, default_config_path,
    ENV_PREFIX, SECURITY_TOKEN_ENV, APP_SECRET_ENV,
};
