//! Configuration loading and validation
//!
//! Layers are applied with the `config` crate in this order, later layers
//! winning:
//! - Built-in defaults (`GateConfig::default`)
//! - JSON file (optional unless given explicitly)
//! - Environment variables `ASSET_GATE__<SECTION>__<KEY>`
//! - `SECURITY_TOKEN` / `APP_SECRET` for the secrets

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::gate::PathPatterns;
use crate::logging::LoggingConfig;

/// Prefix for environment overrides, e.g. `ASSET_GATE__SERVER__PORT`
pub const ENV_PREFIX: &str = "ASSET_GATE";

/// Environment variable holding the cookie/session security token
pub const SECURITY_TOKEN_ENV: &str = "SECURITY_TOKEN";

/// Environment variable holding the query-token application secret
pub const APP_SECRET_ENV: &str = "APP_SECRET";

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration source error: {0}")]
    Source(#[from] ::config::ConfigError),

    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Invalid path pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

/// Configuration result type
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Secrets compared by the gate.
///
/// An empty secret never matches anything.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GateSecrets {
    /// Expected value of the `SECURITY_TOKEN` cookie and session entry
    pub security_token: SecretString,
    /// Expected value of the `token` query parameter
    pub app_secret: SecretString,
}

impl Default for GateSecrets {
    fn default() -> Self {
        Self {
            security_token: SecretString::new(String::new()),
            app_secret: SecretString::new(String::new()),
        }
    }
}

impl GateSecrets {
    /// Create secrets from plain values
    pub fn new(security_token: impl Into<String>, app_secret: impl Into<String>) -> Self {
        Self {
            security_token: SecretString::new(security_token.into()),
            app_secret: SecretString::new(app_secret.into()),
        }
    }

    /// Override each secret with its environment variable when that is set and non-empty
    pub fn merge_env(&mut self) {
        if let Some(token) = non_empty_env(SECURITY_TOKEN_ENV) {
            self.security_token = SecretString::new(token);
        }
        if let Some(secret) = non_empty_env(APP_SECRET_ENV) {
            self.app_secret = SecretString::new(secret);
        }
    }

    pub fn has_security_token(&self) -> bool {
        !self.security_token.expose_secret().is_empty()
    }

    pub fn has_app_secret(&self) -> bool {
        !self.app_secret.expose_secret().is_empty()
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_address: IpAddr,
    /// Port to bind to
    pub port: u16,
    /// Origins allowed by CORS
    pub additional_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 8088,
            additional_origins: Vec::new(),
        }
    }
}

/// Access rules evaluated by the gate
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessConfig {
    /// Addresses that bypass every token check
    pub allow_list: Vec<IpAddr>,
    /// Consult `X-Forwarded-For` for the allow-list check
    pub trust_forwarded_for: bool,
    /// Paths of admin build artifacts
    pub admin_build_pattern: String,
    /// Paths of uploaded email artifacts
    pub email_upload_pattern: String,
    /// Pattern with a named `key` group extracting the per-user key segment
    pub key_segment_pattern: String,
    /// Cookie carrying the security token
    pub security_cookie: String,
    /// Session entry carrying the security token
    pub session_token_key: String,
    /// Query parameter carrying the application secret
    pub query_token_param: String,
    /// Cookie compared against the path key segment
    pub secret_cookie: String,
    /// Cookie carrying the session id
    pub session_cookie: String,
    /// Session lifetime in seconds
    pub session_ttl_secs: u64,
    /// Mark cookies set by the handshake as `Secure`
    pub secure_cookies: bool,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            allow_list: vec![
                IpAddr::V4(Ipv4Addr::LOCALHOST),
                IpAddr::V6(Ipv6Addr::LOCALHOST),
            ],
            trust_forwarded_for: true,
            admin_build_pattern: "^/build/admin/".to_string(),
            email_upload_pattern: "^/uploads/emails/".to_string(),
            key_segment_pattern: "^/uploads/private/(?P<key>[^/]+)/".to_string(),
            security_cookie: "SECURITY_TOKEN".to_string(),
            session_token_key: "SECURITY_TOKEN".to_string(),
            query_token_param: "token".to_string(),
            secret_cookie: "USER_SECRET".to_string(),
            session_cookie: "GATESESSID".to_string(),
            session_ttl_secs: 3600,
            secure_cookies: false,
        }
    }
}

/// Complete gate configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    pub server: ServerConfig,
    pub access: AccessConfig,
    /// Directory that static files are served from
    pub document_root: PathBuf,
    pub logging: LoggingConfig,
    pub secrets: GateSecrets,
    /// File the configuration was read from, if one existed
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            access: AccessConfig::default(),
            document_root: PathBuf::from("public"),
            logging: LoggingConfig::default(),
            secrets: GateSecrets::default(),
            source: None,
        }
    }
}

/// Serializable view of [`GateConfig`] without the secrets
#[derive(Serialize)]
struct ConfigTemplate<'a> {
    server: &'a ServerConfig,
    access: &'a AccessConfig,
    document_root: &'a Path,
    logging: &'a LoggingConfig,
}

impl GateConfig {
    /// Check everything the server relies on at startup.
    ///
    /// Returns the compiled path patterns so callers don't compile twice.
    pub fn validate(&self) -> ConfigResult<PathPatterns> {
        let patterns = PathPatterns::compile(&self.access)?;

        if !self.document_root.is_dir() {
            return Err(ConfigError::Invalid(format!(
                "document root {:?} is not a directory",
                self.document_root
            )));
        }

        if self.access.session_ttl_secs == 0 {
            return Err(ConfigError::Invalid(
                "session_ttl_secs must be greater than zero".to_string(),
            ));
        }

        let cookie_names = [
            &self.access.security_cookie,
            &self.access.secret_cookie,
            &self.access.session_cookie,
        ];
        if cookie_names.iter().any(|name| name.is_empty()) {
            return Err(ConfigError::Invalid("cookie names must not be empty".to_string()));
        }

        if !self.secrets.has_security_token() {
            tracing::warn!("No security token configured; cookie and session checks will never pass");
        }
        if !self.secrets.has_app_secret() {
            tracing::warn!("No application secret configured; query token checks will never pass");
        }

        Ok(patterns)
    }

    /// Write this configuration (without secrets) as pretty JSON.
    ///
    /// Writes to a temp file first and renames it into place.
    pub async fn write_template(&self, path: &Path) -> ConfigResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let template = ConfigTemplate {
            server: &self.server,
            access: &self.access,
            document_root: &self.document_root,
            logging: &self.logging,
        };
        let content = serde_json::to_string_pretty(&template)?;

        let temp_path = path.with_extension("json.tmp");
        tokio::fs::write(&temp_path, &content).await?;
        tokio::fs::rename(&temp_path, path).await?;

        Ok(())
    }
}

/// Default location of the configuration file
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("asset-gate")
        .join("config.json")
}

/// Builds a [`GateConfig`] from its layered sources
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    file: Option<PathBuf>,
    env_prefix: Option<String>,
    read_secret_env: bool,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self {
            file: None,
            env_prefix: Some(ENV_PREFIX.to_string()),
            read_secret_env: true,
        }
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from an explicit file, which then must exist
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    /// Ignore the environment entirely, secrets included
    pub fn without_env(mut self) -> Self {
        self.env_prefix = None;
        self.read_secret_env = false;
        self
    }

    /// Path of the file this loader reads
    pub fn file_path(&self) -> PathBuf {
        self.file.clone().unwrap_or_else(default_config_path)
    }

    /// Load the configuration
    pub fn load(&self) -> ConfigResult<GateConfig> {
        let path = self.file_path();
        if self.file.is_some() && !path.exists() {
            return Err(ConfigError::NotFound(path));
        }

        let mut builder = ::config::Config::builder().add_source(
            ::config::File::from(path.as_path())
                .format(::config::FileFormat::Json)
                .required(false),
        );

        if let Some(prefix) = &self.env_prefix {
            builder = builder.add_source(
                ::config::Environment::with_prefix(prefix)
                    .separator("__")
                    .try_parsing(true),
            );
        }

        let mut config: GateConfig = builder.build()?.try_deserialize()?;

        if self.read_secret_env {
            config.secrets.merge_env();
        }
        config.source = path.is_file().then_some(path);

        Ok(config)
    }
}
