//! Logging settings, part of the `logging` section of the gate config

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing_appender::rolling::Rotation;

/// Verbosity, used globally and per module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Directive string understood by `EnvFilter`
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    /// One JSON object per event, for log shippers
    Json,
}

/// Where events are written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Console,
    File,
    Both,
}

impl LogOutput {
    pub fn to_console(&self) -> bool {
        matches!(self, LogOutput::Console | LogOutput::Both)
    }

    pub fn to_file(&self) -> bool {
        matches!(self, LogOutput::File | LogOutput::Both)
    }
}

/// When the log file rolls over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RotationStrategy {
    #[default]
    Daily,
    Hourly,
    Never,
}

impl From<RotationStrategy> for Rotation {
    fn from(strategy: RotationStrategy) -> Self {
        match strategy {
            RotationStrategy::Daily => Rotation::DAILY,
            RotationStrategy::Hourly => Rotation::HOURLY,
            RotationStrategy::Never => Rotation::NEVER,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub format: LogFormat,
    pub output: LogOutput,
    /// Directory for rolled files; `logs/` under the working directory when unset
    pub log_directory: Option<PathBuf>,
    pub file_prefix: String,
    /// Per-target overrides, e.g. `asset_gate::audit = "info"`
    pub module_levels: HashMap<String, LogLevel>,
    pub include_target: bool,
    pub include_thread_id: bool,
    /// Source file and line of each event
    pub include_file_info: bool,
    pub rotation: RotationStrategy,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Text,
            output: LogOutput::Console,
            log_directory: Some(default_log_directory()),
            file_prefix: "asset-gate.log".to_string(),
            module_levels: HashMap::new(),
            include_target: true,
            include_thread_id: false,
            include_file_info: false,
            rotation: RotationStrategy::Daily,
        }
    }
}

impl LoggingConfig {
    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_module_level(mut self, module: impl Into<String>, level: LogLevel) -> Self {
        self.module_levels.insert(module.into(), level);
        self
    }

    /// Directory file output goes to
    pub fn resolved_directory(&self) -> PathBuf {
        self.log_directory
            .clone()
            .unwrap_or_else(|| PathBuf::from("logs"))
    }

    /// Debug-level console output with thread ids and source locations
    pub fn development() -> Self {
        Self {
            level: LogLevel::Debug,
            log_directory: None,
            include_thread_id: true,
            include_file_info: true,
            ..Self::default()
        }
    }

    /// JSON to console and a daily file, with request tracing quietened
    pub fn production() -> Self {
        Self {
            format: LogFormat::Json,
            output: LogOutput::Both,
            ..Self::default()
        }
        .with_module_level("tower_http", LogLevel::Warn)
    }
}

fn default_log_directory() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("asset-gate").join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"))
}
