//! Logging System for asset-gate
//!
//! Installs one `tracing` subscriber for the process:
//! - an `EnvFilter` built from the global level and per-target overrides
//! - a text or JSON formatter on the console, a rolling file, or both
//!
//! Gate decisions are written to the [`AUDIT_TARGET`] target.

mod config;


pub use config::{LogFormat, LogLevel, LogOutput, LoggingConfig, RotationStrategy};

use std::path::PathBuf;
use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::RollingFileAppender;
use tracing_subscriber::{
    fmt::{self, MakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    filter::Directive,
    EnvFilter, Layer, Registry,
};

/// Target that every access decision is logged under
pub const AUDIT_TARGET: &str = "asset_gate::audit";

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Failed to initialize logging: {0}")]
    InitializationError(String),

    #[error("Failed to create log directory {path:?}: {source}")]
    DirectoryCreationError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type LoggingResult<T> = Result<T, LoggingError>;

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Installed logging system.
///
/// Holds the file writer guard; dropping it flushes pending file output.
pub struct LoggingSystem {
    _guards: Vec<WorkerGuard>,
}

impl LoggingSystem {
    /// Install the global subscriber. Fails if one is already set.
    pub fn init(config: LoggingConfig) -> LoggingResult<Self> {
        let mut layers: Vec<BoxedLayer> = Vec::new();
        let mut guards = Vec::new();

        if config.output.to_console() {
            layers.push(format_layer(&config, std::io::stdout, true));
        }

        if config.output.to_file() {
            let dir = config.resolved_directory();
            std::fs::create_dir_all(&dir).map_err(|source| {
                LoggingError::DirectoryCreationError {
                    path: dir.clone(),
                    source,
                }
            })?;

            let appender = RollingFileAppender::new(config.rotation.into(), &dir, &config.file_prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            layers.push(format_layer(&config, writer, false));
            guards.push(guard);
        }

        tracing_subscriber::registry()
            .with(layers)
            .with(Self::build_env_filter(&config))
            .try_init()
            .map_err(|e| LoggingError::InitializationError(e.to_string()))?;

        Ok(Self { _guards: guards })
    }

    /// Global level plus one directive per module override.
    ///
    /// Directives that fail to parse are skipped.
    pub(crate) fn build_env_filter(config: &LoggingConfig) -> EnvFilter {
        config
            .module_levels
            .iter()
            .filter_map(|(module, level)| format!("{}={}", module, level).parse::<Directive>().ok())
            .fold(EnvFilter::new(config.level.as_str()), EnvFilter::add_directive)
    }
}

fn format_layer<W>(config: &LoggingConfig, writer: W, ansi: bool) -> BoxedLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(ansi)
        .with_target(config.include_target)
        .with_thread_ids(config.include_thread_id)
        .with_file(config.include_file_info)
        .with_line_number(config.include_file_info);

    match config.format {
        LogFormat::Json => layer.json().boxed(),
        LogFormat::Text => layer.boxed(),
    }
}

/// Install a plain console subscriber when the configured one cannot be set up
pub fn init_fallback_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .try_init();
}
