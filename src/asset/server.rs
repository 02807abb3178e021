//! Asset gate server implementation
//!
//! Binds the configured address and serves the document root through the
//! access gate, plus the session handshake and diagnostics endpoints.

use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    http::{request::Parts, HeaderValue, Method},
    middleware,
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::denial::{DenialHandler, ForbiddenPage};
use super::error::AssetError;
use super::files::DocumentRoot;
use super::placeholder::PlaceholderCache;
use super::routes::{open_session, security_headers, serve_asset, serve_diagnostics};
use super::session::SessionStore;
use crate::config::GateConfig;
use crate::core::Result;
use crate::gate::{Gate, RequestContext};

/// Route of the diagnostics page
pub const DIAGNOSTICS_ROUTE: &str = "/_gate/diagnostics";

/// Route of the session handshake
pub const SESSION_ROUTE: &str = "/_gate/session";

/// Shared state for the asset gate handlers
#[derive(Clone)]
pub struct AssetServerState {
    pub gate: Arc<Gate>,
    pub root: Arc<DocumentRoot>,
    pub placeholders: PlaceholderCache,
    pub sessions: SessionStore,
    pub denial: Arc<dyn DenialHandler>,
    pub config: Arc<GateConfig>,
    pub started_at: DateTime<Utc>,
    started: Instant,
}

impl AssetServerState {
    /// Validate the configuration and build the server state
    pub fn new(config: GateConfig) -> Result<Self> {
        let patterns = config.validate()?;
        let gate = Gate::new(&config.access, patterns, config.secrets.clone());
        let root = DocumentRoot::new(&config.document_root)?;
        let sessions = SessionStore::new(Duration::from_secs(config.access.session_ttl_secs));

        Ok(Self {
            gate: Arc::new(gate),
            root: Arc::new(root),
            placeholders: PlaceholderCache::new(),
            sessions,
            denial: Arc::new(ForbiddenPage),
            config: Arc::new(config),
            started_at: Utc::now(),
            started: Instant::now(),
        })
    }

    /// Replace the denial handler used for refused stylesheets and scripts
    pub fn with_denial_handler(mut self, handler: impl DenialHandler + 'static) -> Self {
        self.denial = Arc::new(handler);
        self
    }

    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }

    /// Gate input for a request, with its session attached
    pub fn context_for(&self, parts: &Parts) -> RequestContext {
        let ctx = RequestContext::from_parts(parts);
        let session = ctx
            .cookie(&self.config.access.session_cookie)
            .and_then(|id| self.sessions.get(id))
            .unwrap_or_default();
        ctx.with_session(session)
    }

    /// Snapshot for the diagnostics page. Never includes secret values.
    pub fn diagnostics(&self) -> Diagnostics {
        let patterns = self.gate.patterns();
        Diagnostics {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            started_at: self.started_at,
            uptime_secs: self.uptime().as_secs(),
            document_root: self.root.path().to_path_buf(),
            allow_list_size: self.gate.allow_list_len(),
            trust_forwarded_for: self.config.access.trust_forwarded_for,
            patterns: HashMap::from([
                ("admin_build", patterns.admin_build_pattern().to_string()),
                ("email_upload", patterns.email_upload_pattern().to_string()),
                ("key_segment", patterns.key_segment_pattern().to_string()),
            ]),
            sessions: self.sessions.len(),
            placeholders_cached: self.placeholders.len(),
            security_token_configured: self.config.secrets.has_security_token(),
            app_secret_configured: self.config.secrets.has_app_secret(),
        }
    }
}

/// Runtime information served by the diagnostics page
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostics {
    pub name: &'static str,
    pub version: &'static str,
    pub started_at: DateTime<Utc>,
    pub uptime_secs: u64,
    pub document_root: PathBuf,
    pub allow_list_size: usize,
    pub trust_forwarded_for: bool,
    pub patterns: HashMap<&'static str, String>,
    pub sessions: usize,
    pub placeholders_cached: usize,
    pub security_token_configured: bool,
    pub app_secret_configured: bool,
}

/// Asset gate HTTP server
pub struct AssetGateServer {
    state: AssetServerState,
}

impl AssetGateServer {
    /// Create a server from a configuration
    pub fn new(config: GateConfig) -> Result<Self> {
        Ok(Self {
            state: AssetServerState::new(config)?,
        })
    }

    /// Create a server around prepared state
    pub fn from_state(state: AssetServerState) -> Self {
        Self { state }
    }

    /// Get a reference to the server state
    pub fn state(&self) -> &AssetServerState {
        &self.state
    }

    /// Address the server binds to
    pub fn addr(&self) -> SocketAddr {
        let server = &self.state.config.server;
        SocketAddr::new(server.bind_address, server.port)
    }

    /// Build the router with all routes and middleware
    pub fn build_router(&self) -> Router {
        let state = self.state.clone();

        let cors = CorsLayer::new()
            .allow_methods([Method::GET, Method::HEAD, Method::OPTIONS])
            .allow_headers(Any)
            .allow_origin(
                self.state
                    .config
                    .server
                    .additional_origins
                    .iter()
                    .filter_map(|o| o.parse::<HeaderValue>().ok())
                    .collect::<Vec<_>>(),
            );

        Router::new()
            .route("/health", get(|| async { "OK" }))
            .route(DIAGNOSTICS_ROUTE, get(serve_diagnostics))
            .route(SESSION_ROUTE, get(open_session))
            .fallback(serve_asset)
            .layer(middleware::from_fn(security_headers))
            .layer(TraceLayer::new_for_http())
            .layer(cors)
            .with_state(state)
    }

    /// Serve until the shutdown future resolves
    pub async fn start_with_shutdown<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.addr();
        let router = self.build_router();

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| AssetError::BindFailed { reason: format!("{}: {}", addr, e) })?;

        tracing::info!(
            "Asset gate listening on {} serving {:?}",
            addr,
            self.state.root.path()
        );

        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| AssetError::Internal { reason: e.to_string() })?;

        tracing::info!("Asset gate stopped");
        Ok(())
    }

    /// Serve until Ctrl-C
    pub async fn start(self) -> Result<()> {
        self.start_with_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
        })
        .await
    }
}
