//! Gated Asset Server
//!
//! Serves the document root of the CMS through the access gate:
//! - Streams files that pass the gate with a computed content type
//! - Answers missing or refused files with a 150×45 placeholder image
//! - Hands refused stylesheets and scripts to a [`DenialHandler`]
//! - Exchanges the application secret for a session (`/_gate/session`)
//! - Exposes runtime diagnostics to trusted callers (`/_gate/diagnostics`)

mod denial;
mod error;
mod files;
mod placeholder;
mod routes;
mod server;
mod session;

pub use denial::{DenialHandler, ForbiddenPage};
pub use error::AssetError;
pub use files::{content_type_for, stream_file, DocumentRoot, SERVED_CACHE_CONTROL};
pub use placeholder::{
    render_placeholder, PlaceholderCache, PlaceholderKind, PLACEHOLDER_CONTENT_TYPE,
    PLACEHOLDER_HEIGHT, PLACEHOLDER_WIDTH,
};
pub use routes::{
    open_session, security_headers, serve_asset, serve_diagnostics, RequestId, REQUEST_ID_HEADER,
};
pub use server::{
    AssetGateServer, AssetServerState, Diagnostics, DIAGNOSTICS_ROUTE, SESSION_ROUTE,
};
pub use session::SessionStore;
