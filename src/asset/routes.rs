//! Asset gate routes and middleware
//!
//! Provides the gated file handler, the diagnostics page, the session
//! handshake and the middleware adding security response headers.

use std::collections::HashMap;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Method, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use cookie::{Cookie, SameSite};
use secrecy::ExposeSecret;
use uuid::Uuid;

use super::files::stream_file;
use super::placeholder::PlaceholderKind;
use super::server::AssetServerState;
use crate::core::utils::generate_uuid;
use crate::gate::{audit, is_resource, verdict, RequestContext, Verdict};
use crate::logging::AUDIT_TARGET;

/// Header echoing the id every audit record of a request carries
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Id assigned to a request by [`security_headers`]
#[derive(Debug, Clone, Copy)]
pub struct RequestId(pub Uuid);

fn request_id<B>(request: &Request<B>) -> Uuid {
    request
        .extensions()
        .get::<RequestId>()
        .map(|id| id.0)
        .unwrap_or_else(generate_uuid)
}

/// Assign a request id and add security response headers
pub async fn security_headers(mut request: Request<Body>, next: Next) -> Response {
    let id = generate_uuid();
    request.extensions_mut().insert(RequestId(id));

    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    // Prevent MIME type sniffing
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );

    // Prevent clickjacking
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));

    if !headers.contains_key(header::CACHE_CONTROL) {
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    }

    if let Ok(value) = HeaderValue::from_str(&id.to_string()) {
        headers.insert(REQUEST_ID_HEADER, value);
    }

    response
}

/// Serve a file from the document root through the gate
///
/// Route: fallback for every path not matched by another route
pub async fn serve_asset(
    State(state): State<AssetServerState>,
    request: Request<Body>,
) -> Response {
    if !matches!(*request.method(), Method::GET | Method::HEAD) {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }

    let id = request_id(&request);
    let (parts, _body) = request.into_parts();
    let ctx = state.context_for(&parts);

    let resolved = match ctx.path.as_deref() {
        Some(path) => state.root.resolve(path).await,
        None => None,
    };
    let decision = state.gate.evaluate(&ctx);
    let resource = ctx.path.as_deref().map(is_resource).unwrap_or(false);
    let outcome = verdict(resolved.is_some(), &decision, resource);

    audit(id, &ctx, &decision, outcome.as_str());

    match (outcome, resolved) {
        (Verdict::Serve, Some(path)) => match stream_file(&path).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!("Failed to stream {:?}: {}", path, e);
                state.placeholders.response(PlaceholderKind::NotFound).await
            }
        },
        (Verdict::DelegateDenial, _) => state.denial.deny(&ctx),
        (Verdict::AccessDenied, _) => state.placeholders.response(PlaceholderKind::AccessDenied).await,
        _ => state.placeholders.response(PlaceholderKind::NotFound).await,
    }
}

/// Serve runtime diagnostics to allow-listed or token-holding callers
///
/// Route: GET /_gate/diagnostics
pub async fn serve_diagnostics(
    State(state): State<AssetServerState>,
    request: Request<Body>,
) -> Response {
    let id = request_id(&request);
    let (parts, _body) = request.into_parts();
    let ctx = state.context_for(&parts);

    let decision = state.gate.evaluate_diagnostics(&ctx);
    let outcome = if decision.allowed { "diagnostics" } else { Verdict::AccessDenied.as_str() };
    audit(id, &ctx, &decision, outcome);

    if decision.allowed {
        Json(state.diagnostics()).into_response()
    } else {
        state.placeholders.response(PlaceholderKind::AccessDenied).await
    }
}

/// Exchange the application secret for a session and token cookies
///
/// Route: GET /_gate/session?token=...
pub async fn open_session(
    State(state): State<AssetServerState>,
    request: Request<Body>,
) -> Response {
    let id = request_id(&request);
    let (parts, _body) = request.into_parts();
    let ctx = RequestContext::from_parts(&parts);
    let access = &state.config.access;

    if !state.gate.app_secret_matches(ctx.query_param(&access.query_token_param)) {
        tracing::warn!(
            target: AUDIT_TARGET,
            request_id = %id,
            remote_addr = ?ctx.remote_addr,
            "session handshake refused"
        );
        return state.placeholders.response(PlaceholderKind::AccessDenied).await;
    }

    let token = state.gate.security_token().expose_secret();
    if token.is_empty() {
        tracing::warn!(
            target: AUDIT_TARGET,
            request_id = %id,
            "session handshake refused: no security token configured"
        );
        return state.placeholders.response(PlaceholderKind::AccessDenied).await;
    }

    let session_id = state.sessions.create(HashMap::from([(
        access.session_token_key.clone(),
        token.clone(),
    )]));

    tracing::info!(
        target: AUDIT_TARGET,
        request_id = %id,
        remote_addr = ?ctx.remote_addr,
        "session opened"
    );

    let ttl = state.sessions.ttl().as_secs();
    let mut response = StatusCode::NO_CONTENT.into_response();
    for cookie in [
        build_cookie(&access.session_cookie, session_id, ttl, access.secure_cookies),
        build_cookie(&access.security_cookie, token.clone(), ttl, access.secure_cookies),
    ] {
        if let Ok(value) = HeaderValue::from_str(&cookie) {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
    }
    response
}

/// `Set-Cookie` value for a gate cookie
fn build_cookie(name: &str, value: String, ttl_secs: u64, secure: bool) -> String {
    let max_age = i64::try_from(ttl_secs).unwrap_or(i64::MAX);
    Cookie::build((name.to_string(), value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Strict)
        .secure(secure)
        .max_age(cookie::time::Duration::seconds(max_age))
        .build()
        .to_string()
}
