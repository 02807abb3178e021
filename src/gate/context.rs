//! Per-request input to the gate
//!
//! Everything the gate looks at is copied into [`RequestContext`] up front.
//! The gate itself never touches headers, the environment or global state.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

use axum::extract::{ConnectInfo, Query};
use axum::http::{header, request::Parts, HeaderMap};
use cookie::Cookie;

use crate::core::utils::decode_request_path;

/// Header consulted for the original client address behind a proxy
pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

/// Values of one request, as plain fields
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Peer address of the TCP connection
    pub remote_addr: Option<IpAddr>,
    /// Raw `X-Forwarded-For` header value
    pub forwarded_for: Option<String>,
    pub cookies: HashMap<String, String>,
    /// Values of the server-side session, empty when there is none
    pub session: HashMap<String, String>,
    pub query: HashMap<String, String>,
    /// Percent-decoded request path; `None` when it could not be decoded
    pub path: Option<String>,
    /// Path exactly as received
    pub raw_path: String,
}

impl RequestContext {
    /// Context for a request path with everything else empty
    pub fn for_path(path: &str) -> Self {
        Self {
            path: decode_request_path(path),
            raw_path: path.to_string(),
            ..Default::default()
        }
    }

    /// Capture the request parts. The session is attached separately.
    pub fn from_parts(parts: &Parts) -> Self {
        let remote_addr = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());

        let forwarded_for = parts
            .headers
            .get(FORWARDED_FOR_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        // malformed query strings carry no tokens
        let query = Query::<HashMap<String, String>>::try_from_uri(&parts.uri)
            .map(|Query(q)| q)
            .unwrap_or_default();

        let raw_path = parts.uri.path().to_string();

        Self {
            remote_addr,
            forwarded_for,
            cookies: parse_cookies(&parts.headers),
            session: HashMap::new(),
            query,
            path: decode_request_path(&raw_path),
            raw_path,
        }
    }

    pub fn with_remote_addr(mut self, addr: IpAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    pub fn with_forwarded_for(mut self, value: impl Into<String>) -> Self {
        self.forwarded_for = Some(value.into());
        self
    }

    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.insert(name.into(), value.into());
        self
    }

    pub fn with_session(mut self, session: HashMap<String, String>) -> Self {
        self.session = session;
        self
    }

    pub fn with_session_value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.session.insert(key.into(), value.into());
        self
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    pub fn session_value(&self, key: &str) -> Option<&str> {
        self.session.get(key).map(String::as_str)
    }

    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    /// `X-Forwarded-For` as a single address.
    ///
    /// A chained value (`a, b`) is not one address and yields `None`.
    pub fn forwarded_client(&self) -> Option<IpAddr> {
        self.forwarded_for.as_deref()?.trim().parse().ok()
    }
}

/// Collect all cookies from every `Cookie` header.
///
/// Unparseable pairs are skipped; the first occurrence of a name wins.
pub fn parse_cookies(headers: &HeaderMap) -> HashMap<String, String> {
    let mut cookies = HashMap::new();

    for raw in headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
    {
        for cookie in Cookie::split_parse(raw).flatten() {
            cookies
                .entry(cookie.name().to_string())
                .or_insert_with(|| cookie.value().to_string());
        }
    }

    cookies
}
