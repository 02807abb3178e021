//! Composite Access Gate
//!
//! Decides, per request for a static file or the diagnostics page, whether
//! to serve it. The decision combines:
//! - an IP allow-list (peer address or trusted `X-Forwarded-For`)
//! - a security token from cookie, session or query string
//! - the class of the request path
//! - a per-user secret cookie matched against a key segment of the path
//!
//! Predicates are evaluated in a fixed order and short-circuit; the first
//! one that holds is recorded in the [`Decision`] and in the audit log.

mod classify;
mod context;
mod predicates;
#[cfg(test)]
mod tests;

pub use classify::{is_resource, PathClass, PathPatterns, KEY_GROUP};
pub use context::{parse_cookies, RequestContext, FORWARDED_FOR_HEADER};
pub use predicates::{Decision, Gate, Predicate, TokenSource};

use uuid::Uuid;

use crate::core::utils::truncate_string;
use crate::logging::AUDIT_TARGET;

/// What the server does with a gated file request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Stream the file
    Serve,
    /// "Not found" placeholder
    NotFound,
    /// "Access denied" placeholder
    AccessDenied,
    /// Hand the request to the denial handler
    DelegateDenial,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Serve => "serve",
            Verdict::NotFound => "not_found",
            Verdict::AccessDenied => "access_denied",
            Verdict::DelegateDenial => "delegate_denial",
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fold existence, the gate decision and the resource flag into a verdict.
///
/// A file that does not resolve is always "Not found", whatever the
/// decision says.
pub fn verdict(exists: bool, decision: &Decision, resource: bool) -> Verdict {
    match (exists, decision.allowed, resource) {
        (false, _, _) => Verdict::NotFound,
        (true, true, _) => Verdict::Serve,
        (true, false, true) => Verdict::DelegateDenial,
        (true, false, false) => Verdict::AccessDenied,
    }
}

/// Write one audit record for a gate decision
pub fn audit(request_id: Uuid, ctx: &RequestContext, decision: &Decision, outcome: &str) {
    let path = truncate_string(&ctx.raw_path, 256);
    let granted_by = decision.granted_by.map(|p| p.name()).unwrap_or("none");

    if decision.allowed {
        tracing::info!(
            target: AUDIT_TARGET,
            request_id = %request_id,
            path = %path,
            class = %decision.class,
            granted_by,
            token_sources = ?decision.token_sources,
            outcome,
            "access granted"
        );
    } else {
        tracing::warn!(
            target: AUDIT_TARGET,
            request_id = %request_id,
            path = %path,
            class = %decision.class,
            remote_addr = ?ctx.remote_addr,
            forwarded_for = ?ctx.forwarded_for,
            outcome,
            "access denied"
        );
    }
}
