//! Named access predicates and the decision combiner

use std::collections::HashSet;
use std::net::IpAddr;

use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;

use super::classify::{PathClass, PathPatterns};
use super::context::RequestContext;
use crate::config::{AccessConfig, ConfigResult, GateConfig, GateSecrets};
use crate::core::utils::constant_time_eq;

/// One named clause of the decision combiner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    /// Client address is allow-listed
    IpAllowList,
    /// Admin build path with a valid token
    AdminBuildToken,
    /// Email upload path with a valid token
    EmailUploadToken,
    /// Secret cookie equals the key segment of the path
    PathKeyCookie,
    /// Any valid token, regardless of path
    AnyToken,
}

impl Predicate {
    /// Evaluation order for static files
    pub const ASSET_ORDER: [Predicate; 4] = [
        Predicate::IpAllowList,
        Predicate::AdminBuildToken,
        Predicate::EmailUploadToken,
        Predicate::PathKeyCookie,
    ];

    /// Evaluation order for the diagnostics page
    pub const DIAGNOSTICS_ORDER: [Predicate; 2] = [Predicate::IpAllowList, Predicate::AnyToken];

    pub fn name(&self) -> &'static str {
        match self {
            Predicate::IpAllowList => "ip_allow_list",
            Predicate::AdminBuildToken => "admin_build_token",
            Predicate::EmailUploadToken => "email_upload_token",
            Predicate::PathKeyCookie => "path_key_cookie",
            Predicate::AnyToken => "any_token",
        }
    }
}

impl std::fmt::Display for Predicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Where a matching security token was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenSource {
    Cookie,
    Session,
    Query,
}

/// Result of evaluating the gate for one request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Decision {
    pub allowed: bool,
    /// First predicate that held
    pub granted_by: Option<Predicate>,
    pub class: PathClass,
    /// Every token source that matched, evaluated independently
    pub token_sources: Vec<TokenSource>,
}

impl Decision {
    pub fn valid_token(&self) -> bool {
        !self.token_sources.is_empty()
    }
}

/// The composite access gate
#[derive(Debug, Clone)]
pub struct Gate {
    allow_list: HashSet<IpAddr>,
    trust_forwarded_for: bool,
    patterns: PathPatterns,
    secrets: GateSecrets,
    security_cookie: String,
    session_token_key: String,
    query_token_param: String,
    secret_cookie: String,
}

impl Gate {
    pub fn new(access: &AccessConfig, patterns: PathPatterns, secrets: GateSecrets) -> Self {
        Self {
            allow_list: access.allow_list.iter().map(IpAddr::to_canonical).collect(),
            trust_forwarded_for: access.trust_forwarded_for,
            patterns,
            secrets,
            security_cookie: access.security_cookie.clone(),
            session_token_key: access.session_token_key.clone(),
            query_token_param: access.query_token_param.clone(),
            secret_cookie: access.secret_cookie.clone(),
        }
    }

    pub fn from_config(config: &GateConfig) -> ConfigResult<Self> {
        let patterns = PathPatterns::compile(&config.access)?;
        Ok(Self::new(&config.access, patterns, config.secrets.clone()))
    }

    pub fn patterns(&self) -> &PathPatterns {
        &self.patterns
    }

    pub fn allow_list_len(&self) -> usize {
        self.allow_list.len()
    }

    /// Forwarded client or peer address is in the allow-list
    pub fn is_allow_listed(&self, ctx: &RequestContext) -> bool {
        let forwarded = if self.trust_forwarded_for {
            ctx.forwarded_client()
        } else {
            None
        };

        [forwarded, ctx.remote_addr]
            .into_iter()
            .flatten()
            .any(|ip| self.allow_list.contains(&ip.to_canonical()))
    }

    /// Token sources carrying a valid token.
    ///
    /// The cookie and the session entry are checked against the security
    /// token, the query parameter against the application secret.
    pub fn token_sources(&self, ctx: &RequestContext) -> Vec<TokenSource> {
        let checks = [
            (
                TokenSource::Cookie,
                secret_matches(&self.secrets.security_token, ctx.cookie(&self.security_cookie)),
            ),
            (
                TokenSource::Session,
                secret_matches(
                    &self.secrets.security_token,
                    ctx.session_value(&self.session_token_key),
                ),
            ),
            (
                TokenSource::Query,
                secret_matches(&self.secrets.app_secret, ctx.query_param(&self.query_token_param)),
            ),
        ];

        checks
            .into_iter()
            .filter_map(|(source, matched)| matched.then_some(source))
            .collect()
    }

    /// Secret cookie equals the key segment derived from the path
    pub fn path_key_matches(&self, ctx: &RequestContext) -> bool {
        let Some(key) = ctx.path.as_deref().and_then(|p| self.patterns.key_segment(p)) else {
            return false;
        };
        match ctx.cookie(&self.secret_cookie) {
            Some(cookie) if !cookie.is_empty() => constant_time_eq(key.as_bytes(), cookie.as_bytes()),
            _ => false,
        }
    }

    pub fn classify(&self, ctx: &RequestContext) -> PathClass {
        ctx.path
            .as_deref()
            .map(|p| self.patterns.classify(p))
            .unwrap_or(PathClass::Other)
    }

    fn holds(
        &self,
        predicate: Predicate,
        ctx: &RequestContext,
        class: PathClass,
        valid_token: bool,
    ) -> bool {
        match predicate {
            Predicate::IpAllowList => self.is_allow_listed(ctx),
            Predicate::AdminBuildToken => class == PathClass::AdminBuild && valid_token,
            Predicate::EmailUploadToken => class == PathClass::EmailUpload && valid_token,
            Predicate::PathKeyCookie => self.path_key_matches(ctx),
            Predicate::AnyToken => valid_token,
        }
    }

    fn evaluate_in_order(&self, ctx: &RequestContext, order: &[Predicate]) -> Decision {
        let class = self.classify(ctx);
        let token_sources = self.token_sources(ctx);
        let valid_token = !token_sources.is_empty();

        let granted_by = order
            .iter()
            .copied()
            .find(|p| self.holds(*p, ctx, class, valid_token));

        Decision {
            allowed: granted_by.is_some(),
            granted_by,
            class,
            token_sources,
        }
    }

    /// Decide access to a static file
    pub fn evaluate(&self, ctx: &RequestContext) -> Decision {
        self.evaluate_in_order(ctx, &Predicate::ASSET_ORDER)
    }

    /// Decide access to the diagnostics page
    pub fn evaluate_diagnostics(&self, ctx: &RequestContext) -> Decision {
        self.evaluate_in_order(ctx, &Predicate::DIAGNOSTICS_ORDER)
    }

    /// Whether a candidate equals the application secret
    pub fn app_secret_matches(&self, candidate: Option<&str>) -> bool {
        secret_matches(&self.secrets.app_secret, candidate)
    }

    /// The security token to hand out in a new session
    pub fn security_token(&self) -> &SecretString {
        &self.secrets.security_token
    }
}

/// Exact, full-length comparison. Empty secrets and absent or empty candidates fail.
fn secret_matches(secret: &SecretString, candidate: Option<&str>) -> bool {
    let expected = secret.expose_secret();
    match candidate {
        Some(c) if !expected.is_empty() && !c.is_empty() => {
            constant_time_eq(expected.as_bytes(), c.as_bytes())
        }
        _ => false,
    }
}
