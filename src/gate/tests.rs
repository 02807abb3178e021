//! Tests for the access gate
//!
//! Includes unit tests and property-based tests for:
//! - Allow-list and forwarded-for handling
//! - Token matching across cookie, session and query
//! - Path classification and predicate ordering

use super::*;
use crate::config::{AccessConfig, GateConfig, GateSecrets};
use axum::http::{header, Request};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

const SECURITY_TOKEN: &str = "sec-7f3a9c";
const APP_SECRET: &str = "app-41d2e8";

fn test_access() -> AccessConfig {
    AccessConfig {
        allow_list: vec![
            "10.1.2.3".parse().unwrap(),
            "192.168.0.10".parse().unwrap(),
            "::1".parse().unwrap(),
        ],
        ..Default::default()
    }
}

fn test_gate() -> Gate {
    let config = GateConfig {
        access: test_access(),
        secrets: GateSecrets::new(SECURITY_TOKEN, APP_SECRET),
        ..Default::default()
    };
    Gate::from_config(&config).unwrap()
}

fn outsider() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(203, 0, 113, 7))
}

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_classify_paths() {
        let gate = test_gate();
        let class = |p: &str| gate.classify(&RequestContext::for_path(p));

        assert_eq!(class("/build/admin/app.js"), PathClass::AdminBuild);
        assert_eq!(class("/uploads/emails/invoice.pdf"), PathClass::EmailUpload);
        assert_eq!(class("/uploads/gallery/cat.png"), PathClass::Other);
        assert_eq!(class("/static/build/admin/app.js"), PathClass::Other);
    }

    #[test]
    fn test_undecodable_path_is_other() {
        let gate = test_gate();
        let ctx = RequestContext::for_path("/build/admin/%FF.js");
        assert!(ctx.path.is_none());
        assert_eq!(gate.classify(&ctx), PathClass::Other);
    }

    #[test]
    fn test_is_resource() {
        assert!(is_resource("/build/admin/app.js"));
        assert!(is_resource("/build/admin/app.CSS"));
        assert!(!is_resource("/build/admin/app.json"));
        assert!(!is_resource("/uploads/emails/logo.png"));
        assert!(!is_resource("/jsfile"));
    }

    #[test]
    fn test_key_segment() {
        let gate = test_gate();
        let patterns = gate.patterns();
        assert_eq!(patterns.key_segment("/uploads/private/abc123/file.pdf"), Some("abc123"));
        assert_eq!(patterns.key_segment("/uploads/private//file.pdf"), None);
        assert_eq!(patterns.key_segment("/uploads/emails/file.pdf"), None);
    }

    #[test]
    fn test_allow_listed_remote_addr() {
        let gate = test_gate();
        let ctx = RequestContext::for_path("/anything.png")
            .with_remote_addr("10.1.2.3".parse().unwrap());

        let decision = gate.evaluate(&ctx);
        assert!(decision.allowed);
        assert_eq!(decision.granted_by, Some(Predicate::IpAllowList));
        assert!(!decision.valid_token());
    }

    #[test]
    fn test_ipv4_mapped_remote_addr_is_canonicalized() {
        let gate = test_gate();
        let ctx = RequestContext::for_path("/a.png")
            .with_remote_addr("::ffff:10.1.2.3".parse().unwrap());
        assert!(gate.is_allow_listed(&ctx));
    }

    #[test]
    fn test_forwarded_for_single_address() {
        let gate = test_gate();
        let ctx = RequestContext::for_path("/a.png")
            .with_remote_addr(outsider())
            .with_forwarded_for(" 192.168.0.10 ");
        assert!(gate.is_allow_listed(&ctx));
    }

    #[test]
    fn test_chained_forwarded_for_is_not_listed() {
        let gate = test_gate();
        // a client-supplied listed address with the proxy's hop appended
        for header in ["10.1.2.3, 203.0.113.7", "203.0.113.7, 10.1.2.3", "10.1.2.3,10.1.2.3"] {
            let ctx = RequestContext::for_path("/build/admin/app.js")
                .with_remote_addr(outsider())
                .with_forwarded_for(header);
            assert_eq!(ctx.forwarded_client(), None);
            let decision = gate.evaluate(&ctx);
            assert!(!decision.allowed, "{header} must not be allow-listed");
            assert_eq!(decision.granted_by, None);
        }
    }

    #[test]
    fn test_malformed_forwarded_for_fails_closed() {
        let gate = test_gate();
        let ctx = RequestContext::for_path("/a.png")
            .with_remote_addr(outsider())
            .with_forwarded_for("not-an-ip");
        assert!(!gate.is_allow_listed(&ctx));
    }

    #[test]
    fn test_forwarded_for_ignored_when_untrusted() {
        let config = GateConfig {
            access: AccessConfig {
                trust_forwarded_for: false,
                ..test_access()
            },
            ..Default::default()
        };
        let gate = Gate::from_config(&config).unwrap();
        let ctx = RequestContext::for_path("/a.png")
            .with_remote_addr(outsider())
            .with_forwarded_for("10.1.2.3");
        assert!(!gate.is_allow_listed(&ctx));
    }

    #[test]
    fn test_token_sources_are_independent() {
        let gate = test_gate();
        let ctx = RequestContext::for_path("/a.png")
            .with_cookie("SECURITY_TOKEN", SECURITY_TOKEN)
            .with_session_value("SECURITY_TOKEN", "wrong")
            .with_query("token", APP_SECRET);

        assert_eq!(
            gate.token_sources(&ctx),
            vec![TokenSource::Cookie, TokenSource::Query]
        );
    }

    #[test]
    fn test_query_token_uses_app_secret() {
        let gate = test_gate();
        let ctx = RequestContext::for_path("/a.png").with_query("token", SECURITY_TOKEN);
        assert!(gate.token_sources(&ctx).is_empty());
    }

    #[test]
    fn test_empty_secret_never_matches() {
        let config = GateConfig {
            access: test_access(),
            secrets: GateSecrets::new("", ""),
            ..Default::default()
        };
        let gate = Gate::from_config(&config).unwrap();
        let ctx = RequestContext::for_path("/build/admin/app.js")
            .with_remote_addr(outsider())
            .with_cookie("SECURITY_TOKEN", "")
            .with_query("token", "");
        let decision = gate.evaluate(&ctx);
        assert!(decision.token_sources.is_empty());
        assert!(!decision.allowed);
    }

    #[test]
    fn test_admin_build_requires_token() {
        let gate = test_gate();
        let base = RequestContext::for_path("/build/admin/app.js").with_remote_addr(outsider());

        assert!(!gate.evaluate(&base).allowed);

        let with_token = base.clone().with_session_value("SECURITY_TOKEN", SECURITY_TOKEN);
        let decision = gate.evaluate(&with_token);
        assert!(decision.allowed);
        assert_eq!(decision.granted_by, Some(Predicate::AdminBuildToken));
        assert_eq!(decision.token_sources, vec![TokenSource::Session]);
    }

    #[test]
    fn test_email_upload_requires_token() {
        let gate = test_gate();
        let ctx = RequestContext::for_path("/uploads/emails/newsletter.png")
            .with_remote_addr(outsider())
            .with_query("token", APP_SECRET);
        let decision = gate.evaluate(&ctx);
        assert!(decision.allowed);
        assert_eq!(decision.granted_by, Some(Predicate::EmailUploadToken));
    }

    #[test]
    fn test_token_does_not_open_other_paths() {
        let gate = test_gate();
        let ctx = RequestContext::for_path("/uploads/gallery/cat.png")
            .with_remote_addr(outsider())
            .with_cookie("SECURITY_TOKEN", SECURITY_TOKEN);
        let decision = gate.evaluate(&ctx);
        assert!(!decision.allowed);
        assert!(decision.valid_token());
    }

    #[test]
    fn test_path_key_cookie() {
        let gate = test_gate();
        let ctx = RequestContext::for_path("/uploads/private/u-991/report.pdf")
            .with_remote_addr(outsider())
            .with_cookie("USER_SECRET", "u-991");
        let decision = gate.evaluate(&ctx);
        assert!(decision.allowed);
        assert_eq!(decision.granted_by, Some(Predicate::PathKeyCookie));

        let wrong = RequestContext::for_path("/uploads/private/u-991/report.pdf")
            .with_remote_addr(outsider())
            .with_cookie("USER_SECRET", "u-99");
        assert!(!gate.evaluate(&wrong).allowed);

        let missing = RequestContext::for_path("/uploads/private/u-991/report.pdf")
            .with_remote_addr(outsider());
        assert!(!gate.evaluate(&missing).allowed);
    }

    #[test]
    fn test_predicates_short_circuit_in_order() {
        let gate = test_gate();
        let ctx = RequestContext::for_path("/build/admin/app.js")
            .with_remote_addr("10.1.2.3".parse().unwrap())
            .with_cookie("SECURITY_TOKEN", SECURITY_TOKEN);
        assert_eq!(gate.evaluate(&ctx).granted_by, Some(Predicate::IpAllowList));
    }

    #[test]
    fn test_diagnostics_accepts_any_token() {
        let gate = test_gate();
        let ctx = RequestContext::for_path("/_gate/diagnostics")
            .with_remote_addr(outsider())
            .with_cookie("SECURITY_TOKEN", SECURITY_TOKEN);
        let decision = gate.evaluate_diagnostics(&ctx);
        assert!(decision.allowed);
        assert_eq!(decision.granted_by, Some(Predicate::AnyToken));

        let anonymous = RequestContext::for_path("/_gate/diagnostics").with_remote_addr(outsider());
        assert!(!gate.evaluate_diagnostics(&anonymous).allowed);
    }

    #[test]
    fn test_verdict_table() {
        let denied = Decision {
            allowed: false,
            granted_by: None,
            class: PathClass::Other,
            token_sources: vec![],
        };
        let granted = Decision {
            allowed: true,
            granted_by: Some(Predicate::IpAllowList),
            ..denied.clone()
        };

        assert_eq!(verdict(false, &granted, false), Verdict::NotFound);
        assert_eq!(verdict(false, &denied, true), Verdict::NotFound);
        assert_eq!(verdict(true, &granted, true), Verdict::Serve);
        assert_eq!(verdict(true, &denied, true), Verdict::DelegateDenial);
        assert_eq!(verdict(true, &denied, false), Verdict::AccessDenied);
    }

    #[test]
    fn test_context_from_parts() {
        let mut request = Request::builder()
            .uri("/uploads/emails/a%20b.png?token=abc&x=1")
            .header(header::COOKIE, "SECURITY_TOKEN=t1; USER_SECRET=k")
            .header(header::COOKIE, "SECURITY_TOKEN=ignored")
            .header(FORWARDED_FOR_HEADER, "10.1.2.3")
            .body(())
            .unwrap();
        request.extensions_mut().insert(axum::extract::ConnectInfo(SocketAddr::from((
            [127, 0, 0, 1],
            40000,
        ))));
        let (parts, _) = request.into_parts();

        let ctx = RequestContext::from_parts(&parts);
        assert_eq!(ctx.path.as_deref(), Some("/uploads/emails/a b.png"));
        assert_eq!(ctx.raw_path, "/uploads/emails/a%20b.png");
        assert_eq!(ctx.query_param("token"), Some("abc"));
        assert_eq!(ctx.cookie("SECURITY_TOKEN"), Some("t1"));
        assert_eq!(ctx.cookie("USER_SECRET"), Some("k"));
        assert_eq!(ctx.remote_addr, Some(IpAddr::V4(Ipv4Addr::LOCALHOST)));
        assert_eq!(ctx.forwarded_client(), Some("10.1.2.3".parse().unwrap()));
        assert!(ctx.session.is_empty());
    }

    #[test]
    fn test_parse_cookies_skips_garbage() {
        let mut headers = axum::http::HeaderMap::new();
        headers.insert(header::COOKIE, "=novalue; ok=1; ;".parse().unwrap());
        let cookies = parse_cookies(&headers);
        assert_eq!(cookies.get("ok").map(String::as_str), Some("1"));
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    fn token_strategy() -> impl Strategy<Value = String> {
        "[A-Za-z0-9_-]{1,40}"
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        // Allow-listed callers pass regardless of token state
        #[test]
        fn prop_allow_listed_ip_always_allowed(
            idx in 0usize..3,
            path in "/[a-z]{1,8}(/[a-z]{1,8}){0,3}\\.(png|js|css|pdf)",
            cookie in proptest::option::of(token_strategy()),
            query in proptest::option::of(token_strategy()),
        ) {
            let gate = test_gate();
            let ip = test_access().allow_list[idx];
            let mut ctx = RequestContext::for_path(&path).with_remote_addr(ip);
            if let Some(c) = cookie {
                ctx = ctx.with_cookie("SECURITY_TOKEN", c);
            }
            if let Some(q) = query {
                ctx = ctx.with_query("token", q);
            }

            let decision = gate.evaluate(&ctx);
            prop_assert!(decision.allowed);
            prop_assert_eq!(decision.granted_by, Some(Predicate::IpAllowList));
        }

        // Admin build paths open with the right token from any address
        #[test]
        fn prop_admin_build_with_token_allowed(
            octets in prop::array::uniform4(any::<u8>()),
            file in "[a-z]{1,12}\\.(js|css|map)",
        ) {
            let gate = test_gate();
            let ip = IpAddr::V4(Ipv4Addr::from(octets));
            let ctx = RequestContext::for_path(&format!("/build/admin/{}", file))
                .with_remote_addr(ip)
                .with_cookie("SECURITY_TOKEN", SECURITY_TOKEN);
            prop_assert!(gate.evaluate(&ctx).allowed);
        }

        // Prefixes and extensions of the secrets never match
        #[test]
        fn prop_token_match_is_exact(cut in 0usize..SECURITY_TOKEN.len(), suffix in "[a-z0-9]{1,4}") {
            let gate = test_gate();
            let prefix = &SECURITY_TOKEN[..cut];
            let extended = format!("{}{}", SECURITY_TOKEN, suffix);
            let app_prefix = &APP_SECRET[..cut.min(APP_SECRET.len() - 1)];

            for candidate in [prefix, extended.as_str()] {
                let ctx = RequestContext::for_path("/build/admin/app.js")
                    .with_remote_addr(outsider())
                    .with_cookie("SECURITY_TOKEN", candidate)
                    .with_session_value("SECURITY_TOKEN", candidate);
                prop_assert!(gate.token_sources(&ctx).is_empty());
            }

            let ctx = RequestContext::for_path("/build/admin/app.js")
                .with_query("token", app_prefix);
            prop_assert!(gate.token_sources(&ctx).is_empty());
        }

        #[test]
        fn prop_random_token_rejected(candidate in token_strategy()) {
            let gate = test_gate();
            prop_assume!(candidate != SECURITY_TOKEN && candidate != APP_SECRET);
            let ctx = RequestContext::for_path("/uploads/emails/x.png")
                .with_remote_addr(outsider())
                .with_cookie("SECURITY_TOKEN", candidate.clone())
                .with_session_value("SECURITY_TOKEN", candidate.clone())
                .with_query("token", candidate);
            prop_assert!(!gate.evaluate(&ctx).allowed);
        }
    }
}
