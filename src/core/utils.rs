//! Utility functions for asset-gate
//!
//! Common helper functions used throughout the application.

use std::path::Path;

use percent_encoding::percent_decode_str;

/// Generate a time-ordered UUID (v7)
pub fn generate_uuid() -> uuid::Uuid {
    uuid::Uuid::now_v7()
}

/// Extract file extension from path (lowercase)
pub fn get_extension(path: &Path) -> String {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|s| s.to_lowercase())
        .unwrap_or_default()
}

/// Percent-decode a request path.
///
/// Returns `None` when the decoded bytes are not valid UTF-8 or contain a
/// NUL byte.
pub fn decode_request_path(raw: &str) -> Option<String> {
    let decoded = percent_decode_str(raw).decode_utf8().ok()?;
    if decoded.contains('\0') {
        return None;
    }
    Some(decoded.into_owned())
}

/// Compare two byte strings in constant time with respect to their content
pub fn constant_time_eq(expected: &[u8], candidate: &[u8]) -> bool {
    expected.len() == candidate.len()
        && expected
            .iter()
            .zip(candidate)
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}

/// Truncate string to specified length with ellipsis
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_extension() {
        assert_eq!(get_extension(Path::new("app.CSS")), "css");
        assert_eq!(get_extension(Path::new("build/admin/app.js")), "js");
        assert_eq!(get_extension(Path::new("no_extension")), "");
    }

    #[test]
    fn test_decode_request_path() {
        assert_eq!(
            decode_request_path("/uploads/emails/a%20b.png").as_deref(),
            Some("/uploads/emails/a b.png")
        );
        assert_eq!(decode_request_path("/%2e%2e/etc").as_deref(), Some("/../etc"));
        assert_eq!(decode_request_path("/bad%00name"), None);
        assert_eq!(decode_request_path("/bad%FFname"), None);
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"secret", b"secret"));
        assert!(!constant_time_eq(b"secret", b"secre"));
        assert!(!constant_time_eq(b"secret", b"secretx"));
        assert!(!constant_time_eq(b"secret", b"Secret"));
        assert!(constant_time_eq(b"", b""));
    }

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("hello", 10), "hello");
        assert_eq!(truncate_string("hello world", 8), "hello...");
    }

    #[test]
    fn test_generate_uuid_is_v7() {
        assert_eq!(generate_uuid().get_version_num(), 7);
    }
}
