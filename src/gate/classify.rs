//! Request path classification

use std::path::Path;

use regex::Regex;
use serde::Serialize;

use crate::config::{AccessConfig, ConfigError, ConfigResult};
use crate::core::utils::get_extension;

/// Name of the capture group holding the path-derived key
pub const KEY_GROUP: &str = "key";

/// What kind of artifact a request path points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PathClass {
    /// Built admin front-end bundles
    AdminBuild,
    /// Files attached to outgoing emails
    EmailUpload,
    Other,
}

impl PathClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            PathClass::AdminBuild => "admin_build",
            PathClass::EmailUpload => "email_upload",
            PathClass::Other => "other",
        }
    }
}

impl std::fmt::Display for PathClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compiled path patterns
#[derive(Debug, Clone)]
pub struct PathPatterns {
    admin_build: Regex,
    email_upload: Regex,
    key_segment: Regex,
}

impl PathPatterns {
    /// Compile the patterns of an access configuration
    pub fn compile(access: &AccessConfig) -> ConfigResult<Self> {
        let key_segment = compile_pattern(&access.key_segment_pattern)?;
        if !key_segment.capture_names().flatten().any(|name| name == KEY_GROUP) {
            return Err(ConfigError::InvalidPattern {
                pattern: access.key_segment_pattern.clone(),
                reason: format!("missing named group '{}'", KEY_GROUP),
            });
        }

        Ok(Self {
            admin_build: compile_pattern(&access.admin_build_pattern)?,
            email_upload: compile_pattern(&access.email_upload_pattern)?,
            key_segment,
        })
    }

    /// Classify a decoded request path. Admin build wins over email upload.
    pub fn classify(&self, path: &str) -> PathClass {
        if self.admin_build.is_match(path) {
            PathClass::AdminBuild
        } else if self.email_upload.is_match(path) {
            PathClass::EmailUpload
        } else {
            PathClass::Other
        }
    }

    /// Key segment embedded in the path, if the path has a non-empty one
    pub fn key_segment<'p>(&self, path: &'p str) -> Option<&'p str> {
        self.key_segment
            .captures(path)
            .and_then(|caps| caps.name(KEY_GROUP))
            .map(|m| m.as_str())
            .filter(|key| !key.is_empty())
    }

    pub fn admin_build_pattern(&self) -> &str {
        self.admin_build.as_str()
    }

    pub fn email_upload_pattern(&self) -> &str {
        self.email_upload.as_str()
    }

    pub fn key_segment_pattern(&self) -> &str {
        self.key_segment.as_str()
    }
}

fn compile_pattern(pattern: &str) -> ConfigResult<Regex> {
    Regex::new(pattern).map_err(|e| ConfigError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

/// Stylesheets and scripts, which are denied through the denial handler
/// rather than with a placeholder image.
pub fn is_resource(path: &str) -> bool {
    matches!(get_extension(Path::new(path)).as_str(), "css" | "js")
}
