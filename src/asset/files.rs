//! Document root resolution and file streaming

use std::path::{Component, Path, PathBuf};

use axum::{
    body::Body,
    http::{header, HeaderValue, StatusCode},
    response::Response,
};
use tokio_util::io::ReaderStream;

use super::error::AssetError;
use crate::core::utils::get_extension;

/// Cache policy for files that passed the gate
pub const SERVED_CACHE_CONTROL: &str = "private, max-age=3600";

/// Directory static files are served from
#[derive(Debug, Clone)]
pub struct DocumentRoot {
    root: PathBuf,
}

impl DocumentRoot {
    /// Canonicalize and remember the root directory
    pub fn new(root: &Path) -> Result<Self, AssetError> {
        let root = std::fs::canonicalize(root)?;
        if !root.is_dir() {
            return Err(AssetError::NotFound {
                path: root.display().to_string(),
            });
        }
        Ok(Self { root })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Resolve a decoded request path to a regular file inside the root.
    ///
    /// Returns `None` for parent-directory segments, for anything that
    /// canonicalizes outside the root (symlinks included), and for
    /// directories or missing files.
    pub async fn resolve(&self, request_path: &str) -> Option<PathBuf> {
        let relative = Path::new(request_path.trim_start_matches('/'));
        if relative.as_os_str().is_empty() {
            return None;
        }
        if !relative.components().all(|c| matches!(c, Component::Normal(_) | Component::CurDir)) {
            return None;
        }

        let candidate = tokio::fs::canonicalize(self.root.join(relative)).await.ok()?;
        if !candidate.starts_with(&self.root) {
            tracing::warn!("Path {:?} resolved outside the document root", request_path);
            return None;
        }

        let metadata = tokio::fs::metadata(&candidate).await.ok()?;
        metadata.is_file().then_some(candidate)
    }
}

/// Content type for a served file.
///
/// `css` and `js` are pinned; everything else is guessed from the extension.
pub fn content_type_for(path: &Path) -> String {
    match get_extension(path).as_str() {
        "css" => "text/css".to_string(),
        "js" => "application/javascript".to_string(),
        _ => mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string(),
    }
}

/// Stream a resolved file without buffering it whole
pub async fn stream_file(path: &Path) -> Result<Response, AssetError> {
    let file = tokio::fs::File::open(path).await?;
    let length = file.metadata().await?.len();
    let body = Body::from_stream(ReaderStream::new(file));

    let content_type = HeaderValue::from_str(&content_type_for(path))
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, length)
        .header(header::CACHE_CONTROL, SERVED_CACHE_CONTROL)
        .body(body)
        .map_err(|e| AssetError::Internal { reason: e.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, DocumentRoot) {
        let temp = TempDir::new().unwrap();
        let public = temp.path().join("public");
        std::fs::create_dir_all(public.join("build/admin")).unwrap();
        std::fs::write(public.join("build/admin/app.js"), "console.log(1);").unwrap();
        std::fs::write(temp.path().join("secret.txt"), "outside").unwrap();
        let root = DocumentRoot::new(&public).unwrap();
        (temp, root)
    }

    #[test]
    fn test_content_type_overrides() {
        assert_eq!(content_type_for(Path::new("a/app.css")), "text/css");
        assert_eq!(content_type_for(Path::new("a/app.JS")), "application/javascript");
        assert_eq!(content_type_for(Path::new("a/logo.png")), "image/png");
        assert_eq!(content_type_for(Path::new("a/photo.jpg")), "image/jpeg");
        assert_eq!(content_type_for(Path::new("a/blob")), "application/octet-stream");
    }

    #[tokio::test]
    async fn test_resolve_existing_file() {
        let (_temp, root) = setup();
        let resolved = root.resolve("/build/admin/app.js").await.unwrap();
        assert!(resolved.ends_with("build/admin/app.js"));
    }

    #[tokio::test]
    async fn test_resolve_rejects_missing_and_directories() {
        let (_temp, root) = setup();
        assert!(root.resolve("/build/admin/missing.js").await.is_none());
        assert!(root.resolve("/build/admin").await.is_none());
        assert!(root.resolve("/").await.is_none());
    }

    #[tokio::test]
    async fn test_resolve_rejects_traversal() {
        let (_temp, root) = setup();
        assert!(root.resolve("/../secret.txt").await.is_none());
        assert!(root.resolve("/build/../../secret.txt").await.is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_resolve_rejects_symlink_escape() {
        let (temp, root) = setup();
        std::os::unix::fs::symlink(
            temp.path().join("secret.txt"),
            root.path().join("link.txt"),
        )
        .unwrap();
        assert!(root.resolve("/link.txt").await.is_none());
    }

    #[tokio::test]
    async fn test_stream_file_headers() {
        let (_temp, root) = setup();
        let path = root.resolve("/build/admin/app.js").await.unwrap();
        let response = stream_file(&path).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/javascript"
        );
        assert_eq!(response.headers().get(header::CONTENT_LENGTH).unwrap(), "15");

        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"console.log(1);");
    }
}
