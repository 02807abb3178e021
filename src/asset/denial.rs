//! Responders for denied stylesheet and script requests

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};

use crate::gate::RequestContext;

/// Produces the response for a resource request the gate refused
pub trait DenialHandler: Send + Sync {
    fn deny(&self, ctx: &RequestContext) -> Response;
}

/// Default denial handler: a small `403 Forbidden` HTML page
#[derive(Debug, Clone, Default)]
pub struct ForbiddenPage;

const FORBIDDEN_BODY: &str = "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>403 Forbidden</title></head>\
<body><h1>Forbidden</h1><p>You are not allowed to access this resource.</p></body></html>\n";

impl DenialHandler for ForbiddenPage {
    fn deny(&self, _ctx: &RequestContext) -> Response {
        (
            StatusCode::FORBIDDEN,
            [
                (header::CONTENT_TYPE, "text/html; charset=utf-8"),
                (header::CACHE_CONTROL, "no-store"),
            ],
            FORBIDDEN_BODY,
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_forbidden_page() {
        let response = ForbiddenPage.deny(&RequestContext::for_path("/build/admin/app.js"));
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/html; charset=utf-8"
        );

        let body = axum::body::to_bytes(response.into_body(), 4096).await.unwrap();
        assert!(String::from_utf8_lossy(&body).contains("Forbidden"));
    }
}
