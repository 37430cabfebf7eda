//! Route handlers.
//!
//! Proxied handlers take the raw body so it can be forwarded untouched.
//! The salient field (URL, file names or query) is read from a copy only
//! for logging; a body that cannot be read is still forwarded.

use std::convert::Infallible;

use axum::body::{Body, Bytes};
use axum::extract::{DefaultBodyLimit, FromRequest, Multipart, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, Method, Request};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tower::{service_fn, Layer, ServiceExt};
use tracing::{debug, error, info};

use veritas_core::AskRequest;

use crate::error::GatewayError;
use crate::state::GatewayState;
use crate::upstream::{UpstreamError, UpstreamResponse};

/// Shown in logs when the salient field cannot be read.
const UNREADABLE: &str = "<unreadable>";

pub const BANNER: &str = "Veritas Gateway is Online";

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub engine_url: String,
}

/// What a multipart body carries, for logging.
#[derive(Debug, Default)]
struct MultipartSummary {
    url: Option<String>,
    files: Vec<String>,
}

/// Parse a copy of `body` under the same size limit the router applies.
/// `None` if any part of it cannot be read.
async fn summarize_multipart(
    headers: &HeaderMap,
    body: &Bytes,
    limit: usize,
) -> Option<MultipartSummary> {
    let content_type = headers.get(CONTENT_TYPE)?;
    let request = Request::builder()
        .header(CONTENT_TYPE, content_type)
        .body(Body::from(body.clone()))
        .ok()?;

    let read = service_fn(|request: Request<Body>| async move {
        Ok::<_, Infallible>(read_summary(request).await)
    });
    DefaultBodyLimit::max(limit)
        .layer(read)
        .oneshot(request)
        .await
        .ok()
        .flatten()
}

async fn read_summary(request: Request<Body>) -> Option<MultipartSummary> {
    let mut multipart = Multipart::from_request(request, &()).await.ok()?;

    let mut summary = MultipartSummary::default();
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                debug!(error = %e, "Multipart body not readable");
                return None;
            }
        };
        let file_name = field.file_name().map(str::to_string);
        let is_url = field.name() == Some("url");
        match file_name {
            Some(name) => summary.files.push(name),
            None if is_url => summary.url = Some(field.text().await.ok()?),
            None => {}
        }
    }
    Some(summary)
}

fn relay(upstream: UpstreamResponse) -> Response {
    let mut response = (upstream.status, upstream.body).into_response();
    if let Some(content_type) = upstream.content_type {
        response.headers_mut().insert(CONTENT_TYPE, content_type);
    }
    response
}

async fn forward(
    state: &GatewayState,
    method: Method,
    path: &str,
    headers: &HeaderMap,
    body: Bytes,
) -> Result<Response, UpstreamError> {
    state
        .upstream
        .forward(method, path, headers.get(CONTENT_TYPE), body)
        .await
        .map(relay)
}

// =============================================================================
// Handler functions
// =============================================================================

/// GET / - liveness banner.
pub async fn root() -> &'static str {
    BANNER
}

/// GET /health - gateway status. Does not contact the engine.
pub async fn health(State(state): State<GatewayState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        engine_url: state.upstream.base_url().to_string(),
    })
}

/// POST /api/ingest/url - forward a multipart `url` field.
pub async fn ingest_url(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, GatewayError> {
    let url = summarize_multipart(&headers, &body, state.config.max_upload_bytes())
        .await
        .and_then(|s| s.url)
        .unwrap_or_else(|| UNREADABLE.to_string());
    info!(url = %url, "Gateway: forwarding ingestion request");

    forward(&state, Method::POST, "/ingest/url", &headers, body)
        .await
        .map_err(|e| {
            error!(url = %url, error = %e, "Ingest error");
            GatewayError::Ingest
        })
}

/// POST /api/ingest/pdf - forward multipart `files` parts.
pub async fn ingest_pdf(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, GatewayError> {
    let files = summarize_multipart(&headers, &body, state.config.max_upload_bytes())
        .await
        .map(|s| s.files.join(", "))
        .unwrap_or_else(|| UNREADABLE.to_string());
    info!(files = %files, "Gateway: forwarding file upload");

    forward(&state, Method::POST, "/ingest/pdf", &headers, body)
        .await
        .map_err(|e| {
            error!(files = %files, error = %e, "Ingest error");
            GatewayError::Ingest
        })
}

/// POST /api/ask - forward a JSON question.
pub async fn ask(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, GatewayError> {
    let query = serde_json::from_slice::<AskRequest>(&body)
        .map(|r| r.query)
        .unwrap_or_else(|_| UNREADABLE.to_string());
    info!(query = %query, "Gateway: forwarding query");

    forward(&state, Method::POST, "/ask", &headers, body)
        .await
        .map_err(|e| {
            error!(query = %query, error = %e, "Ask error");
            GatewayError::Ask
        })
}

/// DELETE /api/reset - purge the engine's knowledge base.
pub async fn reset(State(state): State<GatewayState>) -> Result<Response, GatewayError> {
    info!("Gateway: forwarding reset");

    forward(&state, Method::DELETE, "/reset", &HeaderMap::new(), Bytes::new())
        .await
        .map_err(|e| {
            error!(error = %e, "Reset error");
            GatewayError::Reset
        })
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    const LIMIT: usize = 50 * 1024 * 1024;

    fn multipart_headers(boundary: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_str(&format!("multipart/form-data; boundary={}", boundary)).unwrap(),
        );
        headers
    }

    #[tokio::test]
    async fn test_summarize_url_field() {
        let body = Bytes::from(
            "--b1\r\nContent-Disposition: form-data; name=\"url\"\r\n\r\nhttps://example.com\r\n--b1--\r\n",
        );
        let summary = summarize_multipart(&multipart_headers("b1"), &body, LIMIT)
            .await
            .unwrap();
        assert_eq!(summary.url.as_deref(), Some("https://example.com"));
        assert!(summary.files.is_empty());
    }

    #[tokio::test]
    async fn test_summarize_file_names() {
        let body = Bytes::from(concat!(
            "--b2\r\n",
            "Content-Disposition: form-data; name=\"files\"; filename=\"a.pdf\"\r\n",
            "Content-Type: application/pdf\r\n\r\n",
            "%PDF-a\r\n",
            "--b2\r\n",
            "Content-Disposition: form-data; name=\"files\"; filename=\"b.pdf\"\r\n",
            "Content-Type: application/pdf\r\n\r\n",
            "%PDF-b\r\n",
            "--b2--\r\n",
        ));
        let summary = summarize_multipart(&multipart_headers("b2"), &body, LIMIT)
            .await
            .unwrap();
        assert_eq!(summary.files, vec!["a.pdf", "b.pdf"]);
        assert!(summary.url.is_none());
    }

    #[tokio::test]
    async fn test_summarize_without_content_type() {
        let body = Bytes::from_static(b"url=https://example.com");
        assert!(summarize_multipart(&HeaderMap::new(), &body, LIMIT).await.is_none());
    }

    /// Three 1.5 MB parts, well past axum's 2 MB multipart default.
    fn large_files_body() -> Bytes {
        let payload = "x".repeat(1536 * 1024);
        let mut body = String::new();
        for name in ["a.pdf", "b.pdf", "c.pdf"] {
            body.push_str(&format!(
                "--b3\r\nContent-Disposition: form-data; name=\"files\"; filename=\"{}\"\r\nContent-Type: application/pdf\r\n\r\n{}\r\n",
                name, payload
            ));
        }
        body.push_str("--b3--\r\n");
        Bytes::from(body)
    }

    #[tokio::test]
    async fn test_summarize_large_upload_under_configured_limit() {
        let summary = summarize_multipart(&multipart_headers("b3"), &large_files_body(), LIMIT)
            .await
            .unwrap();
        assert_eq!(summary.files, vec!["a.pdf", "b.pdf", "c.pdf"]);
    }

    #[tokio::test]
    async fn test_summarize_over_limit_is_unreadable() {
        let summary =
            summarize_multipart(&multipart_headers("b3"), &large_files_body(), 1024 * 1024).await;
        assert!(summary.is_none());
    }

    #[tokio::test]
    async fn test_summarize_truncated_body_is_unreadable() {
        let body = Bytes::from_static(
            b"--b4\r\nContent-Disposition: form-data; name=\"files\"; filename=\"a.pdf\"\r\n\r\n%PDF-a",
        );
        assert!(summarize_multipart(&multipart_headers("b4"), &body, LIMIT)
            .await
            .is_none());
    }
}
