//! HTTP forwarding to the engine.

use std::time::Duration;

use axum::body::Bytes;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderValue, Method, StatusCode};
use reqwest::Client;
use tracing::debug;

const USER_AGENT: &str = concat!("veritas-gateway/", env!("CARGO_PKG_VERSION"));

/// Why a forwarded request did not produce a successful response.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("engine unreachable: {0}")]
    Transport(String),
    #[error("engine returned status {status}: {body}")]
    Status { status: u16, body: String },
}

impl From<reqwest::Error> for UpstreamError {
    fn from(err: reqwest::Error) -> Self {
        UpstreamError::Transport(err.to_string())
    }
}

/// A successful engine response, relayed as-is.
#[derive(Debug)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub content_type: Option<HeaderValue>,
    pub body: Bytes,
}

/// Client for the engine's own routes (`/ingest/url`, `/ask`, ...).
#[derive(Debug, Clone)]
pub struct EngineUpstream {
    client: Client,
    base_url: String,
}

impl EngineUpstream {
    pub fn new(base_url: impl Into<String>) -> Result<Self, UpstreamError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send `body` to `path` unchanged, keeping its content type (and so
    /// any multipart boundary). Any non-2xx status is an error.
    pub async fn forward(
        &self,
        method: Method,
        path: &str,
        content_type: Option<&HeaderValue>,
        body: Bytes,
    ) -> Result<UpstreamResponse, UpstreamError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%method, url = %url, bytes = body.len(), "Forwarding to engine");

        let mut request = self.client.request(method, &url);
        if let Some(content_type) = content_type {
            request = request.header(CONTENT_TYPE, content_type.clone());
        }
        if !body.is_empty() {
            request = request.body(body);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let content_type = response.headers().get(CONTENT_TYPE).cloned();
        let body = response.bytes().await?;
        Ok(UpstreamResponse {
            status,
            content_type,
            body,
        })
    }
}
