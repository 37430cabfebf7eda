//! The knowledge engine seam and its implementations.
//!
//! - `GatewayClient` speaks HTTP to the Veritas gateway with reqwest.
//!   This is what the terminal front end uses.
//! - `MockEngine` is a scripted engine for tests. It records every call and
//!   can hold calls open so in-flight state is observable.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::de::DeserializeOwned;
use tokio::sync::Notify;
use tracing::debug;

use veritas_core::{AskRequest, AskResponse, FileUpload, IngestResponse};

use crate::error::EngineError;

const USER_AGENT: &str = concat!("veritas/", env!("CARGO_PKG_VERSION"));

/// Multipart field carrying the page address for URL ingestion.
pub const URL_FIELD: &str = "url";
/// Multipart field shared by every uploaded document.
pub const FILES_FIELD: &str = "files";

/// Operations the session needs from the retrieval/answering engine.
#[async_trait]
pub trait KnowledgeEngine: Send + Sync {
    /// Scrape and store the page at `url`.
    async fn ingest_url(&self, url: &str) -> Result<IngestResponse, EngineError>;

    /// Parse and store every file in one request.
    async fn ingest_files(&self, files: &[FileUpload]) -> Result<IngestResponse, EngineError>;

    /// Answer `request.query` using `request.chat_history` as memory.
    async fn ask(&self, request: &AskRequest) -> Result<AskResponse, EngineError>;

    /// Drop everything in the knowledge base.
    async fn reset(&self) -> Result<(), EngineError>;
}

// ---------------------------------------------------------------------------
// GatewayClient - HTTP client for the gateway API
// ---------------------------------------------------------------------------

/// HTTP client for the gateway's `/api` routes.
#[derive(Debug, Clone)]
pub struct GatewayClient {
    client: Client,
    base_url: String,
}

impl GatewayClient {
    /// Create a client for a gateway rooted at `base_url`
    /// (e.g. `http://localhost:5000/api`).
    pub fn new(base_url: impl Into<String>) -> Result<Self, EngineError> {
        let client = Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self::with_client(client, base_url))
    }

    /// Create a client reusing an existing reqwest `Client`.
    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, EngineError> {
        let response = Self::check_status(response).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| EngineError::Decode(e.to_string()))
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, EngineError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(EngineError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl KnowledgeEngine for GatewayClient {
    async fn ingest_url(&self, url: &str) -> Result<IngestResponse, EngineError> {
        let form = Form::new().text(URL_FIELD, url.to_string());
        debug!(url, "POST /ingest/url");
        // reqwest sets the multipart content type and boundary itself.
        let response = self
            .client
            .post(self.endpoint("/ingest/url"))
            .multipart(form)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn ingest_files(&self, files: &[FileUpload]) -> Result<IngestResponse, EngineError> {
        let mut form = Form::new();
        for file in files {
            let mut part = Part::bytes(file.bytes.clone()).file_name(file.file_name.clone());
            if let Some(ref content_type) = file.content_type {
                part = part.mime_str(content_type)?;
            }
            form = form.part(FILES_FIELD, part);
        }
        debug!(files = files.len(), "POST /ingest/pdf");
        let response = self
            .client
            .post(self.endpoint("/ingest/pdf"))
            .multipart(form)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn ask(&self, request: &AskRequest) -> Result<AskResponse, EngineError> {
        debug!(
            query = %request.query,
            history = request.chat_history.len(),
            "POST /ask"
        );
        let response = self
            .client
            .post(self.endpoint("/ask"))
            .json(request)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn reset(&self) -> Result<(), EngineError> {
        debug!("DELETE /reset");
        let response = self.client.delete(self.endpoint("/reset")).send().await?;
        Self::check_status(response).await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MockEngine - scripted engine for tests
// ---------------------------------------------------------------------------

/// A call received by [`MockEngine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    IngestUrl(String),
    IngestFiles(Vec<String>),
    Ask(AskRequest),
    Reset,
}

/// Scripted engine.
///
/// Answers with a fixed answer and evidence, reports a fixed chunk count,
/// and fails every call with a transport error while `failing` is set.
/// After [`MockEngine::hold`], each call is recorded and then waits for
/// the returned `Notify` before responding.
#[derive(Debug)]
pub struct MockEngine {
    failing: AtomicBool,
    chunks_stored: AtomicU64,
    answer: Mutex<AskResponse>,
    calls: Mutex<Vec<EngineCall>>,
    gate: Mutex<Option<Arc<Notify>>>,
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEngine {
    pub fn new() -> Self {
        Self {
            failing: AtomicBool::new(false),
            chunks_stored: AtomicU64::new(3),
            answer: Mutex::new(AskResponse {
                answer: "mock answer".to_string(),
                evidence: vec!["mock evidence".to_string()],
                rewritten_query: None,
            }),
            calls: Mutex::new(Vec::new()),
            gate: Mutex::new(None),
        }
    }

    /// A mock whose every call fails.
    pub fn failing() -> Self {
        let engine = Self::new();
        engine.set_failing(true);
        engine
    }

    pub fn with_answer(self, answer: impl Into<String>, evidence: Vec<String>) -> Self {
        *self.answer.lock().expect("mock mutex poisoned") = AskResponse {
            answer: answer.into(),
            evidence,
            rewritten_query: None,
        };
        self
    }

    pub fn with_chunks(self, chunks_stored: u64) -> Self {
        self.chunks_stored.store(chunks_stored, Ordering::SeqCst);
        self
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Hold every subsequent call open until the returned gate is notified
    /// (one `notify_one` releases one call).
    pub fn hold(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock().expect("mock mutex poisoned") = Some(Arc::clone(&gate));
        gate
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().expect("mock mutex poisoned").clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().expect("mock mutex poisoned").len()
    }

    /// The most recent ask request, if any.
    pub fn last_ask(&self) -> Option<AskRequest> {
        self.calls().into_iter().rev().find_map(|call| match call {
            EngineCall::Ask(request) => Some(request),
            _ => None,
        })
    }

    async fn respond<T>(&self, call: EngineCall, value: T) -> Result<T, EngineError> {
        self.calls.lock().expect("mock mutex poisoned").push(call);
        let gate = self.gate.lock().expect("mock mutex poisoned").clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if self.failing.load(Ordering::SeqCst) {
            Err(EngineError::Transport("mock engine unavailable".to_string()))
        } else {
            Ok(value)
        }
    }

    fn ingest_response(&self) -> IngestResponse {
        IngestResponse {
            chunks_stored: self.chunks_stored.load(Ordering::SeqCst),
        }
    }
}

#[async_trait]
impl KnowledgeEngine for MockEngine {
    async fn ingest_url(&self, url: &str) -> Result<IngestResponse, EngineError> {
        let response = self.ingest_response();
        self.respond(EngineCall::IngestUrl(url.to_string()), response)
            .await
    }

    async fn ingest_files(&self, files: &[FileUpload]) -> Result<IngestResponse, EngineError> {
        let names = files.iter().map(|f| f.file_name.clone()).collect();
        let response = self.ingest_response();
        self.respond(EngineCall::IngestFiles(names), response).await
    }

    async fn ask(&self, request: &AskRequest) -> Result<AskResponse, EngineError> {
        let answer = self.answer.lock().expect("mock mutex poisoned").clone();
        self.respond(EngineCall::Ask(request.clone()), answer).await
    }

    async fn reset(&self) -> Result<(), EngineError> {
        self.respond(EngineCall::Reset, ()).await
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use axum::extract::Multipart;
    use axum::http::StatusCode;
    use axum::routing::{delete, post};
    use axum::{Json, Router};
    use veritas_core::HistoryPair;

    /// Serve `router` on an ephemeral port, returning its `/api` base URL.
    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}/api", addr)
    }

    /// A gateway stand-in that reports on what it received.
    fn echo_gateway() -> Router {
        async fn ingest_url(mut multipart: Multipart) -> Json<serde_json::Value> {
            let mut url = String::new();
            while let Some(field) = multipart.next_field().await.unwrap() {
                if field.name() == Some("url") {
                    url = field.text().await.unwrap();
                }
            }
            Json(serde_json::json!({ "status": "success", "chunks_stored": url.len() }))
        }

        async fn ingest_pdf(mut multipart: Multipart) -> Json<serde_json::Value> {
            let mut files = 0;
            while let Some(field) = multipart.next_field().await.unwrap() {
                assert_eq!(field.name(), Some("files"));
                assert!(field.file_name().is_some());
                files += 1;
            }
            Json(serde_json::json!({ "chunks_stored": files * 10 }))
        }

        async fn ask(Json(request): Json<AskRequest>) -> Json<AskResponse> {
            Json(AskResponse {
                answer: format!("{} ({} prior)", request.query, request.chat_history.len()),
                evidence: request
                    .chat_history
                    .iter()
                    .map(|p| p.question().to_string())
                    .collect(),
                rewritten_query: Some(format!("standalone {}", request.query)),
            })
        }

        async fn reset() -> Json<serde_json::Value> {
            Json(serde_json::json!({}))
        }

        Router::new()
            .route("/api/ingest/url", post(ingest_url))
            .route("/api/ingest/pdf", post(ingest_pdf))
            .route("/api/ask", post(ask))
            .route("/api/reset", delete(reset))
    }

    fn failing_gateway() -> Router {
        async fn fail() -> (StatusCode, Json<serde_json::Value>) {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "Failed to get answer" })),
            )
        }

        Router::new()
            .route("/api/ingest/url", post(fail))
            .route("/api/ingest/pdf", post(fail))
            .route("/api/ask", post(fail))
            .route("/api/reset", delete(fail))
    }

    #[tokio::test]
    async fn test_gateway_client_ingest_url() {
        let client = GatewayClient::new(serve(echo_gateway()).await).unwrap();
        let resp = client.ingest_url("https://example.com").await.unwrap();
        assert_eq!(resp.chunks_stored, "https://example.com".len() as u64);
    }

    #[tokio::test]
    async fn test_gateway_client_ingest_files_shares_field_name() {
        let client = GatewayClient::new(serve(echo_gateway()).await).unwrap();
        let files = vec![
            FileUpload::new("a.pdf", b"%PDF-1.4 a".to_vec()).with_content_type("application/pdf"),
            FileUpload::new("b.pdf", b"%PDF-1.4 b".to_vec()),
        ];
        let resp = client.ingest_files(&files).await.unwrap();
        assert_eq!(resp.chunks_stored, 20);
    }

    #[tokio::test]
    async fn test_gateway_client_ask_sends_history() {
        let client = GatewayClient::new(serve(echo_gateway()).await).unwrap();
        let request = AskRequest {
            query: "E".to_string(),
            chat_history: vec![HistoryPair::new("A", "B"), HistoryPair::new("C", "D")],
        };
        let resp = client.ask(&request).await.unwrap();
        assert_eq!(resp.answer, "E (2 prior)");
        assert_eq!(resp.evidence, vec!["A", "C"]);
        assert_eq!(resp.rewritten_query.as_deref(), Some("standalone E"));
    }

    #[tokio::test]
    async fn test_gateway_client_reset() {
        let client = GatewayClient::new(serve(echo_gateway()).await).unwrap();
        client.reset().await.unwrap();
    }

    #[tokio::test]
    async fn test_gateway_client_maps_server_error_to_status() {
        let client = GatewayClient::new(serve(failing_gateway()).await).unwrap();

        let err = client.ingest_url("https://example.com").await.unwrap_err();
        assert!(matches!(err, EngineError::Status { status: 500, .. }));

        let err = client.reset().await.unwrap_err();
        match err {
            EngineError::Status { status, body } => {
                assert_eq!(status, 500);
                assert!(body.contains("error"));
            }
            other => panic!("Expected Status, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_gateway_client_unreachable_is_transport_error() {
        // Bind then drop to get a port nothing listens on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = GatewayClient::new(format!("http://{}/api", addr)).unwrap();
        let request = AskRequest {
            query: "anyone there?".to_string(),
            chat_history: vec![],
        };
        let err = client.ask(&request).await.unwrap_err();
        assert!(matches!(err, EngineError::Transport(_)));
    }

    #[test]
    fn test_gateway_client_trims_trailing_slash() {
        let client = GatewayClient::new("http://localhost:5000/api/").unwrap();
        assert_eq!(client.base_url(), "http://localhost:5000/api");
        assert_eq!(client.endpoint("/ask"), "http://localhost:5000/api/ask");
    }

    #[tokio::test]
    async fn test_mock_engine_records_calls() {
        let engine = MockEngine::new().with_chunks(9);
        let resp = engine.ingest_url("https://a.example").await.unwrap();
        assert_eq!(resp.chunks_stored, 9);
        engine.reset().await.unwrap();

        assert_eq!(
            engine.calls(),
            vec![
                EngineCall::IngestUrl("https://a.example".to_string()),
                EngineCall::Reset
            ]
        );
    }

    #[tokio::test]
    async fn test_mock_engine_failing() {
        let engine = MockEngine::failing();
        assert!(engine.reset().await.is_err());
        assert_eq!(engine.call_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_engine_hold_releases_on_notify() {
        let engine = Arc::new(MockEngine::new());
        let gate = engine.hold();

        let task = {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.reset().await })
        };
        // Permit is stored even if the call has not reached the gate yet.
        gate.notify_one();
        task.await.unwrap().unwrap();
        assert_eq!(engine.call_count(), 1);
    }
}
