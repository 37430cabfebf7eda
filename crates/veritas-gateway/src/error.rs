//! Gateway error responses.
//!
//! Every downstream failure, whatever its cause, becomes a 500 with a fixed
//! per-route message. The cause is logged by the handler and dropped here.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use veritas_core::ErrorBody;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// URL or file ingestion failed downstream.
    #[error("Failed to ingest data")]
    Ingest,
    /// The engine could not answer.
    #[error("Failed to get answer")]
    Ask,
    /// The engine could not purge the knowledge base.
    #[error("Failed to reset knowledge base")]
    Reset,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.to_string(),
        };
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}
