//! Veritas gateway - a stateless axum proxy in front of the answering engine.
//!
//! Forwards ingestion, ask and reset requests to the engine unchanged and
//! collapses every downstream failure into a fixed `{ "error": ... }` body.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;
pub mod upstream;

pub use error::GatewayError;
pub use routes::{create_router, start_server};
pub use state::GatewayState;
pub use upstream::{EngineUpstream, UpstreamError};
