//! Router setup with all gateway routes and middleware.

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method};
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use veritas_core::error::VeritasError;

use crate::handlers;
use crate::state::GatewayState;

/// CORS layer from the configured origins. An empty list allows any origin.
fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origin = if allowed_origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        let origins: Vec<HeaderValue> = allowed_origins
            .iter()
            .filter_map(|o| match o.parse::<HeaderValue>() {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!(origin = %o, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any)
}

/// Create the axum Router with all routes and middleware.
pub fn create_router(state: GatewayState) -> Router {
    let cors = cors_layer(&state.config.allowed_origins);
    let body_limit = state.config.max_upload_bytes();

    let api_routes = Router::new()
        .route("/ingest/url", post(handlers::ingest_url))
        .route("/ingest/pdf", post(handlers::ingest_pdf))
        .route("/ask", post(handlers::ask))
        .route("/reset", delete(handlers::reset));

    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .nest("/api", api_routes)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Bind to the configured host and port and serve until shutdown.
pub async fn start_server(state: GatewayState) -> Result<(), VeritasError> {
    let addr = format!("{}:{}", state.config.host, state.config.port);
    let engine_url = state.upstream.base_url().to_string();
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| VeritasError::Api(format!("Failed to bind {}: {}", addr, e)))?;

    tracing::info!(addr = %addr, engine_url = %engine_url, "Gateway running");

    axum::serve(listener, router)
        .await
        .map_err(|e| VeritasError::Api(format!("Server error: {}", e)))?;

    Ok(())
}
