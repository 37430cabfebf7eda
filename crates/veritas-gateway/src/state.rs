//! Gateway state shared across handlers.
//!
//! Holds no knowledge-base or session data: only the engine client, the
//! configuration and the start time.

use std::sync::Arc;
use std::time::Instant;

use veritas_core::config::GatewayConfig;

use crate::upstream::{EngineUpstream, UpstreamError};

#[derive(Clone)]
pub struct GatewayState {
    /// Gateway configuration.
    pub config: Arc<GatewayConfig>,
    /// Engine client.
    pub upstream: Arc<EngineUpstream>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl GatewayState {
    /// Build state for a gateway in front of `config.engine_url`.
    pub fn new(config: GatewayConfig) -> Result<Self, UpstreamError> {
        let upstream = EngineUpstream::new(config.engine_url.clone())?;
        Ok(Self {
            config: Arc::new(config),
            upstream: Arc::new(upstream),
            start_time: Instant::now(),
        })
    }
}
