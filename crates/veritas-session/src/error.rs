//! Error types for engine calls and session coordination.

use crate::job::{JobKind, JobStatus, Resource};

/// Failures talking to the knowledge engine (through the gateway).
///
/// These never reach the end user verbatim: the session logs them and
/// shows a fixed message instead.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("engine returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for EngineError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            EngineError::Decode(err.to_string())
        } else {
            EngineError::Transport(err.to_string())
        }
    }
}

/// Coordination refusals.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("{resource} is busy with {kind}")]
    Busy { resource: Resource, kind: JobKind },
    #[error("invalid job transition: {from} -> {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },
}
