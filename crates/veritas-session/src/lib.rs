//! Client-side session coordination for Veritas.
//!
//! Holds the conversation and evidence for one session, sequences
//! ingestion and reset against the shared knowledge base, and runs the
//! two-phase ask flow against a [`KnowledgeEngine`].

pub mod ask;
pub mod confirmation;
pub mod engine;
pub mod error;
pub mod ingestion;
pub mod job;
pub mod session;
pub mod state;

pub use ask::{AskFlow, AskOutcome, PendingAsk};
pub use confirmation::{ConfirmedReset, ResetRequest};
pub use engine::{EngineCall, GatewayClient, KnowledgeEngine, MockEngine};
pub use error::{EngineError, SessionError};
pub use ingestion::IngestionCoordinator;
pub use job::{Job, JobKind, JobMachine, JobStatus, Resource};
pub use session::Session;
pub use state::{SessionState, SharedState};
