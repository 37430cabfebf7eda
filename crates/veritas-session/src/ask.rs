//! Two-phase ask flow.
//!
//! Phase 1 ([`AskFlow::begin_ask`]) runs synchronously: it appends the
//! user turn, clears the query field and returns a [`PendingAsk`].
//! Phase 2 ([`AskFlow::finish_ask`]) applies the engine's result to the
//! conversation once the pending call resolves.

use std::sync::Arc;

use tracing::{debug, warn};
use veritas_core::{AskRequest, AskResponse, Turn};

use crate::engine::KnowledgeEngine;
use crate::error::{EngineError, SessionError};
use crate::job::{JobKind, JobMachine, JobStatus};
use crate::state::SharedState;

/// Agent turn appended when no answer could be retrieved.
pub const ASK_FAILURE_MESSAGE: &str = "Error: Could not retrieve answer.";

/// An ask whose user turn is already in the conversation and whose
/// engine call has not been reconciled yet.
#[derive(Debug)]
#[must_use = "a pending ask keeps search busy until passed to finish_ask"]
pub struct PendingAsk {
    request: AskRequest,
}

impl PendingAsk {
    /// The request to send: the query plus history as it stood before it.
    pub fn request(&self) -> &AskRequest {
        &self.request
    }

    pub fn query(&self) -> &str {
        &self.request.query
    }
}

/// Result of a completed ask.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AskOutcome {
    Answered { answer: String },
    Failed,
}

pub struct AskFlow<E> {
    engine: Arc<E>,
    state: SharedState,
    search: JobMachine,
    knowledge: JobMachine,
}

impl<E: KnowledgeEngine> AskFlow<E> {
    pub fn new(
        engine: Arc<E>,
        state: SharedState,
        search: JobMachine,
        knowledge: JobMachine,
    ) -> Self {
        Self {
            engine,
            state,
            search,
            knowledge,
        }
    }

    pub fn is_searching(&self) -> bool {
        self.search.is_running()
    }

    /// Phase 1: record the question optimistically.
    ///
    /// Returns `Ok(None)` on a blank query. Refused with `Busy` while
    /// another ask or a reset is in flight.
    pub fn begin_ask(&self, query: &str) -> Result<Option<PendingAsk>, SessionError> {
        let query = query.trim();
        if query.is_empty() {
            debug!("Ask skipped: empty query");
            return Ok(None);
        }

        self.search.begin_unless(
            JobKind::Ask,
            format!("Searching: {}", query),
            &self.knowledge,
            |kind| kind == JobKind::Reset,
        )?;

        let chat_history = self.state.with(|s| {
            let pairs = s.history.pairs();
            s.history.push(Turn::user(query));
            s.query_input.clear();
            pairs
        });

        Ok(Some(PendingAsk {
            request: AskRequest {
                query: query.to_string(),
                chat_history,
            },
        }))
    }

    /// Phase 2: reconcile the engine's result.
    ///
    /// Success appends the answer and replaces the evidence. Failure
    /// appends the fixed error turn and leaves the evidence alone.
    pub fn finish_ask(
        &self,
        pending: PendingAsk,
        result: Result<AskResponse, EngineError>,
    ) -> Result<AskOutcome, SessionError> {
        match result {
            Ok(response) => {
                if let Some(ref rewritten) = response.rewritten_query {
                    debug!(query = %pending.query(), rewritten = %rewritten, "Engine rewrote query");
                }
                let answer = response.answer;
                let evidence = response.evidence;
                debug!(evidence = evidence.len(), "Answer received");
                self.state.with(|s| {
                    s.history.push(Turn::agent(answer.clone()));
                    s.evidence.replace(evidence);
                });
                self.search.finish(JobStatus::Succeeded, "Answer received")?;
                Ok(AskOutcome::Answered { answer })
            }
            Err(e) => {
                warn!(query = %pending.query(), error = %e, "Ask failed");
                self.state
                    .with(|s| s.history.push(Turn::agent(ASK_FAILURE_MESSAGE)));
                self.search.finish(JobStatus::Failed, ASK_FAILURE_MESSAGE)?;
                Ok(AskOutcome::Failed)
            }
        }
    }

    /// Run both phases around the engine call.
    pub async fn ask(&self, query: &str) -> Result<Option<AskOutcome>, SessionError> {
        let Some(pending) = self.begin_ask(query)? else {
            return Ok(None);
        };
        let result = self.engine.ask(pending.request()).await;
        self.finish_ask(pending, result).map(Some)
    }
}

// =============================================================================
// Tests
// =============================================================================
