//! A single client session: shared state plus the flows that mutate it.

use std::sync::Arc;

use veritas_core::{ConversationHistory, EvidenceSet, FileUpload};

use crate::ask::{AskFlow, AskOutcome};
use crate::confirmation::{ConfirmedReset, ResetRequest};
use crate::engine::KnowledgeEngine;
use crate::error::SessionError;
use crate::ingestion::IngestionCoordinator;
use crate::job::{Job, JobMachine, Resource};
use crate::state::{SessionState, SharedState};

/// One conversation against one knowledge base.
pub struct Session<E> {
    state: SharedState,
    ingestion: IngestionCoordinator<E>,
    ask: AskFlow<E>,
}

impl<E: KnowledgeEngine> Session<E> {
    pub fn new(engine: E) -> Self {
        Self::with_engine(Arc::new(engine))
    }

    /// Build a session around a shared engine handle.
    pub fn with_engine(engine: Arc<E>) -> Self {
        let state = SharedState::new();
        let knowledge = JobMachine::new(Resource::KnowledgeBase);
        let search = JobMachine::new(Resource::Search);

        let ingestion = IngestionCoordinator::new(
            Arc::clone(&engine),
            state.clone(),
            knowledge.clone(),
            search.clone(),
        );
        let ask = AskFlow::new(engine, state.clone(), search, knowledge);

        Self {
            state,
            ingestion,
            ask,
        }
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    pub fn snapshot(&self) -> SessionState {
        self.state.snapshot()
    }

    pub fn history(&self) -> ConversationHistory {
        self.state.history()
    }

    pub fn evidence(&self) -> EvidenceSet {
        self.state.evidence()
    }

    pub fn ingestion(&self) -> &IngestionCoordinator<E> {
        &self.ingestion
    }

    pub fn ask_flow(&self) -> &AskFlow<E> {
        &self.ask
    }

    /// Knowledge-base job status line.
    pub fn knowledge_status(&self) -> Job {
        self.ingestion.status()
    }

    /// True while the knowledge base is being mutated.
    pub fn is_training(&self) -> bool {
        self.ingestion.is_busy()
    }

    pub fn is_searching(&self) -> bool {
        self.ask.is_searching()
    }

    pub async fn ingest_url(&self, url: &str) -> Result<Option<Job>, SessionError> {
        self.ingestion.begin_url_ingestion(url).await
    }

    pub async fn ingest_files(&self, files: &[FileUpload]) -> Result<Option<Job>, SessionError> {
        self.ingestion.begin_file_ingestion(files).await
    }

    pub async fn ask(&self, query: &str) -> Result<Option<AskOutcome>, SessionError> {
        self.ask.ask(query).await
    }

    pub fn request_reset(&self) -> ResetRequest {
        self.ingestion.request_reset()
    }

    pub async fn reset(&self, confirmed: ConfirmedReset) -> Result<Job, SessionError> {
        self.ingestion.reset(confirmed).await
    }
}

// =============================================================================
// Tests
// =============================================================================
