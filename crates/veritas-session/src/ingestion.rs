//! Ingestion coordinator: URL ingestion, file ingestion and reset, all
//! single-flight over the shared knowledge base.

use std::sync::Arc;

use tracing::{debug, error, info, warn};
use veritas_core::FileUpload;

use crate::confirmation::{ConfirmedReset, ResetRequest};
use crate::engine::KnowledgeEngine;
use crate::error::SessionError;
use crate::job::{Job, JobKind, JobMachine, JobStatus};
use crate::state::SharedState;

pub const URL_FAILURE_MESSAGE: &str = "Error: Failed to process source.";
pub const FILES_FAILURE_MESSAGE: &str = "Error: Failed to process files.";
pub const RESET_RUNNING_MESSAGE: &str = "Purging knowledge base...";
pub const RESET_SUCCESS_MESSAGE: &str = "Knowledge base cleared.";
pub const RESET_FAILURE_MESSAGE: &str = "Error: Failed to reset knowledge base.";

fn success_message(chunks_stored: u64) -> String {
    format!("Success: Ingested {} chunks.", chunks_stored)
}

/// Drives every mutation of the knowledge base.
///
/// `knowledge` guards the knowledge base itself; `search` is only consulted
/// so a reset cannot start under an in-flight ask.
pub struct IngestionCoordinator<E> {
    engine: Arc<E>,
    state: SharedState,
    knowledge: JobMachine,
    search: JobMachine,
}

impl<E: KnowledgeEngine> IngestionCoordinator<E> {
    pub fn new(
        engine: Arc<E>,
        state: SharedState,
        knowledge: JobMachine,
        search: JobMachine,
    ) -> Self {
        Self {
            engine,
            state,
            knowledge,
            search,
        }
    }

    /// Current job and its status line.
    pub fn status(&self) -> Job {
        self.knowledge.current()
    }

    /// Whether the knowledge base is being mutated.
    pub fn is_busy(&self) -> bool {
        self.knowledge.is_running()
    }

    /// Ingest the page at `url`.
    ///
    /// Returns `Ok(None)` without touching anything if `url` is blank, and
    /// `Err(Busy)` if another knowledge-base job is running. Engine
    /// failures end in a `Failed` job, not an error.
    pub async fn begin_url_ingestion(&self, url: &str) -> Result<Option<Job>, SessionError> {
        let url = url.trim();
        if url.is_empty() {
            debug!("URL ingestion skipped: empty URL");
            return Ok(None);
        }

        self.knowledge
            .begin(JobKind::Url, format!("Vectorizing content from {}...", url))?;

        let job = match self.engine.ingest_url(url).await {
            Ok(response) => {
                info!(url, chunks = response.chunks_stored, "URL ingested");
                self.state.with(|s| s.url_input.clear());
                self.knowledge
                    .finish(JobStatus::Succeeded, success_message(response.chunks_stored))?
            }
            Err(e) => {
                warn!(url, error = %e, "URL ingestion failed");
                self.knowledge.finish(JobStatus::Failed, URL_FAILURE_MESSAGE)?
            }
        };
        Ok(Some(job))
    }

    /// Upload `files` in a single request.
    ///
    /// An empty set is a no-op: no network call, status unchanged.
    pub async fn begin_file_ingestion(
        &self,
        files: &[FileUpload],
    ) -> Result<Option<Job>, SessionError> {
        if files.is_empty() {
            debug!("File ingestion skipped: no files");
            return Ok(None);
        }

        self.knowledge
            .begin(JobKind::Files, format!("Uploading {} file(s)...", files.len()))?;

        let job = match self.engine.ingest_files(files).await {
            Ok(response) => {
                info!(
                    files = files.len(),
                    chunks = response.chunks_stored,
                    "Files ingested"
                );
                self.knowledge
                    .finish(JobStatus::Succeeded, success_message(response.chunks_stored))?
            }
            Err(e) => {
                let names: Vec<&str> = files.iter().map(|f| f.file_name.as_str()).collect();
                warn!(files = ?names, error = %e, "File ingestion failed");
                self.knowledge.finish(JobStatus::Failed, FILES_FAILURE_MESSAGE)?
            }
        };
        Ok(Some(job))
    }

    /// Ask for permission to reset. Approve the request to get the token
    /// [`IngestionCoordinator::reset`] requires.
    pub fn request_reset(&self) -> ResetRequest {
        ResetRequest::new()
    }

    /// Purge the knowledge base and, on success, the conversation and
    /// evidence that depended on it.
    ///
    /// Refused while any knowledge-base job or an ask is in flight. On
    /// failure the conversation is left as it was.
    pub async fn reset(&self, _confirmed: ConfirmedReset) -> Result<Job, SessionError> {
        self.knowledge
            .begin_unless(JobKind::Reset, RESET_RUNNING_MESSAGE, &self.search, |_| true)?;

        match self.engine.reset().await {
            Ok(()) => {
                self.state.with(|s| {
                    s.history.clear();
                    s.evidence.clear();
                });
                info!("Knowledge base reset; conversation cleared");
                self.knowledge
                    .finish(JobStatus::Succeeded, RESET_SUCCESS_MESSAGE)
            }
            Err(e) => {
                error!(error = %e, "Knowledge base reset failed");
                self.knowledge.finish(JobStatus::Failed, RESET_FAILURE_MESSAGE)
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
