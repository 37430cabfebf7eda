//! Session-resident conversation state.
//!
//! SharedState is handed to the ingestion coordinator and the ask flow.
//! The lock is only ever held for a synchronous mutation, never across
//! an engine call.

use std::sync::{Arc, Mutex};

use veritas_core::{ConversationHistory, EvidenceSet};

/// Everything the session shows: the conversation, the latest evidence,
/// and the two input fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub history: ConversationHistory,
    pub evidence: EvidenceSet,
    /// Pending URL in the "add source" field.
    pub url_input: String,
    /// Pending question in the query field.
    pub query_input: String,
}

/// Shared handle to a [`SessionState`].
#[derive(Debug, Clone, Default)]
pub struct SharedState {
    inner: Arc<Mutex<SessionState>>,
}

impl SharedState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` with exclusive access to the state.
    pub fn with<R>(&self, f: impl FnOnce(&mut SessionState) -> R) -> R {
        let mut state = self.inner.lock().expect("session state mutex poisoned");
        f(&mut state)
    }

    pub fn snapshot(&self) -> SessionState {
        self.with(|s| s.clone())
    }

    pub fn history(&self) -> ConversationHistory {
        self.with(|s| s.history.clone())
    }

    pub fn evidence(&self) -> EvidenceSet {
        self.with(|s| s.evidence.clone())
    }

    pub fn set_url_input(&self, url: impl Into<String>) {
        let url = url.into();
        self.with(|s| s.url_input = url);
    }

    pub fn set_query_input(&self, query: impl Into<String>) {
        let query = query.into();
        self.with(|s| s.query_input = query);
    }
}
