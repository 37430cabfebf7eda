//! Human confirmation gate for resetting the knowledge base.
//!
//! `IngestionCoordinator::reset` only accepts a [`ConfirmedReset`], and
//! the only way to obtain one is approving a [`ResetRequest`].

/// Prompt shown before a reset.
pub const RESET_PROMPT: &str =
    "This permanently deletes every ingested source and clears the conversation. Continue?";

/// A pending request to reset the knowledge base, awaiting a human answer.
#[derive(Debug)]
#[must_use = "a reset request does nothing until approved"]
pub struct ResetRequest {
    prompt: &'static str,
}

impl ResetRequest {
    pub(crate) fn new() -> Self {
        Self {
            prompt: RESET_PROMPT,
        }
    }

    /// Text to show the user.
    pub fn prompt(&self) -> &str {
        self.prompt
    }

    /// The user agreed.
    pub fn approve(self) -> ConfirmedReset {
        tracing::info!("Knowledge base reset approved");
        ConfirmedReset { _private: () }
    }

    /// The user declined. Nothing is reset.
    pub fn decline(self) {
        tracing::info!("Knowledge base reset declined");
    }

    /// Approve or decline based on a yes/no answer.
    pub fn answer(self, approved: bool) -> Option<ConfirmedReset> {
        if approved {
            Some(self.approve())
        } else {
            self.decline();
            None
        }
    }
}

/// Proof that a human approved an irreversible reset.
#[derive(Debug)]
pub struct ConfirmedReset {
    _private: (),
}

/// Interpret a terminal answer to a yes/no prompt. Anything other than
/// `y`/`yes` (case-insensitive) is a no.
pub fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
