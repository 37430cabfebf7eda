//! Conversation history pairing.
//!
//! Turns are paired strictly by position: `(turn[0], turn[1])`,
//! `(turn[2], turn[3])`, and so on. Role labels are not consulted. A
//! trailing odd turn is the question still awaiting its answer and is
//! dropped, since the active query travels separately from the history.

use crate::types::{HistoryPair, Turn};

/// Pair a flat turn list into question/answer history.
///
/// Yields `floor(turns.len() / 2)` pairs in input order.
pub fn pair_history(turns: &[Turn]) -> Vec<HistoryPair> {
    turns
        .chunks_exact(2)
        .map(|pair| HistoryPair::new(pair[0].content.clone(), pair[1].content.clone()))
        .collect()
}
