//! Candidate mention generation.
//!
//! Every token is a candidate head mention, and its `MentionId` is its token
//! index. Smarter span candidates come from the external rough scorer.

use coref_core::{Mention, MentionId};
use std::collections::HashMap;

/// Enumerates single-token candidate mentions for a document.
#[derive(Debug, Clone, Copy, Default)]
pub struct MentionIndexer;

impl MentionIndexer {
    /// Create an indexer.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// One mention per token, in token order. Mention `i` covers `[i, i+1)`.
    #[must_use]
    pub fn head_mentions(&self, n_tokens: usize) -> Vec<Mention> {
        (0..n_tokens).map(Mention::token).collect()
    }

    /// Map each candidate mention to its `MentionId`.
    #[must_use]
    pub fn index(&self, mentions: &[Mention]) -> HashMap<Mention, MentionId> {
        mentions
            .iter()
            .enumerate()
            .map(|(id, mention)| (*mention, id))
            .collect()
    }
}
