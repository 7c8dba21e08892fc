//! Mentions and clusters.
//!
//! # Terminology
//!
//! - **Mention**: A half-open token interval `[start, end)` that may refer to an entity
//! - **Cluster**: A set of mentions that corefer (refer to the same entity)
//! - **Partition**: The clusters of one document, pairwise disjoint
//! - **MentionId**: Position of a mention in a document's candidate list
//!
//! # Example
//!
//! ```rust
//! use coref_core::{Cluster, Mention};
//!
//! // "John went to the store . He bought milk ."
//! let john = Mention::new(0, 1);
//! let he = Mention::new(6, 7);
//!
//! let cluster = Cluster::new(vec![john, he]);
//! assert_eq!(cluster.len(), 2);
//! assert!(!cluster.is_singleton());
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Stable index of a mention within one document's candidate list.
pub type MentionId = usize;

// =============================================================================
// Mention
// =============================================================================

/// A token span `[start, end)`.
///
/// Mentions compare by position only. Ordering is by `(start, end)`, which is
/// also the order candidates are generated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Mention {
    /// First token (inclusive)
    pub start: usize,
    /// One past the last token (exclusive)
    pub end: usize,
}

impl Mention {
    /// Create a new mention.
    ///
    /// No validation is performed; see [`Mention::is_valid`] and
    /// [`Mention::check_bounds`].
    #[must_use]
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Single-token mention at `token`.
    #[must_use]
    pub fn token(token: usize) -> Self {
        Self {
            start: token,
            end: token + 1,
        }
    }

    /// Number of tokens covered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// Check if the span covers no tokens (including inverted spans).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `start < end`.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.start < self.end
    }

    /// Check that the span is non-empty and lies within a document of `n_tokens`.
    pub fn check_bounds(&self, n_tokens: usize) -> crate::Result<()> {
        if !self.is_valid() || self.end > n_tokens {
            return Err(crate::Error::span_out_of_bounds(format!(
                "{} in document of {} tokens",
                self, n_tokens
            )));
        }
        Ok(())
    }

    /// Check if this mention overlaps with another.
    #[must_use]
    pub fn overlaps(&self, other: &Mention) -> bool {
        self.start < other.end && other.start < self.end
    }
}

impl std::fmt::Display for Mention {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}-{})", self.start, self.end)
    }
}

impl From<(usize, usize)> for Mention {
    fn from((start, end): (usize, usize)) -> Self {
        Self::new(start, end)
    }
}

// =============================================================================
// Cluster
// =============================================================================

/// A cluster of mentions that refer to the same entity.
///
/// Mentions keep the order they were added in. For clusters produced by
/// decoding that is ascending `MentionId` order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cluster {
    /// The mentions in this cluster.
    pub mentions: Vec<Mention>,
}

/// The clusters of one document.
pub type MentionClusters = Vec<Cluster>;

impl Cluster {
    /// Create a cluster from mentions.
    #[must_use]
    pub fn new(mentions: Vec<Mention>) -> Self {
        Self { mentions }
    }

    /// Create a singleton cluster.
    #[must_use]
    pub fn singleton(mention: Mention) -> Self {
        Self {
            mentions: vec![mention],
        }
    }

    /// Number of mentions in this cluster.
    #[must_use]
    pub fn len(&self) -> usize {
        self.mentions.len()
    }

    /// Check if cluster is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mentions.is_empty()
    }

    /// Check if this is a singleton (single mention).
    #[must_use]
    pub fn is_singleton(&self) -> bool {
        self.mentions.len() == 1
    }

    /// Append a mention.
    pub fn push(&mut self, mention: Mention) {
        self.mentions.push(mention);
    }

    /// Check if the cluster contains a mention.
    #[must_use]
    pub fn contains(&self, mention: &Mention) -> bool {
        self.mentions.contains(mention)
    }

    /// Iterate over the mentions.
    pub fn iter(&self) -> std::slice::Iter<'_, Mention> {
        self.mentions.iter()
    }

    /// Set of mentions, for overlap counting.
    #[must_use]
    pub fn mention_set(&self) -> HashSet<Mention> {
        self.mentions.iter().copied().collect()
    }

    /// Number of mentions shared with another cluster.
    #[must_use]
    pub fn overlap(&self, other: &Cluster) -> usize {
        let other = other.mention_set();
        self.mention_set().intersection(&other).count()
    }
}

impl FromIterator<Mention> for Cluster {
    fn from_iter<I: IntoIterator<Item = Mention>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Cluster {
    type Item = &'a Mention;
    type IntoIter = std::slice::Iter<'a, Mention>;

    fn into_iter(self) -> Self::IntoIter {
        self.mentions.iter()
    }
}

impl std::fmt::Display for Cluster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mentions: Vec<String> = self.mentions.iter().map(|m| m.to_string()).collect();
        write!(f, "{{{}}}", mentions.join(", "))
    }
}

// =============================================================================
// Tests
// =============================================================================
