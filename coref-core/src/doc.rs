//! Documents and prefix-keyed span storage.
//!
//! Clusters are stored on a document as named span groups. Cluster `i` written
//! under prefix `P` lives at key `"P_i"`. The prefix is always passed in by the
//! caller; this module owns only the key format.
//!
//! ```rust
//! use coref_core::{Cluster, Doc, Mention};
//!
//! let mut doc = Doc::new(["Ann", "saw", "her", "dog"]);
//! let clusters = vec![Cluster::new(vec![Mention::token(0), Mention::token(2)])];
//! doc.spans.write_clusters("coref_clusters", &clusters).unwrap();
//!
//! assert!(doc.spans.contains_key("coref_clusters_0"));
//! assert_eq!(doc.spans.clusters("coref_clusters"), clusters);
//! ```

use crate::mention::{Cluster, Mention, MentionClusters};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// SpanGroups
// =============================================================================

/// Named groups of spans attached to a document.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpanGroups {
    groups: BTreeMap<String, Vec<Mention>>,
}

impl SpanGroups {
    /// Create an empty set of span groups.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Key under which cluster `index` is stored for `prefix`.
    #[must_use]
    pub fn cluster_key(prefix: &str, index: usize) -> String {
        format!("{}_{}", prefix, index)
    }

    /// Parse the cluster index out of `key` if it belongs to `prefix`.
    ///
    /// Only keys of the exact form `"<prefix>_<digits>"` match, so
    /// `"coref_clusters_0"` does not belong to prefix `"coref"`.
    #[must_use]
    pub fn cluster_index(prefix: &str, key: &str) -> Option<usize> {
        let suffix = key.strip_prefix(prefix)?.strip_prefix('_')?;
        if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        suffix.parse().ok()
    }

    /// Spans stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&[Mention]> {
        self.groups.get(key).map(Vec::as_slice)
    }

    /// Check whether `key` is present.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.groups.contains_key(key)
    }

    /// Store spans under `key`, returning the previous spans if any.
    pub fn insert(&mut self, key: impl Into<String>, spans: Vec<Mention>) -> Option<Vec<Mention>> {
        self.groups.insert(key.into(), spans)
    }

    /// Remove a group.
    pub fn remove(&mut self, key: &str) -> Option<Vec<Mention>> {
        self.groups.remove(key)
    }

    /// All keys, sorted lexicographically.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    /// Number of groups.
    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Check if there are no groups.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Iterate over all groups.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Mention])> {
        self.groups.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Read the clusters stored under `prefix`, ordered by cluster index.
    #[must_use]
    pub fn clusters(&self, prefix: &str) -> MentionClusters {
        let mut indexed: Vec<(usize, &Vec<Mention>)> = self
            .groups
            .iter()
            .filter_map(|(key, spans)| Self::cluster_index(prefix, key).map(|i| (i, spans)))
            .collect();
        indexed.sort_by_key(|(i, _)| *i);
        indexed
            .into_iter()
            .map(|(_, spans)| Cluster::new(spans.clone()))
            .collect()
    }

    /// Check whether any cluster is stored under `prefix`.
    #[must_use]
    pub fn has_clusters(&self, prefix: &str) -> bool {
        self.groups
            .keys()
            .any(|key| Self::cluster_index(prefix, key).is_some())
    }

    /// Write `clusters` under `prefix`, refusing to overwrite.
    ///
    /// All keys are checked before anything is written, so a collision leaves
    /// the groups unchanged.
    pub fn write_clusters(&mut self, prefix: &str, clusters: &[Cluster]) -> Result<()> {
        for index in 0..clusters.len() {
            let key = Self::cluster_key(prefix, index);
            if self.groups.contains_key(&key) {
                return Err(Error::key_collision(key));
            }
        }
        for (index, cluster) in clusters.iter().enumerate() {
            self.groups
                .insert(Self::cluster_key(prefix, index), cluster.mentions.clone());
        }
        Ok(())
    }

    /// Replace every cluster under `prefix` with `clusters`.
    pub fn replace_clusters(&mut self, prefix: &str, clusters: &[Cluster]) {
        self.groups
            .retain(|key, _| Self::cluster_index(prefix, key).is_none());
        for (index, cluster) in clusters.iter().enumerate() {
            self.groups
                .insert(Self::cluster_key(prefix, index), cluster.mentions.clone());
        }
    }
}

// =============================================================================
// Doc
// =============================================================================

/// A tokenized document with named span groups.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Doc {
    /// Token texts.
    pub tokens: Vec<String>,
    /// Span groups (clusters are stored here under prefixed keys).
    #[serde(default)]
    pub spans: SpanGroups,
}

impl Doc {
    /// Create a document from tokens.
    #[must_use]
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tokens: tokens.into_iter().map(Into::into).collect(),
            spans: SpanGroups::new(),
        }
    }

    /// Create a document of `n` placeholder tokens.
    #[must_use]
    pub fn with_len(n: usize) -> Self {
        Self::new((0..n).map(|i| format!("t{}", i)))
    }

    /// Number of tokens.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Check if the document has no tokens.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Text of a span, tokens joined by spaces.
    ///
    /// Returns `None` for spans that are empty or out of bounds.
    #[must_use]
    pub fn span_text(&self, mention: &Mention) -> Option<String> {
        mention.check_bounds(self.len()).ok()?;
        Some(self.tokens[mention.start..mention.end].join(" "))
    }

    /// Check that every stored span lies within the document.
    pub fn validate_spans(&self) -> Result<()> {
        for (key, spans) in self.spans.iter() {
            for mention in spans {
                mention
                    .check_bounds(self.len())
                    .map_err(|e| Error::span_out_of_bounds(format!("{} (group {:?})", e, key)))?;
            }
        }
        Ok(())
    }
}

// =============================================================================
// Example
// =============================================================================

/// A training or evaluation pair: the document as seen by the pipeline and the
/// gold-annotated reference.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Example {
    /// Document the pipeline predicts on.
    pub predicted: Doc,
    /// Gold-annotated document.
    pub reference: Doc,
}

impl Example {
    /// Create an example.
    #[must_use]
    pub fn new(predicted: Doc, reference: Doc) -> Self {
        Self {
            predicted,
            reference,
        }
    }

    /// Build an example whose predicted doc has the reference tokens and no spans.
    #[must_use]
    pub fn from_reference(reference: Doc) -> Self {
        let predicted = Doc::new(reference.tokens.iter().cloned());
        Self {
            predicted,
            reference,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
