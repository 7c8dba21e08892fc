//! Expanding single-token head mentions into full spans.
//!
//! The span scorer emits, for each head mention, a `[n, 2]` block of scores
//! over the document's tokens: channel 0 scores each position as the span's
//! `start`, channel 1 scores each position as its (exclusive) `end`. The two
//! boundaries are chosen independently by argmax, and trained as two
//! independent single-label classifications.
//!
//! The end channel has `n` classes, so a span ending at the document's last
//! token (`end == n`) has no class; such gold spans are rejected.
//!
//! Nothing here forces `start < end`; see [`InvalidSpanPolicy`].

use crate::loss::softmax_rows;
use crate::{Error, Result};
use coref_core::{Cluster, Mention, MentionClusters};
use ndarray::{s, Array3, ArrayView1, ArrayView3};
use serde::{Deserialize, Serialize};

const COMPONENT: &str = "SpanBoundaryResolver";

/// What to do with a predicted span whose end is not after its start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidSpanPolicy {
    /// Emit the span unchanged.
    #[default]
    PassThrough,
    /// Shrink it to the single token at `start`.
    Clamp,
    /// Leave the mention out of its cluster.
    Drop,
}

impl InvalidSpanPolicy {
    /// Apply the policy to one predicted span.
    #[must_use]
    pub fn apply(self, mention: Mention) -> Option<Mention> {
        if mention.is_valid() {
            return Some(mention);
        }
        log::warn!("predicted span {} ends before it starts ({:?})", mention, self);
        match self {
            Self::PassThrough => Some(mention),
            Self::Clamp => Some(Mention::token(mention.start)),
            Self::Drop => None,
        }
    }
}

/// Gradient and monitoring loss for the span boundary classifiers.
#[derive(Debug, Clone, PartialEq)]
pub struct SpanLoss {
    /// `[M, n, 2]` gradient, start channel first.
    pub gradient: Array3<f32>,
    /// Sum of squared gradient entries (progress monitoring only).
    pub monitoring_loss: f32,
}

/// Resolves span boundaries from per-token start/end scores.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpanBoundaryResolver;

impl SpanBoundaryResolver {
    /// Create a resolver.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Span for one head mention.
    #[must_use]
    pub fn resolve(&self, start_scores: ArrayView1<f32>, end_scores: ArrayView1<f32>) -> Mention {
        Mention::new(argmax(start_scores), argmax(end_scores))
    }

    /// Spans for every head mention in a `[M, n, 2]` score tensor.
    pub fn predict(&self, span_scores: ArrayView3<f32>) -> Result<Vec<Mention>> {
        check_channels(span_scores)?;
        Ok((0..span_scores.shape()[0])
            .map(|m| {
                self.resolve(
                    span_scores.slice(s![m, .., 0]),
                    span_scores.slice(s![m, .., 1]),
                )
            })
            .collect())
    }

    /// Cross-entropy gradient against gold spans, one per head mention.
    pub fn get_loss(&self, span_scores: ArrayView3<f32>, gold: &[Mention]) -> Result<SpanLoss> {
        check_channels(span_scores)?;
        let (n_mentions, n_tokens, _) = span_scores.dim();
        if gold.len() != n_mentions {
            return Err(Error::contract(
                COMPONENT,
                format!(
                    "{} gold spans for {} scored head mentions",
                    gold.len(),
                    n_mentions
                ),
            ));
        }
        for mention in gold {
            mention
                .check_bounds(n_tokens)
                .map_err(|e| Error::contract(COMPONENT, format!("gold span invalid: {}", e)))?;
            if mention.end == n_tokens {
                return Err(Error::contract(
                    COMPONENT,
                    format!(
                        "gold span {} ends at the last of {} tokens, outside the end classes",
                        mention, n_tokens
                    ),
                ));
            }
        }

        let mut gradient = Array3::<f32>::zeros(span_scores.raw_dim());
        for channel in 0..2 {
            let probs = softmax_rows(span_scores.slice(s![.., .., channel]));
            gradient.slice_mut(s![.., .., channel]).assign(&probs);
            for (m, mention) in gold.iter().enumerate() {
                let target = if channel == 0 {
                    mention.start
                } else {
                    mention.end
                };
                gradient[[m, target, channel]] -= 1.0;
            }
        }

        let monitoring_loss: f32 = gradient.iter().map(|g| g * g).sum();
        log::debug!(
            "span loss over {} mentions x {} tokens: {:.4}",
            n_mentions,
            n_tokens,
            monitoring_loss
        );
        Ok(SpanLoss {
            gradient,
            monitoring_loss,
        })
    }

    /// Lay predicted spans out in the shape of the head clusters.
    ///
    /// `spans` holds one span per head mention in cluster order. Spans removed
    /// by `policy` are left out; clusters left empty are dropped.
    pub fn expand_clusters(
        &self,
        heads: &[Cluster],
        spans: &[Mention],
        policy: InvalidSpanPolicy,
    ) -> Result<MentionClusters> {
        let expected: usize = heads.iter().map(Cluster::len).sum();
        if expected != spans.len() {
            return Err(Error::contract(
                COMPONENT,
                format!(
                    "{} predicted spans for {} head mentions",
                    spans.len(),
                    expected
                ),
            ));
        }

        let mut spans = spans.iter();
        let mut out = MentionClusters::with_capacity(heads.len());
        for head in heads {
            let cluster: Cluster = spans
                .by_ref()
                .take(head.len())
                .filter_map(|&m| policy.apply(m))
                .collect();
            if !cluster.is_empty() {
                out.push(cluster);
            }
        }
        Ok(out)
    }
}

fn check_channels(span_scores: ArrayView3<f32>) -> Result<()> {
    if span_scores.shape()[2] != 2 {
        return Err(Error::invalid_input(format!(
            "span scores must have 2 channels, got shape {:?}",
            span_scores.shape()
        )));
    }
    Ok(())
}

/// First index of the maximum; NaN never wins.
fn argmax(scores: ArrayView1<f32>) -> usize {
    let mut best = 0;
    let mut best_score = f32::NEG_INFINITY;
    for (i, &s) in scores.iter().enumerate() {
        if s > best_score {
            best = i;
            best_score = s;
        }
    }
    best
}
