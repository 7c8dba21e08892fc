//! Trainable pipeline components.
//!
//! The neural scorers are external: a component owns a boxed scorer and turns
//! its raw outputs into clusters (inference) or gradients (training).
//!
//! | Component | Scorer | Reads | Writes |
//! |-----------|--------|-------|--------|
//! | [`CorefResolver`] | [`AntecedentScorer`] | tokens | `<span_cluster_prefix>_<i>` |
//! | [`SpanPredictor`] | [`SpanScorer`] | `<input_prefix>_<i>` | `<output_prefix>_<i>` |
//!
//! Training processes one document at a time ("fake batching"): every
//! `get_loss` call takes exactly one example.

mod coref;
mod span;

pub use coref::CorefResolver;
pub use span::SpanPredictor;

use crate::eval::CorefEvaluation;
use crate::scores::AntecedentScores;
use crate::{Error, Result};
use coref_core::{Doc, Example, Mention, MentionClusters, MentionId};
use ndarray::{Array3, ArrayView2, ArrayView3};
use std::collections::BTreeMap;

/// Accumulated training losses keyed by component name.
pub type Losses = BTreeMap<String, f32>;

// =============================================================================
// Scorer contracts
// =============================================================================

/// External network producing antecedent scores for a document.
///
/// For a document of `n` tokens the candidates are the `n` single-token
/// mentions, so `M = n`.
pub trait AntecedentScorer: Send {
    /// Score a document without recording state for backprop.
    fn predict(&self, doc: &Doc) -> Result<AntecedentScores>;

    /// Score a document, keeping what [`AntecedentScorer::backprop`] needs.
    fn begin_update(&mut self, doc: &Doc) -> Result<AntecedentScores>;

    /// Push the score gradient for the last `begin_update`.
    fn backprop(
        &mut self,
        gradient: ArrayView2<f32>,
        antecedent_idx: ArrayView2<MentionId>,
    ) -> Result<()>;

    /// Apply accumulated gradients.
    fn finish_update(&mut self) -> Result<()>;

    /// Set the dropout rate for subsequent updates.
    fn set_dropout(&mut self, _rate: f32) {}

    /// Shape inference from sample inputs and gold outputs.
    fn initialize(&mut self, _inputs: &[Doc], _references: &[Doc]) -> Result<()> {
        Ok(())
    }
}

/// External network producing span boundary scores for head mentions.
///
/// Returns `[M, n, 2]` for `M` heads in a document of `n` tokens: channel 0
/// scores each token as the span start, channel 1 as its exclusive end.
pub trait SpanScorer: Send {
    /// Score heads without recording state for backprop.
    fn predict(&self, doc: &Doc, heads: &[Mention]) -> Result<Array3<f32>>;

    /// Score heads, keeping what [`SpanScorer::backprop`] needs.
    fn begin_update(&mut self, doc: &Doc, heads: &[Mention]) -> Result<Array3<f32>>;

    /// Push the score gradient for the last `begin_update`.
    fn backprop(&mut self, gradient: ArrayView3<f32>) -> Result<()>;

    /// Apply accumulated gradients.
    fn finish_update(&mut self) -> Result<()>;

    /// Set the dropout rate for subsequent updates.
    fn set_dropout(&mut self, _rate: f32) {}

    /// Shape inference from sample inputs and gold outputs.
    fn initialize(&mut self, _inputs: &[Doc], _references: &[Doc]) -> Result<()> {
        Ok(())
    }
}

// =============================================================================
// Shared helpers
// =============================================================================

/// Options for a training step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UpdateOptions {
    /// Dropout rate passed to the scorer.
    pub drop: f32,
    /// Call `finish_update` on the scorer after the batch.
    pub apply_gradients: bool,
}

impl Default for UpdateOptions {
    fn default() -> Self {
        Self {
            drop: 0.0,
            apply_gradients: true,
        }
    }
}

impl UpdateOptions {
    /// Builder: set dropout.
    #[must_use]
    pub fn with_drop(mut self, drop: f32) -> Self {
        self.drop = drop;
        self
    }

    /// Builder: accumulate gradients without applying them.
    #[must_use]
    pub fn without_apply(mut self) -> Self {
        self.apply_gradients = false;
        self
    }
}

/// Check that examples are well formed before any scoring happens.
///
/// Predicted and reference docs must have the same token count and every
/// stored span must lie inside its doc.
pub fn validate_examples(examples: &[Example], method: &str) -> Result<()> {
    for (i, eg) in examples.iter().enumerate() {
        if eg.predicted.len() != eg.reference.len() {
            return Err(Error::contract(
                method,
                format!(
                    "example {}: predicted doc has {} tokens, reference has {}",
                    i,
                    eg.predicted.len(),
                    eg.reference.len()
                ),
            ));
        }
        for doc in [&eg.predicted, &eg.reference] {
            doc.validate_spans()
                .map_err(|e| Error::contract(method, format!("example {}: {}", i, e)))?;
        }
    }
    Ok(())
}

/// Exactly one example per loss computation.
pub(crate) fn single_example<'a>(examples: &'a [Example], component: &str) -> Result<&'a Example> {
    match examples {
        [eg] => Ok(eg),
        _ => Err(Error::contract(
            component,
            format!(
                "only fake batching is supported: expected 1 example, got {}",
                examples.len()
            ),
        )),
    }
}

/// One set of clusters per doc.
pub(crate) fn check_batch(docs: usize, clusters: usize, component: &str) -> Result<()> {
    if docs != clusters {
        return Err(Error::contract(
            component,
            format!("{} cluster sets for {} documents", clusters, docs),
        ));
    }
    Ok(())
}

/// Micro-averaged metrics over examples, predicted vs reference clusters
/// stored under `prefix`.
pub(crate) fn evaluate_examples(examples: &[Example], prefix: &str) -> CorefEvaluation {
    let documents: Vec<(MentionClusters, MentionClusters)> = examples
        .iter()
        .map(|eg| {
            (
                eg.predicted.spans.clusters(prefix),
                eg.reference.spans.clusters(prefix),
            )
        })
        .collect();
    CorefEvaluation::compute_corpus(&documents)
}
