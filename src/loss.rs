//! Marginal antecedent loss.
//!
//! Each mention may have several correct antecedents (every earlier mention of
//! its gold cluster), so the target is the *set* of gold columns rather than a
//! single label. The objective is the negative marginal log-likelihood
//!
//! ```text
//! -log Σ_{j : G[i, j]} softmax(S[i])_j
//! ```
//!
//! whose gradient with respect to `S[i]` is
//! `softmax(S[i]) - softmax(S[i] restricted to gold columns)`.
//!
//! Two scalars are reported and kept apart:
//! - `monitoring_loss`: sum of squared gradient entries, used for progress logs
//! - `negative_log_likelihood`: the actual objective
//!
//! Backpropagation uses `gradient` only.

use crate::{Error, Result};
use ndarray::{Array2, ArrayView1, ArrayView2};

const COMPONENT: &str = "MarginalLoss";

/// Output of a loss computation.
#[derive(Debug, Clone, PartialEq)]
pub struct LossOutput {
    /// Gradient of the objective with respect to the scores.
    pub gradient: Array2<f32>,
    /// Sum of squared gradient entries (progress monitoring only).
    pub monitoring_loss: f32,
    /// Summed negative marginal log-likelihood over rows.
    pub negative_log_likelihood: f32,
}

/// Marginal softmax loss over a score matrix and a gold agreement matrix.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarginalLoss;

impl MarginalLoss {
    /// Create the loss.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Compute gradient and losses.
    ///
    /// `scores` and `gold` must have the same shape and every row of `gold`
    /// must contain at least one `true`.
    pub fn compute(&self, scores: ArrayView2<f32>, gold: ArrayView2<bool>) -> Result<LossOutput> {
        if scores.dim() != gold.dim() {
            return Err(Error::invalid_input(format!(
                "score matrix {:?} does not match gold matrix {:?}",
                scores.dim(),
                gold.dim()
            )));
        }
        if let Some(row) = gold.outer_iter().position(|row| !row.iter().any(|&g| g)) {
            return Err(Error::contract(
                COMPONENT,
                format!("gold row {} has no correct column", row),
            ));
        }

        let mut gradient = Array2::<f32>::zeros(scores.dim());
        let mut nll = 0.0f32;

        for ((mut grad, row), gold_row) in gradient
            .outer_iter_mut()
            .zip(scores.outer_iter())
            .zip(gold.outer_iter())
        {
            let log_norm = log_sum_exp(row, None);
            let log_marg = log_sum_exp(row, Some(gold_row));
            let n_gold = gold_row.iter().filter(|&&g| g).count() as f32;
            let n_cols = row.len() as f32;
            let all_masked = log_norm == f32::NEG_INFINITY;

            for ((g, &s), &is_gold) in grad.iter_mut().zip(row.iter()).zip(gold_row.iter()) {
                let p_norm = if all_masked {
                    1.0 / n_cols
                } else {
                    prob(s, log_norm)
                };
                let p_marg = if !is_gold {
                    0.0
                } else if log_marg == f32::NEG_INFINITY {
                    // every gold score is -inf: spread mass evenly
                    1.0 / n_gold
                } else {
                    prob(s, log_marg)
                };
                *g = p_norm - p_marg;
            }
            nll += if all_masked {
                (n_cols / n_gold).ln()
            } else {
                log_norm - log_marg
            };
        }

        let monitoring_loss: f32 = gradient.iter().map(|g| g * g).sum();
        log::debug!(
            "marginal loss over {} rows: monitoring={:.4} nll={:.4}",
            scores.nrows(),
            monitoring_loss,
            nll
        );

        Ok(LossOutput {
            gradient,
            monitoring_loss,
            negative_log_likelihood: nll,
        })
    }
}

/// `exp(s - log_z)`, zero for `-inf` scores.
fn prob(s: f32, log_z: f32) -> f32 {
    if s == f32::NEG_INFINITY || log_z == f32::NEG_INFINITY {
        0.0
    } else {
        (s - log_z).exp()
    }
}

/// Numerically stable `log Σ exp(row)`, optionally over masked entries only.
///
/// Returns `-inf` when no entry contributes.
pub(crate) fn log_sum_exp(row: ArrayView1<f32>, mask: Option<ArrayView1<bool>>) -> f32 {
    let keep = |j: usize| mask.as_ref().map_or(true, |m| m[j]);
    let max = row
        .iter()
        .enumerate()
        .filter(|(j, _)| keep(*j))
        .map(|(_, &s)| s)
        .fold(f32::NEG_INFINITY, f32::max);
    if max == f32::NEG_INFINITY {
        return f32::NEG_INFINITY;
    }
    let sum: f32 = row
        .iter()
        .enumerate()
        .filter(|(j, _)| keep(*j))
        .map(|(_, &s)| (s - max).exp())
        .sum();
    max + sum.ln()
}

/// Row-wise softmax.
#[must_use]
pub fn softmax_rows(scores: ArrayView2<f32>) -> Array2<f32> {
    let mut out = Array2::<f32>::zeros(scores.dim());
    for (mut out_row, row) in out.outer_iter_mut().zip(scores.outer_iter()) {
        let log_z = log_sum_exp(row, None);
        for (o, &s) in out_row.iter_mut().zip(row.iter()) {
            *o = prob(s, log_z);
        }
    }
    out
}
