//! Antecedent score matrices produced by the external scorer.
//!
//! - `scores`: `[M, 1 + K]`. Column 0 is the "no antecedent" placeholder,
//!   column `k + 1` scores the `k`-th candidate antecedent.
//! - `antecedent_idx`: `[M, K]`. Entry `(m, k)` is the `MentionId` of the
//!   `k`-th candidate for mention `m`, or [`NO_ANTECEDENT`] as padding.

use crate::{Error, Result};
use coref_core::MentionId;
use ndarray::{Array2, ArrayView2};

/// Padding value for rows with fewer than `K` candidate antecedents.
pub const NO_ANTECEDENT: MentionId = usize::MAX;

/// Scores and candidate antecedents for one document.
#[derive(Debug, Clone, PartialEq)]
pub struct AntecedentScores {
    /// `[M, 1 + K]` raw scores, placeholder first.
    pub scores: Array2<f32>,
    /// `[M, K]` candidate antecedent ids.
    pub antecedent_idx: Array2<MentionId>,
}

impl AntecedentScores {
    /// Create from matrices, checking that their shapes agree.
    pub fn new(scores: Array2<f32>, antecedent_idx: Array2<MentionId>) -> Result<Self> {
        check_shapes(scores.view(), antecedent_idx.view())?;
        Ok(Self {
            scores,
            antecedent_idx,
        })
    }

    /// Scores for a document with no mentions and `k` candidate slots.
    #[must_use]
    pub fn empty(k: usize) -> Self {
        Self {
            scores: Array2::zeros((0, k + 1)),
            antecedent_idx: Array2::zeros((0, k)),
        }
    }

    /// Number of mentions (`M`).
    #[must_use]
    pub fn n_mentions(&self) -> usize {
        self.scores.nrows()
    }

    /// Number of candidate slots per mention (`K`).
    #[must_use]
    pub fn width(&self) -> usize {
        self.antecedent_idx.ncols()
    }

    /// Check shapes and that every index refers to one of `n_mentions`
    /// candidates or is padding.
    pub fn validate(&self, n_mentions: usize, component: &str) -> Result<()> {
        check_shapes(self.scores.view(), self.antecedent_idx.view())?;
        if self.n_mentions() != n_mentions {
            return Err(Error::contract(
                component,
                format!(
                    "scorer returned {} rows for {} candidate mentions",
                    self.n_mentions(),
                    n_mentions
                ),
            ));
        }
        check_indices(self.antecedent_idx.view(), n_mentions, component)
    }
}

/// `scores` must be `[M, 1 + K]` for an `[M, K]` index matrix.
pub(crate) fn check_shapes(scores: ArrayView2<f32>, antecedent_idx: ArrayView2<MentionId>) -> Result<()> {
    if scores.nrows() != antecedent_idx.nrows() || scores.ncols() != antecedent_idx.ncols() + 1 {
        return Err(Error::invalid_input(format!(
            "score matrix {:?} does not match antecedent index matrix {:?}",
            scores.dim(),
            antecedent_idx.dim()
        )));
    }
    Ok(())
}

/// Every entry must be padding or `< n_mentions`.
pub(crate) fn check_indices(
    antecedent_idx: ArrayView2<MentionId>,
    n_mentions: usize,
    component: &str,
) -> Result<()> {
    for ((m, k), &a) in antecedent_idx.indexed_iter() {
        if a != NO_ANTECEDENT && a >= n_mentions {
            return Err(Error::contract(
                component,
                format!(
                    "antecedent index {} at ({}, {}) out of range for {} mentions",
                    a, m, k, n_mentions
                ),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_shape_mismatch_rejected() {
        let scores = Array2::<f32>::zeros((2, 3));
        let idx = Array2::<usize>::zeros((2, 3));
        assert!(AntecedentScores::new(scores, idx).is_err());
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let s = AntecedentScores::new(Array2::zeros((2, 2)), array![[NO_ANTECEDENT], [5]]).unwrap();
        let err = s.validate(2, "coref").unwrap_err();
        assert!(matches!(err, Error::ContractViolation { ref component, .. } if component == "coref"));
    }

    #[test]
    fn test_validate_accepts_padding() {
        let s = AntecedentScores::new(Array2::zeros((2, 2)), array![[NO_ANTECEDENT], [0]]).unwrap();
        assert!(s.validate(2, "coref").is_ok());
        assert_eq!(s.width(), 1);
    }

    #[test]
    fn test_validate_row_count() {
        let s = AntecedentScores::empty(3);
        assert!(s.validate(0, "coref").is_ok());
        assert!(s.validate(1, "coref").is_err());
    }
}
