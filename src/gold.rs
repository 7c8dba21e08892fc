//! Gold supervision for the antecedent scorer.
//!
//! Builds the boolean gold agreement matrix `G` (`[M, 1 + K]`) that mirrors the
//! score matrix: `G[m, k + 1]` is true iff the `k`-th candidate antecedent of
//! `m` is in the same gold cluster and precedes `m`; `G[m, 0]` is true iff no
//! candidate column is.
//!
//! Gold mentions that are not among the candidates are ignored, which is how
//! pruned or unreachable antecedents fall back to the placeholder.

use crate::mentions::MentionIndexer;
use crate::scores::{check_indices, NO_ANTECEDENT};
use crate::Result;
use coref_core::{Cluster, Mention, MentionId};
use ndarray::{Array2, ArrayView2};

const COMPONENT: &str = "GoldAligner";

/// Aligns gold clusters with candidate antecedents.
#[derive(Debug, Clone, Copy, Default)]
pub struct GoldAligner;

impl GoldAligner {
    /// Create an aligner.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Full mention-pair gold matrix `F` (`[M, M]`).
    ///
    /// `F[i, j]` is true iff `i` and `j` share a gold cluster and `j < i`.
    #[must_use]
    pub fn pair_matrix(&self, mentions: &[Mention], gold: &[Cluster]) -> Array2<bool> {
        let n = mentions.len();
        let index = MentionIndexer::new().index(mentions);
        let mut pairs = Array2::from_elem((n, n), false);

        for cluster in gold {
            let ids: Vec<MentionId> = cluster
                .iter()
                .filter_map(|mention| index.get(mention).copied())
                .collect();
            for &i in &ids {
                for &j in &ids {
                    if j < i {
                        pairs[[i, j]] = true;
                    }
                }
            }
        }
        pairs
    }

    /// Gold agreement matrix `G` (`[M, 1 + K]`) for the given candidates.
    ///
    /// Fails if an index is neither padding nor a valid `MentionId`.
    pub fn align(
        &self,
        mentions: &[Mention],
        gold: &[Cluster],
        antecedent_idx: ArrayView2<MentionId>,
    ) -> Result<Array2<bool>> {
        let n = mentions.len();
        if antecedent_idx.nrows() != n {
            return Err(crate::Error::contract(
                COMPONENT,
                format!(
                    "antecedent index has {} rows for {} mentions",
                    antecedent_idx.nrows(),
                    n
                ),
            ));
        }
        check_indices(antecedent_idx, n, COMPONENT)?;

        let pairs = self.pair_matrix(mentions, gold);
        let k = antecedent_idx.ncols();
        let mut agreement = Array2::from_elem((n, k + 1), false);

        for (m, candidates) in antecedent_idx.outer_iter().enumerate() {
            let mut any_gold = false;
            for (slot, &a) in candidates.iter().enumerate() {
                if a != NO_ANTECEDENT && pairs[[m, a]] {
                    agreement[[m, slot + 1]] = true;
                    any_gold = true;
                }
            }
            agreement[[m, 0]] = !any_gold;
        }

        log::debug!(
            "aligned {} mentions against {} gold clusters ({} candidate slots)",
            n,
            gold.len(),
            k
        );
        Ok(agreement)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use ndarray::array;

    const PAD: usize = NO_ANTECEDENT;

    fn cluster(tokens: &[usize]) -> Cluster {
        tokens.iter().map(|&t| Mention::token(t)).collect()
    }

    fn four_mentions() -> (Vec<Mention>, Vec<Cluster>) {
        let mentions = MentionIndexer::new().head_mentions(4);
        let gold = vec![cluster(&[0, 2]), cluster(&[1]), cluster(&[3])];
        (mentions, gold)
    }

    #[test]
    fn test_pair_matrix_is_strictly_lower() {
        let (mentions, gold) = four_mentions();
        let pairs = GoldAligner::new().pair_matrix(&mentions, &gold);
        assert!(pairs[[2, 0]]);
        assert!(!pairs[[0, 2]]);
        assert_eq!(pairs.iter().filter(|&&b| b).count(), 1);
    }

    #[test]
    fn test_four_mention_alignment() {
        let (mentions, gold) = four_mentions();
        let idx = array![
            [PAD, PAD, PAD],
            [0, PAD, PAD],
            [0, 1, PAD],
            [0, 1, 2],
        ];
        let g = GoldAligner::new().align(&mentions, &gold, idx.view()).unwrap();

        assert_eq!(g.dim(), (4, 4));
        // Mention 2's first candidate is mention 0, its gold antecedent
        assert_eq!(g.row(2).to_vec(), vec![false, true, false, false]);
        // Everyone else starts a new cluster
        for m in [0, 1, 3] {
            assert!(g[[m, 0]], "row {} should use the placeholder", m);
            assert_eq!(g.row(m).iter().filter(|&&b| b).count(), 1);
        }
    }

    #[test]
    fn test_every_row_has_a_target() {
        let mentions = MentionIndexer::new().head_mentions(5);
        let gold = vec![cluster(&[0, 1, 2, 3, 4])];
        let idx = array![[PAD, PAD], [0, PAD], [1, 0], [2, 1], [3, 2]];
        let g = GoldAligner::new().align(&mentions, &gold, idx.view()).unwrap();
        for row in g.outer_iter() {
            assert!(row.iter().any(|&b| b));
        }
        // Multiple correct antecedents in one row
        assert_eq!(g.row(2).to_vec(), vec![false, true, true]);
    }

    #[test]
    fn test_later_candidate_is_not_gold() {
        let mentions = MentionIndexer::new().head_mentions(3);
        let gold = vec![cluster(&[0, 2])];
        // Mention 0 offered mention 2 as a candidate
        let idx = array![[2], [PAD], [0]];
        let g = GoldAligner::new().align(&mentions, &gold, idx.view()).unwrap();
        assert_eq!(g.row(0).to_vec(), vec![true, false]);
        assert_eq!(g.row(2).to_vec(), vec![false, true]);
    }

    #[test]
    fn test_gold_mentions_outside_candidates_ignored() {
        let mentions = MentionIndexer::new().head_mentions(2);
        let gold = vec![Cluster::new(vec![Mention::new(0, 2), Mention::token(1)])];
        let idx = array![[PAD], [0]];
        let g = GoldAligner::new().align(&mentions, &gold, idx.view()).unwrap();
        assert_eq!(g.row(1).to_vec(), vec![true, false]);
    }

    #[test]
    fn test_out_of_range_index_fails_fast() {
        let mentions = MentionIndexer::new().head_mentions(2);
        let idx = array![[PAD], [7]];
        let err = GoldAligner::new().align(&mentions, &[], idx.view()).unwrap_err();
        assert!(matches!(err, Error::ContractViolation { .. }));
    }
}
