//! Greedy left-to-right cluster decoding.
//!
//! For each mention in `MentionId` order the highest scoring column wins:
//! the placeholder starts a new cluster, an antecedent column joins the
//! antecedent's cluster. Ties go to the lowest column index, so decoding is
//! reproducible. Clusters with a single mention are dropped from the output.
//!
//! The decode is sequential by construction: each step reads the assignments
//! made by earlier steps.

use crate::scores::{check_indices, check_shapes, NO_ANTECEDENT};
use crate::{Error, Result};
use coref_core::{Cluster, Mention, MentionClusters, MentionId};
use ndarray::{ArrayView1, ArrayView2};

const COMPONENT: &str = "ClusterAssembler";

/// Decodes antecedent scores into a partition of mentions.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClusterAssembler;

impl ClusterAssembler {
    /// Create an assembler.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Column with the highest score in one row.
    ///
    /// Padding columns and NaN scores never win; ties resolve to the lowest
    /// column, and a row with nothing better than `-inf` picks the placeholder.
    #[must_use]
    pub fn best_column(scores: ArrayView1<f32>, antecedents: ArrayView1<MentionId>) -> usize {
        let mut best = 0;
        let mut best_score = match scores.first() {
            Some(s) if !s.is_nan() => *s,
            _ => f32::NEG_INFINITY,
        };
        for (col, &s) in scores.iter().enumerate().skip(1) {
            if antecedents.get(col - 1) == Some(&NO_ANTECEDENT) {
                continue;
            }
            if s > best_score {
                best = col;
                best_score = s;
            }
        }
        best
    }

    /// The chosen antecedent of every mention, `None` for the placeholder.
    ///
    /// A mention that picks itself is treated as choosing the placeholder.
    pub fn antecedents(
        &self,
        scores: ArrayView2<f32>,
        antecedent_idx: ArrayView2<MentionId>,
    ) -> Result<Vec<Option<MentionId>>> {
        check_shapes(scores, antecedent_idx)?;
        check_indices(antecedent_idx, scores.nrows(), COMPONENT)?;

        Ok(scores
            .outer_iter()
            .zip(antecedent_idx.outer_iter())
            .enumerate()
            .map(|(m, (row, candidates))| match Self::best_column(row, candidates) {
                0 => None,
                col => Some(candidates[col - 1]).filter(|&a| a != m),
            })
            .collect())
    }

    /// Decode into clusters of at least two mentions.
    ///
    /// `mentions[i]` is the mention with `MentionId` `i`.
    pub fn decode(
        &self,
        mentions: &[Mention],
        scores: ArrayView2<f32>,
        antecedent_idx: ArrayView2<MentionId>,
    ) -> Result<MentionClusters> {
        if scores.nrows() != mentions.len() {
            return Err(Error::contract(
                COMPONENT,
                format!(
                    "score matrix has {} rows for {} mentions",
                    scores.nrows(),
                    mentions.len()
                ),
            ));
        }
        let chosen = self.antecedents(scores, antecedent_idx)?;
        let clusters = assemble(&chosen);

        let out: MentionClusters = clusters
            .into_iter()
            .filter(|ids| ids.len() >= 2)
            .map(|ids| ids.into_iter().map(|id| mentions[id]).collect::<Cluster>())
            .collect();

        log::debug!(
            "decoded {} mentions into {} clusters",
            mentions.len(),
            out.len()
        );
        Ok(out)
    }
}

/// Build clusters of ids (singletons included) from per-mention choices.
fn assemble(chosen: &[Option<MentionId>]) -> Vec<Vec<MentionId>> {
    let mut clusters: Vec<Vec<MentionId>> = Vec::new();
    let mut cluster_of: Vec<Option<usize>> = vec![None; chosen.len()];

    for (m, choice) in chosen.iter().enumerate() {
        match (*choice, cluster_of[m]) {
            (None, None) => {
                cluster_of[m] = Some(clusters.len());
                clusters.push(vec![m]);
            }
            // already placed by a later mention pointing back at it
            (None, Some(_)) => {}
            (Some(a), None) => match cluster_of[a] {
                Some(c) => {
                    clusters[c].push(m);
                    cluster_of[m] = Some(c);
                }
                None => {
                    let c = clusters.len();
                    clusters.push(vec![a, m]);
                    cluster_of[a] = Some(c);
                    cluster_of[m] = Some(c);
                }
            },
            (Some(a), Some(cm)) => match cluster_of[a] {
                None => {
                    clusters[cm].push(a);
                    cluster_of[a] = Some(cm);
                }
                Some(ca) if ca != cm => {
                    let (keep, gone) = (ca.min(cm), ca.max(cm));
                    let moved = std::mem::take(&mut clusters[gone]);
                    for &id in &moved {
                        cluster_of[id] = Some(keep);
                    }
                    clusters[keep].extend(moved);
                }
                Some(_) => {}
            },
        }
    }
    clusters
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mentions::MentionIndexer;
    use ndarray::{array, Array2};
    use std::collections::HashSet;

    const PAD: usize = NO_ANTECEDENT;

    fn ids(clusters: &MentionClusters) -> Vec<Vec<usize>> {
        clusters
            .iter()
            .map(|c| c.iter().map(|m| m.start).collect())
            .collect()
    }

    #[test]
    fn test_four_token_scenario() {
        let mentions = MentionIndexer::new().head_mentions(4);
        let idx = array![[PAD, PAD, PAD], [0, PAD, PAD], [0, 1, PAD], [0, 1, 2]];
        let scores = array![
            [1.0f32, 0.0, 0.0, 0.0],
            [1.0, 0.2, 0.0, 0.0],
            [0.0, 2.0, 0.5, 0.0],
            [1.0, 0.1, 0.3, 0.2],
        ];
        let clusters = ClusterAssembler::new()
            .decode(&mentions, scores.view(), idx.view())
            .unwrap();
        assert_eq!(ids(&clusters), vec![vec![0, 2]]);
    }

    #[test]
    fn test_chain_joins_existing_cluster() {
        let mentions = MentionIndexer::new().head_mentions(3);
        let idx = array![[PAD], [0], [1]];
        let scores = array![[0.0f32, 0.0], [0.0, 1.0], [0.0, 1.0]];
        let clusters = ClusterAssembler::new()
            .decode(&mentions, scores.view(), idx.view())
            .unwrap();
        assert_eq!(ids(&clusters), vec![vec![0, 1, 2]]);
    }

    #[test]
    fn test_tie_prefers_lowest_column() {
        let idx = array![[PAD, PAD], [0, PAD], [0, 1]];
        let scores = array![[0.0f32, 0.0, 0.0], [0.5, 0.5, 0.0], [0.1, 0.7, 0.7]];
        let chosen = ClusterAssembler::new()
            .antecedents(scores.view(), idx.view())
            .unwrap();
        assert_eq!(chosen, vec![None, None, Some(0)]);
    }

    #[test]
    fn test_padding_columns_never_win() {
        let idx = array![[PAD, PAD], [0, PAD]];
        let scores = array![[0.0f32, 9.0, 9.0], [0.0, -1.0, 9.0]];
        let chosen = ClusterAssembler::new()
            .antecedents(scores.view(), idx.view())
            .unwrap();
        assert_eq!(chosen, vec![None, None]);
    }

    #[test]
    fn test_nan_never_wins() {
        let idx = array![[PAD], [0]];
        let scores = array![[0.0f32, 0.0], [f32::NAN, 0.5]];
        let chosen = ClusterAssembler::new()
            .antecedents(scores.view(), idx.view())
            .unwrap();
        assert_eq!(chosen, vec![None, Some(0)]);
    }

    #[test]
    fn test_forward_antecedent_is_handled() {
        // Mention 0 points forward at mention 2; mention 2 then starts "fresh"
        let mentions = MentionIndexer::new().head_mentions(3);
        let idx = array![[2], [PAD], [PAD]];
        let scores = array![[0.0f32, 1.0], [0.0, 0.0], [0.0, 0.0]];
        let clusters = ClusterAssembler::new()
            .decode(&mentions, scores.view(), idx.view())
            .unwrap();
        assert_eq!(ids(&clusters), vec![vec![2, 0]]);
    }

    #[test]
    fn test_forward_antecedents_merge_without_duplicates() {
        // 0 -> 2 (forward), 1 -> 3 (forward), 2 -> 1 merges both clusters
        let mentions = MentionIndexer::new().head_mentions(4);
        let idx = array![[2], [3], [1], [PAD]];
        let scores = array![[0.0f32, 1.0], [0.0, 1.0], [0.0, 1.0], [0.0, 0.0]];
        let clusters = ClusterAssembler::new()
            .decode(&mentions, scores.view(), idx.view())
            .unwrap();
        assert_eq!(clusters.len(), 1);
        let seen: HashSet<Mention> = clusters[0].iter().copied().collect();
        assert_eq!(seen.len(), 4);
        assert_eq!(clusters[0].len(), 4);
    }

    #[test]
    fn test_self_antecedent_is_placeholder() {
        let idx = array![[0]];
        let scores = array![[0.0f32, 1.0]];
        let chosen = ClusterAssembler::new()
            .antecedents(scores.view(), idx.view())
            .unwrap();
        assert_eq!(chosen, vec![None]);
    }

    #[test]
    fn test_all_singletons_dropped() {
        let mentions = MentionIndexer::new().head_mentions(3);
        let idx = Array2::from_elem((3, 2), PAD);
        let scores = Array2::<f32>::zeros((3, 3));
        let clusters = ClusterAssembler::new()
            .decode(&mentions, scores.view(), idx.view())
            .unwrap();
        assert!(clusters.is_empty());
    }

    #[test]
    fn test_row_count_mismatch() {
        let mentions = MentionIndexer::new().head_mentions(2);
        let idx = array![[PAD]];
        let scores = array![[0.0f32, 0.0]];
        assert!(ClusterAssembler::new()
            .decode(&mentions, scores.view(), idx.view())
            .is_err());
    }

    #[test]
    fn test_decode_is_deterministic() {
        let mentions = MentionIndexer::new().head_mentions(4);
        let idx = array![[PAD, PAD], [0, PAD], [0, 1], [1, 2]];
        let scores = array![[0.0f32, 0.0, 0.0], [0.3, 0.3, 0.0], [0.3, 0.3, 0.3], [0.0, 0.4, 0.4]];
        let assembler = ClusterAssembler::new();
        let a = assembler.decode(&mentions, scores.view(), idx.view()).unwrap();
        let b = assembler.decode(&mentions, scores.view(), idx.view()).unwrap();
        assert_eq!(a, b);
    }
}
