//! Optimal one-to-one assignment on rectangular weight matrices.
//!
//! Used by CEAF to align predicted clusters with gold clusters. Greedy matching
//! understates CEAF, so this solves the assignment exactly with the
//! Kuhn-Munkres (Hungarian) method with row/column potentials, `O(n² m)` for
//! an `n × m` matrix with `n ≤ m`.
//!
//! # Example
//!
//! ```rust
//! use coref::eval::assignment::AssignmentSolver;
//! use ndarray::array;
//!
//! let weights = array![[1.0, 0.9], [0.9, 0.0]];
//! let best = AssignmentSolver::new().maximize(weights.view());
//!
//! // Greedy would take the 1.0 and be left with 0.0
//! assert!((best.total - 1.8).abs() < 1e-9);
//! assert_eq!(best.pairs, vec![(0, 1), (1, 0)]);
//! ```

use ndarray::{Array2, ArrayView2};

/// A matching between rows and columns.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Assignment {
    /// Matched `(row, column)` pairs, sorted by row.
    pub pairs: Vec<(usize, usize)>,
    /// Sum of the matched weights.
    pub total: f64,
}

/// Exact maximum-weight assignment solver.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssignmentSolver;

impl AssignmentSolver {
    /// Create a solver.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Maximum total weight matching of `min(rows, cols)` pairs.
    ///
    /// Non-finite weights are treated as `0.0`.
    #[must_use]
    pub fn maximize(&self, weights: ArrayView2<f64>) -> Assignment {
        let (rows, cols) = weights.dim();
        if rows == 0 || cols == 0 {
            return Assignment::default();
        }

        let sanitized = weights.mapv(|w| if w.is_finite() { w } else { 0.0 });
        if sanitized.len() != weights.iter().filter(|w| w.is_finite()).count() {
            log::warn!("assignment weights contained non-finite values; treated as 0");
        }

        // Solve with rows <= cols; transpose otherwise.
        let transposed = rows > cols;
        let cost: Array2<f64> = if transposed {
            sanitized.t().mapv(|w| -w)
        } else {
            sanitized.mapv(|w| -w)
        };

        let mut pairs: Vec<(usize, usize)> = minimize(&cost)
            .into_iter()
            .map(|(r, c)| if transposed { (c, r) } else { (r, c) })
            .collect();
        pairs.sort_unstable();

        let total: f64 = pairs.iter().map(|&(r, c)| sanitized[[r, c]]).sum();
        Assignment { pairs, total }
    }
}

/// Minimum cost assignment for `n <= m`; returns one `(row, col)` per row.
fn minimize(cost: &Array2<f64>) -> Vec<(usize, usize)> {
    let (n, m) = cost.dim();
    debug_assert!(n <= m);

    // 1-indexed potentials; column 0 is a virtual start column.
    let mut u = vec![0.0f64; n + 1];
    let mut v = vec![0.0f64; m + 1];
    let mut row_of = vec![0usize; m + 1];
    let mut way = vec![0usize; m + 1];

    for i in 1..=n {
        row_of[0] = i;
        let mut j0 = 0;
        let mut min_v = vec![f64::INFINITY; m + 1];
        let mut used = vec![false; m + 1];

        loop {
            used[j0] = true;
            let i0 = row_of[j0];
            let mut delta = f64::INFINITY;
            let mut j1 = 0;

            for j in 1..=m {
                if used[j] {
                    continue;
                }
                let reduced = cost[[i0 - 1, j - 1]] - u[i0] - v[j];
                if reduced < min_v[j] {
                    min_v[j] = reduced;
                    way[j] = j0;
                }
                if min_v[j] < delta {
                    delta = min_v[j];
                    j1 = j;
                }
            }

            for j in 0..=m {
                if used[j] {
                    u[row_of[j]] += delta;
                    v[j] -= delta;
                } else {
                    min_v[j] -= delta;
                }
            }

            j0 = j1;
            if row_of[j0] == 0 {
                break;
            }
        }

        // augment along the alternating path
        loop {
            let j1 = way[j0];
            row_of[j0] = row_of[j1];
            j0 = j1;
            if j0 == 0 {
                break;
            }
        }
    }

    (1..=m)
        .filter(|&j| row_of[j] != 0)
        .map(|j| (row_of[j] - 1, j - 1))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    /// Exhaustive maximum over all injective row -> column maps.
    fn brute_force(weights: &Array2<f64>) -> f64 {
        fn go(w: &Array2<f64>, row: usize, used: &mut Vec<bool>) -> f64 {
            if row == w.nrows() {
                return 0.0;
            }
            let mut best = f64::NEG_INFINITY;
            for c in 0..w.ncols() {
                if !used[c] {
                    used[c] = true;
                    best = best.max(w[[row, c]] + go(w, row + 1, used));
                    used[c] = false;
                }
            }
            best
        }
        let w = if weights.nrows() > weights.ncols() {
            weights.t().to_owned()
        } else {
            weights.clone()
        };
        go(&w, 0, &mut vec![false; w.ncols()])
    }

    #[test]
    fn test_unique_perfect_matching_3x3() {
        let weights = array![[0.9, 0.8, 0.1], [0.85, 0.1, 0.0], [0.2, 0.7, 0.6]];
        let best = AssignmentSolver::new().maximize(weights.view());
        // 0.8 + 0.85 + 0.6 beats the greedy 0.9 + 0.7 + 0.0
        assert_eq!(best.pairs, vec![(0, 1), (1, 0), (2, 2)]);
        assert!((best.total - 2.25).abs() < 1e-9);
        assert!((best.total - brute_force(&weights)).abs() < 1e-9);
    }

    #[test]
    fn test_more_columns_than_rows() {
        let weights = array![[0.1, 0.5, 0.4], [0.6, 0.5, 0.0]];
        let best = AssignmentSolver::new().maximize(weights.view());
        assert_eq!(best.pairs.len(), 2);
        assert!((best.total - brute_force(&weights)).abs() < 1e-9);
        assert!((best.total - 1.1).abs() < 1e-9);
    }

    #[test]
    fn test_more_rows_than_columns() {
        let weights = array![[0.1, 0.5], [0.6, 0.4], [0.9, 0.0]];
        let best = AssignmentSolver::new().maximize(weights.view());
        assert_eq!(best.pairs.len(), 2);
        assert_eq!(best.pairs, vec![(0, 1), (2, 0)]);
        assert!((best.total - 1.4).abs() < 1e-9);
    }

    #[test]
    fn test_each_row_and_column_used_once() {
        let weights = array![
            [0.3, 0.3, 0.3, 0.3],
            [0.3, 0.3, 0.3, 0.3],
            [0.3, 0.3, 0.3, 0.3],
        ];
        let best = AssignmentSolver::new().maximize(weights.view());
        let mut cols: Vec<usize> = best.pairs.iter().map(|&(_, c)| c).collect();
        cols.sort_unstable();
        cols.dedup();
        assert_eq!(cols.len(), 3);
    }

    #[test]
    fn test_empty() {
        let weights = Array2::<f64>::zeros((0, 4));
        let best = AssignmentSolver::new().maximize(weights.view());
        assert!(best.pairs.is_empty());
        assert_eq!(best.total, 0.0);
    }

    #[test]
    fn test_non_finite_weights_ignored() {
        let weights = array![[f64::NAN, 1.0], [1.0, f64::INFINITY]];
        let best = AssignmentSolver::new().maximize(weights.view());
        assert!((best.total - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_matches_brute_force_on_fixed_grids() {
        let grids = [
            array![[4.0, 1.0, 3.0], [2.0, 0.0, 5.0], [3.0, 2.0, 2.0]],
            array![[1.0, 2.0, 3.0, 4.0], [2.0, 4.0, 6.0, 8.0], [3.0, 6.0, 9.0, 12.0]],
            array![[0.0, 0.0], [0.0, 0.0]],
        ];
        for weights in grids {
            let best = AssignmentSolver::new().maximize(weights.view());
            assert!((best.total - brute_force(&weights)).abs() < 1e-9, "{:?}", weights);
        }
    }
}
