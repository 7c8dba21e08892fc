//! Coreference evaluation.
//!
//! # Overview
//!
//! - [`coref_metrics`]: MUC, B³ and CEAFe, accumulated per corpus by an [`Evaluator`]
//! - [`assignment`]: the optimal cluster alignment CEAF is defined over
//!
//! # Example
//!
//! ```rust
//! use coref::eval::{CorefEvaluation, Metric};
//! use coref_core::{Cluster, Mention};
//!
//! let gold = vec![Cluster::new(vec![Mention::token(0), Mention::token(2)])];
//! let pred = vec![Cluster::new(vec![Mention::token(0), Mention::token(3)])];
//!
//! let eval = CorefEvaluation::compute(&pred, &gold);
//! assert!(eval.get(Metric::Muc).f1 < 1.0);
//! println!("{}", eval.summary_line());
//! ```

pub mod assignment;
pub mod coref_metrics;

pub use assignment::{Assignment, AssignmentSolver};
pub use coref_metrics::{
    b_cubed_score, ceaf_e_score, conll_f1, muc_score, phi4, ClusterInfo, CorefEvaluation,
    CorefScores, Evaluator, Metric, MetricCounts,
};
