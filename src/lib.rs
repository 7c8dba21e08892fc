//! # coref
//!
//! Coreference resolution core for Rust.
//!
//! - **Training signal**: gold alignment and marginal antecedent loss
//! - **Decoding**: greedy left-to-right clustering of antecedent scores
//! - **Span expansion**: head tokens to full spans via start/end classification
//! - **Evaluation**: MUC, B³ and CEAFe with optimal cluster alignment
//!
//! The neural scorers are external. Components take their score matrices as
//! plain `ndarray` values, so any network (or a test double) can drive them.
//!
//! ## Components
//!
//! | Component | Module | Input | Output |
//! |-----------|--------|-------|--------|
//! | `MentionIndexer` | [`mentions`] | doc length | candidate mentions |
//! | `GoldAligner` | [`gold`] | gold clusters, candidates | `[M, 1+K]` bool |
//! | `MarginalLoss` | [`loss`] | scores, gold agreement | gradient, losses |
//! | `ClusterAssembler` | [`decode`] | scores, candidates | clusters |
//! | `SpanBoundaryResolver` | [`span`] | `[M, n, 2]` scores | spans |
//! | `Evaluator` | [`eval`] | predicted, gold clusters | P / R / F1 |
//!
//! ## Quick Start
//!
//! ```rust
//! use coref::{ClusterAssembler, MentionIndexer, NO_ANTECEDENT};
//! use ndarray::array;
//!
//! // 4 tokens; mention 2 prefers mention 0, everyone else starts a cluster
//! let mentions = MentionIndexer::new().head_mentions(4);
//! let pad = NO_ANTECEDENT;
//! let antecedents = array![[pad, pad, pad], [0, pad, pad], [0, 1, pad], [0, 1, 2]];
//! let scores = array![
//!     [1.0f32, 0.0, 0.0, 0.0],
//!     [1.0, 0.2, 0.0, 0.0],
//!     [0.0, 2.0, 0.5, 0.0],
//!     [1.0, 0.1, 0.3, 0.2],
//! ];
//!
//! let clusters = ClusterAssembler::new()
//!     .decode(&mentions, scores.view(), antecedents.view())
//!     .unwrap();
//! assert_eq!(clusters.len(), 1);
//! assert_eq!(clusters[0].len(), 2);
//! ```
//!
//! ## Evaluation
//!
//! ```rust
//! use coref::eval::CorefEvaluation;
//! use coref_core::{Cluster, Mention};
//!
//! let gold = vec![Cluster::new(vec![Mention::token(0), Mention::token(2)])];
//! let eval = CorefEvaluation::compute(&gold, &gold);
//! assert!((eval.average.f1 - 1.0).abs() < 0.001);
//! ```
//!
//! ## Feature Flags
//!
//! ```toml
//! [dependencies]
//! coref = "0.1"                                      # sequential evaluation
//! coref = { version = "0.1", features = ["parallel"] } # rayon across documents
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod decode;
mod error;
pub mod eval;
pub mod gold;
pub mod loss;
pub mod mentions;
pub mod pipeline;
pub mod scores;
pub mod span;

pub use config::{CorefConfig, SpanPredictorConfig};
pub use decode::ClusterAssembler;
pub use error::{Error, Result};
pub use eval::{AssignmentSolver, CorefEvaluation, CorefScores, Evaluator, Metric};
pub use gold::GoldAligner;
pub use loss::{LossOutput, MarginalLoss};
pub use mentions::MentionIndexer;
pub use pipeline::{
    AntecedentScorer, CorefResolver, Losses, SpanPredictor, SpanScorer, UpdateOptions,
};
pub use scores::{AntecedentScores, NO_ANTECEDENT};
pub use span::{InvalidSpanPolicy, SpanBoundaryResolver, SpanLoss};

pub use coref_core::{Cluster, Doc, Example, Mention, MentionClusters, MentionId, SpanGroups};
