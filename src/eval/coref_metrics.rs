//! Coreference evaluation metrics.
//!
//! # Metric Summary
//!
//! | Metric | Focus | Key Property |
//! |--------|-------|--------------|
//! | **MUC** | Links | Ignores singletons; counts minimum links |
//! | **B³** | Mentions | Per-mention P/R; credits singletons |
//! | **CEAFe** | Entities | Optimal one-to-one cluster alignment (φ4) |
//! | **Average** | Composite | Macro average of MUC, B³, CEAFe |
//!
//! # Two Different Averages
//!
//! Within a metric, scores are **micro-averaged** over a corpus: an
//! [`Evaluator`] sums numerators and denominators over every document and
//! divides once at the end. Averaging per-document ratios instead gives
//! different numbers when document sizes are skewed.
//!
//! Across metrics, the reported score is the **macro average** of the three
//! corpus-level values ([`CorefEvaluation::average`]).
//!
//! # References
//!
//! - MUC: Vilain et al., 1995
//! - B³: Bagga & Baldwin, 1998
//! - CEAF: Luo, 2005
//!
//! # Example
//!
//! ```rust
//! use coref::eval::coref_metrics::{muc_score, Evaluator, Metric};
//! use coref_core::{Cluster, Mention};
//!
//! let gold = vec![Cluster::new(vec![Mention::token(0), Mention::token(4)])];
//! let pred = gold.clone();
//!
//! let (p, r, f1) = muc_score(&pred, &gold);
//! assert!((f1 - 1.0).abs() < 0.001); // Perfect match
//!
//! let mut evaluator = Evaluator::new(Metric::CeafE);
//! evaluator.update(&pred, &gold);
//! assert!((evaluator.f1() - 1.0).abs() < 0.001);
//! ```

use super::assignment::AssignmentSolver;
use coref_core::{Cluster, Mention};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::ops::{Add, AddAssign};

// =============================================================================
// Result Types
// =============================================================================

/// Coreference evaluation scores (precision, recall, F1).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CorefScores {
    /// Precision
    pub precision: f64,
    /// Recall
    pub recall: f64,
    /// F1 score
    pub f1: f64,
}

impl CorefScores {
    /// Create new scores; F1 is the harmonic mean of P and R.
    #[must_use]
    pub fn new(precision: f64, recall: f64) -> Self {
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };
        Self {
            precision,
            recall,
            f1,
        }
    }

    /// Create from tuple.
    #[must_use]
    pub fn from_tuple((p, r, f1): (f64, f64, f64)) -> Self {
        Self {
            precision: p,
            recall: r,
            f1,
        }
    }

    /// As a `(precision, recall, f1)` tuple.
    #[must_use]
    pub fn as_tuple(&self) -> (f64, f64, f64) {
        (self.precision, self.recall, self.f1)
    }

    /// Macro average: each field averaged independently.
    ///
    /// The averaged F1 is the mean of the F1 values, not the harmonic mean of
    /// the averaged P and R.
    #[must_use]
    pub fn mean(scores: &[CorefScores]) -> Self {
        if scores.is_empty() {
            return Self::default();
        }
        let n = scores.len() as f64;
        Self {
            precision: scores.iter().map(|s| s.precision).sum::<f64>() / n,
            recall: scores.iter().map(|s| s.recall).sum::<f64>() / n,
            f1: scores.iter().map(|s| s.f1).sum::<f64>() / n,
        }
    }

    /// Flat `{name}_p`, `{name}_r`, `{name}_f` entries for progress tables.
    #[must_use]
    pub fn to_metrics(&self, name: &str) -> Vec<(String, f64)> {
        vec![
            (format!("{}_f", name), self.f1),
            (format!("{}_p", name), self.precision),
            (format!("{}_r", name), self.recall),
        ]
    }
}

/// Running precision/recall numerators and denominators.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricCounts {
    /// Precision numerator
    pub precision_numerator: f64,
    /// Precision denominator
    pub precision_denominator: f64,
    /// Recall numerator
    pub recall_numerator: f64,
    /// Recall denominator
    pub recall_denominator: f64,
}

impl MetricCounts {
    /// Precision, `0.0` when the denominator is zero.
    #[must_use]
    pub fn precision(&self) -> f64 {
        ratio(self.precision_numerator, self.precision_denominator)
    }

    /// Recall, `0.0` when the denominator is zero.
    #[must_use]
    pub fn recall(&self) -> f64 {
        ratio(self.recall_numerator, self.recall_denominator)
    }

    /// Scores from the current counts.
    #[must_use]
    pub fn scores(&self) -> CorefScores {
        CorefScores::new(self.precision(), self.recall())
    }
}

impl Add for MetricCounts {
    type Output = Self;

    fn add(mut self, rhs: Self) -> Self {
        self += rhs;
        self
    }
}

impl AddAssign for MetricCounts {
    fn add_assign(&mut self, rhs: Self) {
        self.precision_numerator += rhs.precision_numerator;
        self.precision_denominator += rhs.precision_denominator;
        self.recall_numerator += rhs.recall_numerator;
        self.recall_denominator += rhs.recall_denominator;
    }
}

fn ratio(num: f64, den: f64) -> f64 {
    if den == 0.0 {
        0.0
    } else {
        num / den
    }
}

// =============================================================================
// Cluster Info
// =============================================================================

/// Predicted and gold partitions of one document with mention lookups.
///
/// Empty clusters are dropped on construction.
#[derive(Debug, Clone)]
pub struct ClusterInfo<'a> {
    /// Predicted clusters.
    pub predicted: Vec<&'a Cluster>,
    /// Gold clusters.
    pub gold: Vec<&'a Cluster>,
    /// Mention -> index into `predicted`.
    pub mention_to_predicted: HashMap<Mention, usize>,
    /// Mention -> index into `gold`.
    pub mention_to_gold: HashMap<Mention, usize>,
}

impl<'a> ClusterInfo<'a> {
    /// Index both partitions.
    #[must_use]
    pub fn new(predicted: &'a [Cluster], gold: &'a [Cluster]) -> Self {
        let predicted: Vec<&Cluster> = predicted.iter().filter(|c| !c.is_empty()).collect();
        let gold: Vec<&Cluster> = gold.iter().filter(|c| !c.is_empty()).collect();
        Self {
            mention_to_predicted: build_mention_index(&predicted),
            mention_to_gold: build_mention_index(&gold),
            predicted,
            gold,
        }
    }
}

/// Build mention -> cluster index.
fn build_mention_index(clusters: &[&Cluster]) -> HashMap<Mention, usize> {
    let mut index = HashMap::new();
    for (cluster_idx, cluster) in clusters.iter().enumerate() {
        for mention in cluster.iter() {
            index.insert(*mention, cluster_idx);
        }
    }
    index
}

// =============================================================================
// Metrics
// =============================================================================

/// A cluster-similarity metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// B-cubed (mention-based)
    BCubed,
    /// MUC (link-based)
    Muc,
    /// CEAF entity-based, φ4 similarity
    CeafE,
}

impl Metric {
    /// The three metrics in reporting order.
    pub const ALL: [Metric; 3] = [Metric::BCubed, Metric::Muc, Metric::CeafE];

    /// Short display name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Metric::BCubed => "B³",
            Metric::Muc => "MUC",
            Metric::CeafE => "CEAFe",
        }
    }

    /// Per-document counts.
    #[must_use]
    pub fn counts(&self, info: &ClusterInfo<'_>) -> MetricCounts {
        match self {
            Metric::BCubed => {
                let (pn, pd) = b_cubed(&info.predicted, &info.mention_to_gold);
                let (rn, rd) = b_cubed(&info.gold, &info.mention_to_predicted);
                MetricCounts {
                    precision_numerator: pn,
                    precision_denominator: pd,
                    recall_numerator: rn,
                    recall_denominator: rd,
                }
            }
            Metric::Muc => {
                let (pn, pd) = muc(&info.predicted, &info.mention_to_gold);
                let (rn, rd) = muc(&info.gold, &info.mention_to_predicted);
                MetricCounts {
                    precision_numerator: pn,
                    precision_denominator: pd,
                    recall_numerator: rn,
                    recall_denominator: rd,
                }
            }
            Metric::CeafE => ceaf_e(&info.predicted, &info.gold),
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// B³ half-score for `clusters` against the other side's mention index.
///
/// Each mention of a cluster `c` contributes `|c ∩ other(m)| / |c|`; the
/// denominator is the number of mentions. Summed per cluster this is
/// `Σ_other |c ∩ other|² / |c|`.
fn b_cubed(clusters: &[&Cluster], mention_to_other: &HashMap<Mention, usize>) -> (f64, f64) {
    let (mut num, mut den) = (0.0, 0.0);
    for cluster in clusters {
        let mut other_counts: HashMap<usize, usize> = HashMap::new();
        for mention in cluster.iter() {
            if let Some(&other) = mention_to_other.get(mention) {
                *other_counts.entry(other).or_default() += 1;
            }
        }
        let correct: usize = other_counts.values().map(|&c| c * c).sum();
        num += correct as f64 / cluster.len() as f64;
        den += cluster.len() as f64;
    }
    (num, den)
}

/// MUC half-score for `clusters` against the other side's mention index.
///
/// A cluster of size `p` split into `r` partitions by the other side has
/// `p - r` correct links out of `p - 1`. Mentions missing from the other side
/// form their own partitions.
fn muc(clusters: &[&Cluster], mention_to_other: &HashMap<Mention, usize>) -> (f64, f64) {
    let (mut num, mut den) = (0.0, 0.0);
    for cluster in clusters {
        let mut linked: HashSet<usize> = HashSet::new();
        let mut unaligned = 0;
        for mention in cluster.iter() {
            match mention_to_other.get(mention) {
                Some(&other) => {
                    linked.insert(other);
                }
                None => unaligned += 1,
            }
        }
        let partitions = linked.len() + unaligned;
        num += (cluster.len() - partitions) as f64;
        den += (cluster.len() - 1) as f64;
    }
    (num, den)
}

/// CEAF φ4 similarity: `2 |p ∩ g| / (|p| + |g|)`.
#[must_use]
pub fn phi4(predicted: &Cluster, gold: &Cluster) -> f64 {
    let total = predicted.len() + gold.len();
    if total == 0 {
        return 0.0;
    }
    2.0 * predicted.overlap(gold) as f64 / total as f64
}

/// CEAFe counts: optimal φ4 alignment over cluster counts.
fn ceaf_e(predicted: &[&Cluster], gold: &[&Cluster]) -> MetricCounts {
    let mut similarity = Array2::<f64>::zeros((predicted.len(), gold.len()));
    for (i, p) in predicted.iter().enumerate() {
        for (j, g) in gold.iter().enumerate() {
            similarity[[i, j]] = phi4(p, g);
        }
    }
    let matched = AssignmentSolver::new().maximize(similarity.view()).total;
    MetricCounts {
        precision_numerator: matched,
        precision_denominator: predicted.len() as f64,
        recall_numerator: matched,
        recall_denominator: gold.len() as f64,
    }
}

// =============================================================================
// Evaluator (corpus-level micro average)
// =============================================================================

/// Accumulates one metric over a corpus.
///
/// Totals are summed across documents and divided only when scores are read.
#[derive(Debug, Clone)]
pub struct Evaluator {
    metric: Metric,
    counts: MetricCounts,
    documents: usize,
}

impl Evaluator {
    /// Create an evaluator for a metric.
    #[must_use]
    pub fn new(metric: Metric) -> Self {
        Self {
            metric,
            counts: MetricCounts::default(),
            documents: 0,
        }
    }

    /// The metric being accumulated.
    #[must_use]
    pub fn metric(&self) -> Metric {
        self.metric
    }

    /// Add one document.
    pub fn update(&mut self, predicted: &[Cluster], gold: &[Cluster]) {
        let info = ClusterInfo::new(predicted, gold);
        self.update_info(&info);
    }

    /// Add one document from pre-built cluster info.
    pub fn update_info(&mut self, info: &ClusterInfo<'_>) {
        self.counts += self.metric.counts(info);
        self.documents += 1;
    }

    /// Add many `(predicted, gold)` documents.
    ///
    /// With the `parallel` feature, documents are scored concurrently; counts
    /// are still accumulated in document order.
    pub fn update_corpus<P, G>(&mut self, documents: &[(P, G)])
    where
        P: AsRef<[Cluster]> + Sync,
        G: AsRef<[Cluster]> + Sync,
    {
        let metric = self.metric;
        let score = |(p, g): &(P, G)| metric.counts(&ClusterInfo::new(p.as_ref(), g.as_ref()));

        #[cfg(feature = "parallel")]
        let per_doc: Vec<MetricCounts> = {
            use rayon::prelude::*;
            documents.par_iter().map(score).collect()
        };
        #[cfg(not(feature = "parallel"))]
        let per_doc: Vec<MetricCounts> = documents.iter().map(score).collect();

        for counts in per_doc {
            self.counts += counts;
        }
        self.documents += documents.len();
    }

    /// Accumulated counts.
    #[must_use]
    pub fn counts(&self) -> MetricCounts {
        self.counts
    }

    /// Number of documents seen.
    #[must_use]
    pub fn documents(&self) -> usize {
        self.documents
    }

    /// Corpus precision (0 if nothing predicted).
    #[must_use]
    pub fn precision(&self) -> f64 {
        self.counts.precision()
    }

    /// Corpus recall (0 if nothing in gold).
    #[must_use]
    pub fn recall(&self) -> f64 {
        self.counts.recall()
    }

    /// Corpus F1.
    #[must_use]
    pub fn f1(&self) -> f64 {
        self.scores().f1
    }

    /// Corpus scores.
    #[must_use]
    pub fn scores(&self) -> CorefScores {
        self.counts.scores()
    }
}

// =============================================================================
// Combined evaluation
// =============================================================================

/// Corpus-level scores for every metric plus their macro average.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CorefEvaluation {
    /// B-cubed metric
    pub b_cubed: CorefScores,
    /// MUC metric
    pub muc: CorefScores,
    /// CEAF entity-based (phi4)
    pub ceaf_e: CorefScores,
    /// Macro average of the three
    pub average: CorefScores,
}

impl CorefEvaluation {
    /// Evaluate a single document.
    #[must_use]
    pub fn compute(predicted: &[Cluster], gold: &[Cluster]) -> Self {
        Self::compute_corpus(&[(predicted, gold)])
    }

    /// Micro-average each metric over the corpus, then macro-average across metrics.
    #[must_use]
    pub fn compute_corpus<P, G>(documents: &[(P, G)]) -> Self
    where
        P: AsRef<[Cluster]> + Sync,
        G: AsRef<[Cluster]> + Sync,
    {
        let evaluators: Vec<Evaluator> = Metric::ALL
            .iter()
            .map(|&metric| {
                let mut evaluator = Evaluator::new(metric);
                evaluator.update_corpus(documents);
                evaluator
            })
            .collect();
        Self::from_evaluators(&evaluators)
    }

    /// Combine finished evaluators. Metrics not present stay at zero.
    #[must_use]
    pub fn from_evaluators(evaluators: &[Evaluator]) -> Self {
        let mut out = Self::default();
        for evaluator in evaluators {
            let scores = evaluator.scores();
            match evaluator.metric() {
                Metric::BCubed => out.b_cubed = scores,
                Metric::Muc => out.muc = scores,
                Metric::CeafE => out.ceaf_e = scores,
            }
        }
        out.average = CorefScores::mean(&[out.b_cubed, out.muc, out.ceaf_e]);
        out
    }

    /// Scores for one metric.
    #[must_use]
    pub fn get(&self, metric: Metric) -> CorefScores {
        match metric {
            Metric::BCubed => self.b_cubed,
            Metric::Muc => self.muc,
            Metric::CeafE => self.ceaf_e,
        }
    }

    /// One-line summary for comparison tables.
    #[must_use]
    pub fn summary_line(&self) -> String {
        format!(
            "B³={:.1}% MUC={:.1}% CEAFe={:.1}% Avg={:.1}%",
            self.b_cubed.f1 * 100.0,
            self.muc.f1 * 100.0,
            self.ceaf_e.f1 * 100.0,
            self.average.f1 * 100.0,
        )
    }
}

impl std::fmt::Display for CorefEvaluation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Coreference Evaluation Results:")?;
        for (name, s) in [
            ("B³", self.b_cubed),
            ("MUC", self.muc),
            ("CEAFe", self.ceaf_e),
            ("Average", self.average),
        ] {
            writeln!(
                f,
                "  {:<8} P={:.1}%  R={:.1}%  F1={:.1}%",
                format!("{}:", name),
                s.precision * 100.0,
                s.recall * 100.0,
                s.f1 * 100.0
            )?;
        }
        Ok(())
    }
}

// =============================================================================
// Single-document helpers
// =============================================================================

fn single(metric: Metric, predicted: &[Cluster], gold: &[Cluster]) -> (f64, f64, f64) {
    let mut evaluator = Evaluator::new(metric);
    evaluator.update(predicted, gold);
    evaluator.scores().as_tuple()
}

/// MUC (precision, recall, f1) for one document.
#[must_use]
pub fn muc_score(predicted: &[Cluster], gold: &[Cluster]) -> (f64, f64, f64) {
    single(Metric::Muc, predicted, gold)
}

/// B³ (precision, recall, f1) for one document.
#[must_use]
pub fn b_cubed_score(predicted: &[Cluster], gold: &[Cluster]) -> (f64, f64, f64) {
    single(Metric::BCubed, predicted, gold)
}

/// CEAFe (precision, recall, f1) for one document.
#[must_use]
pub fn ceaf_e_score(predicted: &[Cluster], gold: &[Cluster]) -> (f64, f64, f64) {
    single(Metric::CeafE, predicted, gold)
}

/// Average F1 of MUC, B³ and CEAFe for one document (the CoNLL score).
#[must_use]
pub fn conll_f1(predicted: &[Cluster], gold: &[Cluster]) -> f64 {
    CorefEvaluation::compute(predicted, gold).average.f1
}

// =============================================================================
// Tests
// =============================================================================
