//! Head-to-span expansion component.

use super::{
    check_batch, evaluate_examples, single_example, validate_examples, Losses, SpanScorer,
    UpdateOptions,
};
use crate::config::SpanPredictorConfig;
use crate::eval::{CorefEvaluation, CorefScores};
use crate::span::{SpanBoundaryResolver, SpanLoss};
use crate::{Error, Result};
use coref_core::{Cluster, Doc, Example, Mention, MentionClusters};
use ndarray::ArrayView3;

const COMPONENT: &str = "SpanPredictor";

/// Expands clusters of head tokens into clusters of full spans.
///
/// Reads clusters under `input_prefix`, writes clusters of the same shape
/// under `output_prefix`.
pub struct SpanPredictor {
    config: SpanPredictorConfig,
    scorer: Box<dyn SpanScorer>,
}

impl std::fmt::Debug for SpanPredictor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpanPredictor")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn flatten(clusters: &[Cluster]) -> Vec<Mention> {
    clusters.iter().flat_map(|c| c.iter().copied()).collect()
}

/// Scores must be `[heads, doc.len(), 2]`.
fn check_scores(doc: &Doc, heads: &[Mention], scores: ArrayView3<f32>) -> Result<()> {
    let (rows, tokens, _) = scores.dim();
    if rows != heads.len() || tokens != doc.len() {
        return Err(Error::contract(
            COMPONENT,
            format!(
                "scorer returned shape {:?} for {} head mentions in a doc of {} tokens",
                scores.shape(),
                heads.len(),
                doc.len()
            ),
        ));
    }
    Ok(())
}

impl SpanPredictor {
    /// Create a component around a scorer.
    pub fn new(config: SpanPredictorConfig, scorer: Box<dyn SpanScorer>) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, scorer })
    }

    /// Component name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Configuration.
    #[must_use]
    pub fn config(&self) -> &SpanPredictorConfig {
        &self.config
    }

    /// Expand each doc's head clusters without modifying the doc.
    pub fn predict(&self, docs: &[Doc]) -> Result<Vec<MentionClusters>> {
        let resolver = SpanBoundaryResolver::new();
        docs.iter()
            .map(|doc| {
                let heads = doc.spans.clusters(&self.config.input_prefix);
                let flat = flatten(&heads);
                let scores = self.scorer.predict(doc, &flat)?;
                if scores.is_empty() {
                    return Ok(MentionClusters::new());
                }
                check_scores(doc, &flat, scores.view())?;
                let spans = resolver.predict(scores.view())?;
                resolver.expand_clusters(&heads, &spans, self.config.invalid_spans)
            })
            .collect()
    }

    /// Store expanded clusters under `<output_prefix>_<i>`, replacing any
    /// clusters already there.
    ///
    /// Every span must lie inside its doc; a span outside any doc fails the
    /// call before anything is written. Inverted spans are kept, since
    /// [`InvalidSpanPolicy::PassThrough`](crate::span::InvalidSpanPolicy) emits them.
    pub fn set_annotations(&self, docs: &mut [Doc], clusters: &[MentionClusters]) -> Result<()> {
        check_batch(docs.len(), clusters.len(), COMPONENT)?;
        for (doc, doc_clusters) in docs.iter().zip(clusters) {
            for mention in doc_clusters.iter().flat_map(|c| c.iter()) {
                if mention.start >= doc.len() || mention.end > doc.len() {
                    return Err(Error::contract(
                        COMPONENT,
                        format!("span {} outside document of {} tokens", mention, doc.len()),
                    ));
                }
            }
        }
        for (doc, doc_clusters) in docs.iter_mut().zip(clusters) {
            doc.spans
                .replace_clusters(&self.config.output_prefix, doc_clusters);
        }
        Ok(())
    }

    /// One training pass, scoring the gold head clusters of each reference doc.
    pub fn update(
        &mut self,
        examples: &[Example],
        opts: UpdateOptions,
        losses: &mut Losses,
    ) -> Result<()> {
        losses.entry(self.config.name.clone()).or_insert(0.0);
        validate_examples(examples, "SpanPredictor.update")?;
        if examples.iter().all(|eg| eg.reference.is_empty()) {
            log::warn!("{}: no tokens in any of {} docs, skipping update", self.name(), examples.len());
            return Ok(());
        }
        self.scorer.set_dropout(opts.drop);

        let mut total = 0.0f32;
        for eg in examples {
            let heads = flatten(&eg.reference.spans.clusters(&self.config.input_prefix));
            let scores = self.scorer.begin_update(&eg.reference, &heads)?;
            check_scores(&eg.reference, &heads, scores.view())?;
            let loss = self.get_loss(std::slice::from_ref(eg), scores.view())?;
            total += loss.monitoring_loss;
            self.scorer.backprop(loss.gradient.view())?;
        }
        if opts.apply_gradients {
            self.scorer.finish_update()?;
        }

        log::info!("{}: update over {} docs, loss {:.4}", self.name(), examples.len(), total);
        *losses.entry(self.config.name.clone()).or_insert(0.0) += total;
        Ok(())
    }

    /// Rehearsal is not implemented for span prediction.
    pub fn rehearse(
        &mut self,
        _examples: &[Example],
        _opts: UpdateOptions,
        _losses: &mut Losses,
    ) -> Result<()> {
        Err(Error::not_supported(COMPONENT, "rehearse"))
    }

    /// Labels are not used by this component.
    pub fn add_label(&mut self, _label: &str) -> Result<usize> {
        Err(Error::not_supported(COMPONENT, "add_label"))
    }

    /// Loss and gradient for one example.
    ///
    /// Gold spans are the reference clusters under `output_prefix`, in
    /// cluster order; there must be one per scored head.
    pub fn get_loss(&self, examples: &[Example], span_scores: ArrayView3<f32>) -> Result<SpanLoss> {
        let eg = single_example(examples, COMPONENT)?;
        let gold = flatten(&eg.reference.spans.clusters(&self.config.output_prefix));
        SpanBoundaryResolver::new().get_loss(span_scores, &gold)
    }

    /// Prepare the scorer from at most two sample examples.
    ///
    /// A predicted doc without head clusters gets a placeholder cluster of its
    /// first two tokens so the scorer can infer shapes.
    pub fn initialize(&mut self, examples: &mut [Example]) -> Result<()> {
        validate_examples(examples, "SpanPredictor.initialize")?;
        let n = examples.len().min(2);
        if n == 0 {
            return Err(Error::contract(
                COMPONENT,
                format!("{} needs at least one example to initialize", self.name()),
            ));
        }

        let prefix = &self.config.input_prefix;
        for eg in examples[..n].iter_mut() {
            let doc = &mut eg.predicted;
            if doc.spans.has_clusters(prefix) {
                continue;
            }
            if doc.len() <= 2 {
                return Err(Error::contract(
                    COMPONENT,
                    format!("coreference requires more than two tokens, got {}", doc.len()),
                ));
            }
            let placeholder = Cluster::new(vec![Mention::token(0), Mention::token(1)]);
            doc.spans.write_clusters(prefix, &[placeholder])?;
        }

        let inputs: Vec<Doc> = examples[..n].iter().map(|eg| eg.predicted.clone()).collect();
        let references: Vec<Doc> = examples[..n].iter().map(|eg| eg.reference.clone()).collect();
        self.scorer.initialize(&inputs, &references)
    }

    /// Per-metric scores and their macro average.
    #[must_use]
    pub fn evaluate(&self, examples: &[Example]) -> CorefEvaluation {
        evaluate_examples(examples, &self.config.output_prefix)
    }

    /// Macro average of B³, MUC and CEAFe.
    #[must_use]
    pub fn score(&self, examples: &[Example]) -> CorefScores {
        self.evaluate(examples).average
    }

    /// `coref_span_f`, `coref_span_p`, `coref_span_r`.
    #[must_use]
    pub fn score_metrics(&self, examples: &[Example]) -> Vec<(String, f64)> {
        self.score(examples).to_metrics("coref_span")
    }
}
