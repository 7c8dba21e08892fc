//! Antecedent-based coreference component.

use super::{
    check_batch, evaluate_examples, single_example, validate_examples, AntecedentScorer, Losses,
    UpdateOptions,
};
use crate::config::CorefConfig;
use crate::decode::ClusterAssembler;
use crate::eval::{CorefEvaluation, CorefScores};
use crate::gold::GoldAligner;
use crate::loss::{LossOutput, MarginalLoss};
use crate::mentions::MentionIndexer;
use crate::scores::AntecedentScores;
use crate::{Error, Result};
use coref_core::{Doc, Example, MentionClusters};

const COMPONENT: &str = "CorefResolver";

/// Predicts coreference clusters of single-token mentions.
pub struct CorefResolver {
    config: CorefConfig,
    scorer: Box<dyn AntecedentScorer>,
    rehearsal: Option<Box<dyn AntecedentScorer>>,
}

impl std::fmt::Debug for CorefResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CorefResolver")
            .field("config", &self.config)
            .field("rehearsal", &self.rehearsal.is_some())
            .finish_non_exhaustive()
    }
}

impl CorefResolver {
    /// Create a component around a scorer.
    pub fn new(config: CorefConfig, scorer: Box<dyn AntecedentScorer>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            scorer,
            rehearsal: None,
        })
    }

    /// Set the frozen scorer that [`CorefResolver::rehearse`] pulls toward.
    #[must_use]
    pub fn with_rehearsal_scorer(mut self, scorer: Box<dyn AntecedentScorer>) -> Self {
        self.rehearsal = Some(scorer);
        self
    }

    /// Component name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Configuration.
    #[must_use]
    pub fn config(&self) -> &CorefConfig {
        &self.config
    }

    /// Valid for `n_mentions` candidates and no wider than `rough_k`.
    fn check_scores(&self, scores: &AntecedentScores, n_mentions: usize) -> Result<()> {
        scores.validate(n_mentions, COMPONENT)?;
        if scores.width() > self.config.rough_k {
            return Err(Error::contract(
                COMPONENT,
                format!(
                    "scorer kept {} candidate antecedents, rough_k is {}",
                    scores.width(),
                    self.config.rough_k
                ),
            ));
        }
        Ok(())
    }

    /// Decode clusters for each doc without modifying it.
    pub fn predict(&self, docs: &[Doc]) -> Result<Vec<MentionClusters>> {
        let assembler = ClusterAssembler::new();
        docs.iter()
            .map(|doc| {
                let scores = self.scorer.predict(doc)?;
                let mentions = MentionIndexer::new().head_mentions(doc.len());
                self.check_scores(&scores, mentions.len())?;
                assembler.decode(
                    &mentions,
                    scores.scores.view(),
                    scores.antecedent_idx.view(),
                )
            })
            .collect()
    }

    /// Store predicted clusters on their docs under `<span_cluster_prefix>_<i>`.
    ///
    /// Existing keys are never overwritten: a collision in any doc fails the
    /// call before anything is written.
    pub fn set_annotations(&self, docs: &mut [Doc], clusters: &[MentionClusters]) -> Result<()> {
        check_batch(docs.len(), clusters.len(), COMPONENT)?;
        let prefix = &self.config.span_cluster_prefix;

        for (doc, doc_clusters) in docs.iter().zip(clusters) {
            for (i, cluster) in doc_clusters.iter().enumerate() {
                let key = coref_core::SpanGroups::cluster_key(prefix, i);
                if doc.spans.contains_key(&key) {
                    return Err(Error::contract(
                        COMPONENT,
                        format!("span group '{}' already exists", key),
                    ));
                }
                for mention in cluster {
                    mention
                        .check_bounds(doc.len())
                        .map_err(|e| Error::contract(COMPONENT, e.to_string()))?;
                }
            }
        }
        for (doc, doc_clusters) in docs.iter_mut().zip(clusters) {
            doc.spans.write_clusters(prefix, doc_clusters)?;
        }
        Ok(())
    }

    /// One training pass over `examples`, adding the monitoring loss to
    /// `losses[name]`.
    pub fn update(
        &mut self,
        examples: &[Example],
        opts: UpdateOptions,
        losses: &mut Losses,
    ) -> Result<()> {
        losses.entry(self.config.name.clone()).or_insert(0.0);
        validate_examples(examples, "CorefResolver.update")?;
        if examples.iter().all(|eg| eg.predicted.is_empty()) {
            log::warn!("{}: no tokens in any of {} docs, skipping update", self.name(), examples.len());
            return Ok(());
        }
        self.scorer.set_dropout(opts.drop);

        let mut total = 0.0f32;
        for eg in examples {
            let scores = self.scorer.begin_update(&eg.predicted)?;
            let loss = self.get_loss(std::slice::from_ref(eg), &scores)?;
            total += loss.monitoring_loss;
            self.scorer
                .backprop(loss.gradient.view(), scores.antecedent_idx.view())?;
        }
        if opts.apply_gradients {
            self.scorer.finish_update()?;
        }

        log::info!("{}: update over {} docs, loss {:.4}", self.name(), examples.len(), total);
        *losses.entry(self.config.name.clone()).or_insert(0.0) += total;
        Ok(())
    }

    /// Pull the scorer toward the rehearsal scorer's outputs.
    ///
    /// Without a rehearsal scorer this only ensures the loss entry exists.
    pub fn rehearse(
        &mut self,
        examples: &[Example],
        opts: UpdateOptions,
        losses: &mut Losses,
    ) -> Result<()> {
        losses.entry(self.config.name.clone()).or_insert(0.0);
        let Some(rehearsal) = self.rehearsal.as_ref() else {
            return Ok(());
        };
        validate_examples(examples, "CorefResolver.rehearse")?;
        if examples.iter().all(|eg| eg.predicted.is_empty()) {
            return Ok(());
        }
        self.scorer.set_dropout(opts.drop);

        let mut total = 0.0f32;
        for eg in examples {
            let scores = self.scorer.begin_update(&eg.predicted)?;
            self.check_scores(&scores, eg.predicted.len())?;
            let target = rehearsal.predict(&eg.predicted)?;
            if target.scores.dim() != scores.scores.dim() {
                return Err(Error::contract(
                    COMPONENT,
                    format!(
                        "rehearsal scores {:?} do not match scores {:?}",
                        target.scores.dim(),
                        scores.scores.dim()
                    ),
                ));
            }
            let gradient = &scores.scores - &target.scores;
            total += gradient.iter().map(|g| g * g).sum::<f32>();
            self.scorer
                .backprop(gradient.view(), scores.antecedent_idx.view())?;
        }
        if opts.apply_gradients {
            self.scorer.finish_update()?;
        }

        *losses.entry(self.config.name.clone()).or_insert(0.0) += total;
        Ok(())
    }

    /// Labels are not used by this component.
    pub fn add_label(&mut self, _label: &str) -> Result<usize> {
        Err(Error::not_supported(COMPONENT, "add_label"))
    }

    /// Loss and gradient for one example.
    ///
    /// Gold clusters are read from the reference doc under
    /// `span_cluster_prefix`.
    pub fn get_loss(&self, examples: &[Example], scores: &AntecedentScores) -> Result<LossOutput> {
        let eg = single_example(examples, COMPONENT)?;
        let mentions = MentionIndexer::new().head_mentions(eg.predicted.len());
        self.check_scores(scores, mentions.len())?;

        let gold = eg.reference.spans.clusters(&self.config.span_cluster_prefix);
        let agreement = GoldAligner::new().align(&mentions, &gold, scores.antecedent_idx.view())?;
        MarginalLoss::new().compute(scores.scores.view(), agreement.view())
    }

    /// Prepare the scorer from at most two sample examples.
    pub fn initialize(&mut self, examples: &[Example]) -> Result<()> {
        validate_examples(examples, "CorefResolver.initialize")?;
        let sample = &examples[..examples.len().min(2)];
        if sample.is_empty() {
            return Err(Error::contract(
                COMPONENT,
                format!("{} needs at least one example to initialize", self.name()),
            ));
        }
        let inputs: Vec<Doc> = sample.iter().map(|eg| eg.predicted.clone()).collect();
        let references: Vec<Doc> = sample.iter().map(|eg| eg.reference.clone()).collect();
        self.scorer.initialize(&inputs, &references)
    }

    /// Per-metric scores and their macro average.
    #[must_use]
    pub fn evaluate(&self, examples: &[Example]) -> CorefEvaluation {
        evaluate_examples(examples, &self.config.span_cluster_prefix)
    }

    /// Macro average of B³, MUC and CEAFe.
    #[must_use]
    pub fn score(&self, examples: &[Example]) -> CorefScores {
        self.evaluate(examples).average
    }

    /// `coref_f`, `coref_p`, `coref_r`.
    #[must_use]
    pub fn score_metrics(&self, examples: &[Example]) -> Vec<(String, f64)> {
        self.score(examples).to_metrics("coref")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scores::NO_ANTECEDENT;
    use coref_core::{Cluster, Mention, MentionId};
    use ndarray::{Array2, ArrayView2};
    use std::sync::{Arc, Mutex};

    const MASKED: f32 = -1e4;

    /// Scores every mention's previous token as its only candidate, with a
    /// fixed preference for linking.
    #[derive(Default)]
    struct PreviousTokenScorer {
        link: f32,
        backprops: Arc<Mutex<Vec<Array2<f32>>>>,
        finished: Arc<Mutex<usize>>,
    }

    impl PreviousTokenScorer {
        fn scores(&self, doc: &Doc) -> AntecedentScores {
            let n = doc.len();
            let mut scores = Array2::<f32>::zeros((n, 2));
            if n > 0 {
                scores[[0, 1]] = MASKED;
            }
            let mut idx = Array2::from_elem((n, 1), NO_ANTECEDENT);
            for m in 1..n {
                idx[[m, 0]] = m - 1;
                scores[[m, 1]] = self.link;
            }
            AntecedentScores::new(scores, idx).unwrap()
        }
    }

    impl AntecedentScorer for PreviousTokenScorer {
        fn predict(&self, doc: &Doc) -> Result<AntecedentScores> {
            Ok(self.scores(doc))
        }
        fn begin_update(&mut self, doc: &Doc) -> Result<AntecedentScores> {
            Ok(self.scores(doc))
        }
        fn backprop(&mut self, gradient: ArrayView2<f32>, _idx: ArrayView2<MentionId>) -> Result<()> {
            self.backprops.lock().unwrap().push(gradient.to_owned());
            Ok(())
        }
        fn finish_update(&mut self) -> Result<()> {
            *self.finished.lock().unwrap() += 1;
            Ok(())
        }
    }

    fn resolver(link: f32) -> CorefResolver {
        let scorer = PreviousTokenScorer {
            link,
            ..Default::default()
        };
        CorefResolver::new(CorefConfig::default(), Box::new(scorer)).unwrap()
    }

    #[test]
    fn test_predict_links_chain() {
        let clusters = resolver(1.0).predict(&[Doc::with_len(3)]).unwrap();
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].len(), 1);
        assert_eq!(clusters[0][0].len(), 3);
    }

    #[test]
    fn test_predict_placeholder_everywhere() {
        let clusters = resolver(-1.0).predict(&[Doc::with_len(3)]).unwrap();
        assert!(clusters[0].is_empty());
    }

    #[test]
    fn test_set_annotations_writes_prefixed_keys() {
        let component = resolver(1.0);
        let mut docs = vec![Doc::with_len(3)];
        let clusters = component.predict(&docs).unwrap();
        component.set_annotations(&mut docs, &clusters).unwrap();
        assert!(docs[0].spans.contains_key("coref_clusters_0"));
        assert_eq!(docs[0].spans.clusters("coref_clusters"), clusters[0]);
    }

    #[test]
    fn test_set_annotations_count_mismatch() {
        let component = resolver(1.0);
        let mut docs = vec![Doc::with_len(3), Doc::with_len(2)];
        let err = component
            .set_annotations(&mut docs, &[MentionClusters::new()])
            .unwrap_err();
        assert!(matches!(err, Error::ContractViolation { .. }));
    }

    #[test]
    fn test_set_annotations_collision_leaves_docs_untouched() {
        let component = resolver(1.0);
        let mut taken = Doc::with_len(3);
        taken.spans.insert("coref_clusters_0", vec![Mention::token(2)]);
        let mut docs = vec![Doc::with_len(3), taken];
        let clusters = vec![
            vec![Cluster::new(vec![Mention::token(0), Mention::token(1)])],
            vec![Cluster::new(vec![Mention::token(0), Mention::token(1)])],
        ];
        let err = component.set_annotations(&mut docs, &clusters).unwrap_err();
        assert!(matches!(err, Error::ContractViolation { .. }));
        assert!(docs[0].spans.is_empty());
        assert_eq!(docs[1].spans.get("coref_clusters_0"), Some(&[Mention::token(2)][..]));
    }

    #[test]
    fn test_scores_wider_than_rough_k_rejected() {
        let scorer = PreviousTokenScorer {
            link: 1.0,
            ..Default::default()
        };
        let config = CorefConfig {
            rough_k: 1,
            ..CorefConfig::default()
        };
        let component = CorefResolver::new(config, Box::new(scorer)).unwrap();
        assert!(component.predict(&[Doc::with_len(3)]).is_ok());

        let wide = AntecedentScores::new(
            Array2::zeros((3, 3)),
            Array2::from_elem((3, 2), NO_ANTECEDENT),
        )
        .unwrap();
        let eg = Example::from_reference(Doc::with_len(3));
        let err = component
            .get_loss(std::slice::from_ref(&eg), &wide)
            .unwrap_err();
        assert!(matches!(err, Error::ContractViolation { .. }));
    }

    #[test]
    fn test_get_loss_requires_one_example() {
        let component = resolver(0.0);
        let eg = Example::from_reference(Doc::with_len(2));
        let scores = component.scorer.predict(&eg.predicted).unwrap();
        let err = component
            .get_loss(&[eg.clone(), eg], &scores)
            .unwrap_err();
        assert!(matches!(err, Error::ContractViolation { .. }));
    }

    #[test]
    fn test_update_accumulates_loss_and_finishes() {
        let backprops = Arc::new(Mutex::new(Vec::new()));
        let finished = Arc::new(Mutex::new(0));
        let scorer = PreviousTokenScorer {
            link: 0.0,
            backprops: Arc::clone(&backprops),
            finished: Arc::clone(&finished),
        };
        let mut component = CorefResolver::new(CorefConfig::default(), Box::new(scorer)).unwrap();

        let mut reference = Doc::with_len(3);
        reference
            .spans
            .write_clusters("coref_clusters", &[Cluster::new(vec![Mention::token(0), Mention::token(1)])])
            .unwrap();
        let examples = vec![Example::from_reference(reference)];

        let mut losses = Losses::new();
        component
            .update(&examples, UpdateOptions::default(), &mut losses)
            .unwrap();
        // mention 1 row: [0.5, -0.5]; mention 2 row: [-0.5, 0.5]
        assert!((losses["coref"] - 1.0).abs() < 1e-5);
        assert_eq!(backprops.lock().unwrap().len(), 1);
        assert_eq!(*finished.lock().unwrap(), 1);
    }

    #[test]
    fn test_update_skips_empty_docs() {
        let mut component = resolver(0.0);
        let mut losses = Losses::new();
        component
            .update(
                &[Example::from_reference(Doc::with_len(0))],
                UpdateOptions::default(),
                &mut losses,
            )
            .unwrap();
        assert_eq!(losses.get("coref"), Some(&0.0));
    }

    #[test]
    fn test_rehearse_without_model_is_noop() {
        let mut component = resolver(0.0);
        let mut losses = Losses::new();
        component
            .rehearse(
                &[Example::from_reference(Doc::with_len(3))],
                UpdateOptions::default(),
                &mut losses,
            )
            .unwrap();
        assert_eq!(losses.get("coref"), Some(&0.0));
    }

    #[test]
    fn test_rehearse_uses_score_difference() {
        let rehearsal = PreviousTokenScorer {
            link: 1.0,
            ..Default::default()
        };
        let mut component = resolver(0.0).with_rehearsal_scorer(Box::new(rehearsal));
        let mut losses = Losses::new();
        component
            .rehearse(
                &[Example::from_reference(Doc::with_len(3))],
                UpdateOptions::default(),
                &mut losses,
            )
            .unwrap();
        // two linked rows differ by 1.0 each
        assert!((losses["coref"] - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_add_label_not_supported() {
        let err = resolver(0.0).add_label("PERSON").unwrap_err();
        assert!(err.is_not_supported());
    }

    #[test]
    fn test_initialize_requires_examples() {
        let mut component = resolver(0.0);
        assert!(component.initialize(&[]).is_err());
        assert!(component
            .initialize(&[Example::from_reference(Doc::with_len(2))])
            .is_ok());
    }

    #[test]
    fn test_score_metrics_keys() {
        let component = resolver(0.0);
        let keys: Vec<String> = component
            .score_metrics(&[])
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, vec!["coref_f", "coref_p", "coref_r"]);
    }
}
