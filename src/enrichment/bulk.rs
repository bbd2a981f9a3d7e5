//! Bulk enrichment over a whole gene set collection.
//!
//! Each size-filtered gene set is an independent task on a rayon pool: it is scored, then its
//! significance is estimated with a seed derived from the run seed and the pathway name. Once
//! every task has finished, the raw p-values are adjusted together and the result table is built.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;
use ndarray::Array2;
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use tracing::{debug, info, warn};

use crate::enrichment::gene_sets::{GeneSet, GeneSetCollection, SizeBounds};
use crate::enrichment::permutation::{PermutationEngine, StageState, TrialSchedule};
use crate::enrichment::ranked::RankedList;
use crate::enrichment::score::{hit_positions, leading_edge, EnrichmentScorer, RankWeights, Weighting};
use crate::enrichment::utils::derive_seed;
use crate::enrichment::GseaError;
use crate::testing::PValueAdjustment;

/// Shared flag that lets a caller abort a run between gene sets.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Options of a bulk enrichment run.
#[derive(Debug, Clone)]
pub struct GseaConfig {
    /// Exclusive bounds on gene set size.
    pub size_bounds: SizeBounds,
    /// Cumulative permutation counts per stage, validated when the run starts.
    pub trial_schedule: Vec<usize>,
    /// Base seed. Without one, a random seed is drawn and logged.
    pub seed: Option<u64>,
    pub weighting: Weighting,
    /// Exceedances after which a permutation stage counts as converged.
    pub min_exceedances: usize,
    pub adjustment: PValueAdjustment,
    /// Size of a dedicated worker pool. `None` uses the global rayon pool.
    pub workers: Option<usize>,
    /// Fail the run instead of skipping sets that share no gene with the ranked list.
    pub abort_on_empty_intersection: bool,
}

impl Default for GseaConfig {
    fn default() -> Self {
        GseaConfig {
            size_bounds: SizeBounds::default(),
            trial_schedule: TrialSchedule::default().stages().to_vec(),
            seed: None,
            weighting: Weighting::default(),
            min_exceedances: 10,
            adjustment: PValueAdjustment::default(),
            workers: None,
            abort_on_empty_intersection: false,
        }
    }
}

impl GseaConfig {
    pub fn with_size_bounds(mut self, size_bounds: SizeBounds) -> Self {
        self.size_bounds = size_bounds;
        self
    }

    pub fn with_trial_schedule(mut self, trial_schedule: &[usize]) -> Self {
        self.trial_schedule = trial_schedule.to_vec();
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_weighting(mut self, weighting: Weighting) -> Self {
        self.weighting = weighting;
        self
    }

    pub fn with_min_exceedances(mut self, min_exceedances: usize) -> Self {
        self.min_exceedances = min_exceedances;
        self
    }

    pub fn with_adjustment(mut self, adjustment: PValueAdjustment) -> Self {
        self.adjustment = adjustment;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    pub fn with_abort_on_empty_intersection(mut self, abort: bool) -> Self {
        self.abort_on_empty_intersection = abort;
        self
    }
}

/// One row of the result table.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichmentResult {
    pub pathway_name: String,
    pub enrichment_score: f64,
    /// Enrichment score over the mean same-sign null score, if that mean is defined.
    pub normalized_score: Option<f64>,
    pub edge: f64,
    pub p_value: f64,
    pub adjusted_p_value: f64,
    /// Unique members of the gene set.
    pub set_size: usize,
    /// Members present in the ranked list.
    pub hits: usize,
    /// Permutations actually run.
    pub trials: usize,
    pub stopped: StageState,
    pub leading_edge: Vec<String>,
}

/// A gene set that passed the size filter but could not be scored.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedSet {
    pub pathway_name: String,
    pub reason: GseaError,
}

/// Rows in collection order, keyed by pathway name.
#[derive(Debug, Clone, Default)]
pub struct ResultTable {
    rows: Vec<EnrichmentResult>,
    skipped: Vec<SkippedSet>,
    index: FxHashMap<String, usize>,
}

impl ResultTable {
    fn new(rows: Vec<EnrichmentResult>, skipped: Vec<SkippedSet>) -> Self {
        let index = rows
            .iter()
            .enumerate()
            .map(|(i, row)| (row.pathway_name.clone(), i))
            .collect();
        ResultTable {
            rows,
            skipped,
            index,
        }
    }

    pub fn get(&self, pathway_name: &str) -> Option<&EnrichmentResult> {
        self.index.get(pathway_name).map(|&i| &self.rows[i])
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EnrichmentResult> {
        self.rows.iter()
    }

    pub fn rows(&self) -> &[EnrichmentResult] {
        &self.rows
    }

    pub fn skipped(&self) -> &[SkippedSet] {
        &self.skipped
    }

    /// Rows whose adjusted p-value is below `alpha`.
    pub fn significant(&self, alpha: f64) -> Vec<&EnrichmentResult> {
        self.rows
            .iter()
            .filter(|row| row.adjusted_p_value < alpha)
            .collect()
    }

    /// Rows ordered by raw p-value, ties broken by the larger absolute enrichment score.
    pub fn sorted_by_p_value(&self) -> Vec<&EnrichmentResult> {
        let mut rows: Vec<&EnrichmentResult> = self.rows.iter().collect();
        rows.sort_by(|a, b| {
            a.p_value
                .partial_cmp(&b.p_value)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    b.enrichment_score
                        .abs()
                        .partial_cmp(&a.enrichment_score.abs())
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
        });
        rows
    }

    /// Numeric columns `[es, nes, edge, p, q]`, one row per result. A missing NES is NaN.
    pub fn to_array(&self) -> Array2<f64> {
        Array2::from_shape_fn((self.rows.len(), 5), |(i, j)| {
            let row = &self.rows[i];
            match j {
                0 => row.enrichment_score,
                1 => row.normalized_score.unwrap_or(f64::NAN),
                2 => row.edge,
                3 => row.p_value,
                _ => row.adjusted_p_value,
            }
        })
    }
}

/// A scored set waiting for the batch-wide adjustment.
struct ScoredSet {
    pathway_name: String,
    enrichment_score: f64,
    normalized_score: Option<f64>,
    edge: f64,
    p_value: f64,
    set_size: usize,
    hits: usize,
    trials: usize,
    stopped: StageState,
    leading_edge: Vec<String>,
}

impl ScoredSet {
    fn into_result(self, adjusted_p_value: f64) -> EnrichmentResult {
        EnrichmentResult {
            pathway_name: self.pathway_name,
            enrichment_score: self.enrichment_score,
            normalized_score: self.normalized_score,
            edge: self.edge,
            p_value: self.p_value,
            adjusted_p_value,
            set_size: self.set_size,
            hits: self.hits,
            trials: self.trials,
            stopped: self.stopped,
            leading_edge: self.leading_edge,
        }
    }
}

enum SetOutcome {
    Scored(ScoredSet),
    Skipped(SkippedSet),
}

/// Scores and tests every gene set of a collection.
#[derive(Debug, Clone, Default)]
pub struct BulkRunner {
    config: GseaConfig,
    cancel: CancelToken,
}

impl BulkRunner {
    pub fn new(config: GseaConfig) -> Self {
        BulkRunner {
            config,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &GseaConfig {
        &self.config
    }

    /// Run the enrichment over all sets of `collection` that pass the size filter.
    ///
    /// # Errors
    ///
    /// * [`GseaError::InvalidSchedule`] before any work if the trial schedule is malformed
    /// * [`GseaError::Cancelled`] if the cancel token was triggered
    /// * [`GseaError::EmptyIntersection`] only with `abort_on_empty_intersection`
    pub fn run(
        &self,
        ranked: &RankedList,
        collection: &GeneSetCollection,
    ) -> anyhow::Result<ResultTable> {
        let schedule = TrialSchedule::new(&self.config.trial_schedule)?;
        let base_seed = self.config.seed.unwrap_or_else(|| {
            let seed = rand::random();
            debug!("No seed supplied, using {}", seed);
            seed
        });

        let bounds = self.config.size_bounds;
        let candidates = collection.filter_by_size(bounds);
        info!(
            "Testing {} of {} gene sets (size bounds {}..{}) against {} genes, seed {}",
            candidates.len(),
            collection.len(),
            bounds.min(),
            bounds.max(),
            ranked.len(),
            base_seed
        );

        let scorer = EnrichmentScorer::new(self.config.weighting);
        let engine = PermutationEngine::new(scorer, schedule)
            .with_min_exceedances(self.config.min_exceedances);
        let weights = scorer.weights(ranked);

        let dispatch = || {
            candidates
                .par_iter()
                .map(|set| self.process_set(ranked, &weights, &scorer, &engine, set, base_seed))
                .collect::<Result<Vec<_>, GseaError>>()
        };
        let outcomes = match self.config.workers {
            Some(workers) => rayon::ThreadPoolBuilder::new()
                .num_threads(workers)
                .build()
                .context("Failed to build the worker pool")?
                .install(dispatch),
            None => dispatch(),
        }?;

        // Every raw p-value is known from here on.
        let mut scored = Vec::with_capacity(outcomes.len());
        let mut skipped = Vec::new();
        for outcome in outcomes {
            match outcome {
                SetOutcome::Scored(set) => scored.push(set),
                SetOutcome::Skipped(set) => skipped.push(set),
            }
        }

        let raw: Vec<f64> = scored.iter().map(|set| set.p_value).collect();
        let adjusted = self
            .config
            .adjustment
            .apply(&raw)
            .context("Failed to adjust p-values")?;
        let rows: Vec<EnrichmentResult> = scored
            .into_iter()
            .zip(adjusted)
            .map(|(set, q)| set.into_result(q))
            .collect();

        info!(
            "Finished enrichment: {} scored, {} skipped",
            rows.len(),
            skipped.len()
        );
        Ok(ResultTable::new(rows, skipped))
    }

    fn process_set(
        &self,
        ranked: &RankedList,
        weights: &RankWeights,
        scorer: &EnrichmentScorer,
        engine: &PermutationEngine,
        set: &GeneSet,
        base_seed: u64,
    ) -> Result<SetOutcome, GseaError> {
        if self.cancel.is_cancelled() {
            return Err(GseaError::Cancelled);
        }

        let positions = match hit_positions(ranked, set) {
            Ok(positions) => positions,
            Err(err) if self.config.abort_on_empty_intersection => return Err(err),
            Err(err) => {
                warn!("Skipping {}: {}", set.name(), err);
                return Ok(SetOutcome::Skipped(SkippedSet {
                    pathway_name: set.name().to_string(),
                    reason: err,
                }));
            }
        };

        let observed = scorer.score_positions(weights, &positions);
        let estimate = engine.estimate_for_size(
            weights,
            positions.len(),
            observed.score,
            derive_seed(base_seed, set.name()),
        );
        debug!(
            "{}: es={:.4} edge={:.4} p={:.3e} after {} trials ({:?})",
            set.name(),
            observed.score,
            observed.edge,
            estimate.p_value,
            estimate.summary.trials,
            estimate.state
        );

        Ok(SetOutcome::Scored(ScoredSet {
            pathway_name: set.name().to_string(),
            enrichment_score: observed.score,
            normalized_score: estimate.summary.normalized_score(observed.score),
            edge: observed.edge,
            p_value: estimate.p_value,
            set_size: set.len(),
            hits: positions.len(),
            trials: estimate.summary.trials,
            stopped: estimate.state,
            leading_edge: leading_edge(ranked, &positions, &observed),
        }))
    }
}

/// Run a bulk enrichment with the given size bounds and trial schedule and default settings
/// otherwise.
pub fn bulk_gsea(
    ranked: &RankedList,
    collection: &GeneSetCollection,
    size_bounds: SizeBounds,
    trial_schedule: &[usize],
    seed: Option<u64>,
) -> anyhow::Result<ResultTable> {
    let mut config = GseaConfig::default()
        .with_size_bounds(size_bounds)
        .with_trial_schedule(trial_schedule);
    config.seed = seed;
    BulkRunner::new(config).run(ranked, collection)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ranked_list(n: usize) -> RankedList {
        RankedList::new((0..n).map(|i| (format!("G{}", i), n as f64 / 2.0 - i as f64))).unwrap()
    }

    fn genes(range: std::ops::Range<usize>) -> Vec<String> {
        range.map(|i| format!("G{}", i)).collect()
    }

    fn small_config() -> GseaConfig {
        GseaConfig::default()
            .with_size_bounds(SizeBounds::new(1, 100).unwrap())
            .with_trial_schedule(&[50, 200])
            .with_seed(11)
    }

    #[test]
    fn test_disjoint_set_is_skipped() {
        let ranked = ranked_list(50);
        let collection = GeneSetCollection::from_pairs(vec![
            ("present", genes(0..5)),
            ("absent", vec!["X1".into(), "X2".into()]),
        ])
        .unwrap();

        let table = BulkRunner::new(small_config()).run(&ranked, &collection).unwrap();
        assert_eq!(table.len(), 1);
        assert!(table.get("present").is_some());
        assert!(table.get("absent").is_none());
        assert_eq!(table.skipped().len(), 1);
        assert_eq!(
            table.skipped()[0].reason,
            GseaError::EmptyIntersection {
                pathway: "absent".to_string()
            }
        );
    }

    #[test]
    fn test_disjoint_set_can_abort() {
        let ranked = ranked_list(50);
        let collection =
            GeneSetCollection::from_pairs(vec![("absent", vec!["X1".to_string(), "X2".into()])])
                .unwrap();
        let config = small_config().with_abort_on_empty_intersection(true);
        let err = BulkRunner::new(config).run(&ranked, &collection).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<GseaError>(),
            Some(GseaError::EmptyIntersection { .. })
        ));
    }

    #[test]
    fn test_cancelled_run() {
        let ranked = ranked_list(50);
        let collection = GeneSetCollection::from_pairs(vec![("p", genes(0..5))]).unwrap();
        let token = CancelToken::new();
        token.cancel();
        let err = BulkRunner::new(small_config())
            .with_cancel_token(token)
            .run(&ranked, &collection)
            .unwrap_err();
        assert_eq!(err.downcast_ref::<GseaError>(), Some(&GseaError::Cancelled));
    }

    #[test]
    fn test_dedicated_pool_matches_global_pool() {
        let ranked = ranked_list(60);
        let collection = GeneSetCollection::from_pairs(vec![
            ("top", genes(0..6)),
            ("mid", genes(25..31)),
            ("bottom", genes(54..60)),
        ])
        .unwrap();

        let global = BulkRunner::new(small_config()).run(&ranked, &collection).unwrap();
        let pooled = BulkRunner::new(small_config().with_workers(2))
            .run(&ranked, &collection)
            .unwrap();
        assert_eq!(global.rows(), pooled.rows());
    }

    #[test]
    fn test_rows_keep_collection_order_and_array_shape() {
        let ranked = ranked_list(60);
        let collection = GeneSetCollection::from_pairs(vec![
            ("c", genes(10..14)),
            ("a", genes(0..4)),
            ("b", genes(40..44)),
        ])
        .unwrap();
        let table = BulkRunner::new(small_config()).run(&ranked, &collection).unwrap();
        let names: Vec<&str> = table.iter().map(|r| r.pathway_name.as_str()).collect();
        assert_eq!(names, vec!["c", "a", "b"]);

        let array = table.to_array();
        assert_eq!(array.shape(), &[3, 5]);
        assert_eq!(array[[1, 0]], table.get("a").unwrap().enrichment_score);
        assert_eq!(array[[2, 4]], table.get("b").unwrap().adjusted_p_value);
    }

    #[test]
    fn test_bonferroni_adjustment() {
        let ranked = ranked_list(60);
        let collection = GeneSetCollection::from_pairs(vec![
            ("a", genes(0..4)),
            ("b", genes(40..44)),
        ])
        .unwrap();
        let table = BulkRunner::new(small_config().with_adjustment(PValueAdjustment::Bonferroni))
            .run(&ranked, &collection)
            .unwrap();
        for row in table.iter() {
            assert_eq!(row.adjusted_p_value, (row.p_value * 2.0).min(1.0));
        }
    }
}
