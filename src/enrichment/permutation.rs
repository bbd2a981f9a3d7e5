//! Adaptive permutation test for enrichment scores.
//!
//! Null scores come from random gene sets of the same size: `K` distinct ranked-list positions
//! drawn uniformly and scored with the same weights as the observed set. Trials run in stages of
//! increasing size. A stage that has already seen enough null scores as extreme as the observed
//! one gives a stable estimate and stops the test. Otherwise the test escalates to the next
//! stage, so only sets with small p-values pay for the larger trial counts.

use rand::rngs::StdRng;
use rand::seq::index;
use rand::SeedableRng;
use statrs::function::factorial::binomial;
use tracing::{debug, trace};

use crate::enrichment::gene_sets::GeneSet;
use crate::enrichment::ranked::RankedList;
use crate::enrichment::score::{hit_positions, EnrichmentScorer, RankWeights};
use crate::enrichment::GseaError;

const DEFAULT_MIN_EXCEEDANCES: usize = 10;

/// Cumulative trial targets, one per stage, strictly ascending.
///
/// Escalating from one stage to the next tops the trial count up to the next target and keeps the
/// draws already made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrialSchedule {
    stages: Vec<usize>,
}

impl TrialSchedule {
    /// # Errors
    ///
    /// [`GseaError::InvalidSchedule`] if `stages` is empty, contains zero, or is not strictly
    /// ascending.
    pub fn new(stages: &[usize]) -> Result<Self, GseaError> {
        if stages.is_empty() {
            return Err(GseaError::InvalidSchedule(
                "schedule needs at least one stage".to_string(),
            ));
        }
        if let Some(i) = stages.iter().position(|&s| s == 0) {
            return Err(GseaError::InvalidSchedule(format!(
                "stage {} has a non-positive trial count",
                i
            )));
        }
        if let Some(i) = stages.windows(2).position(|w| w[1] <= w[0]) {
            return Err(GseaError::InvalidSchedule(format!(
                "stage {} ({}) does not exceed stage {} ({})",
                i + 1,
                stages[i + 1],
                i,
                stages[i]
            )));
        }
        Ok(TrialSchedule {
            stages: stages.to_vec(),
        })
    }

    pub fn stages(&self) -> &[usize] {
        &self.stages
    }

    /// Upper bound on the trials any single gene set can run.
    pub fn max_trials(&self) -> usize {
        self.stages.last().copied().unwrap_or(0)
    }
}

impl Default for TrialSchedule {
    fn default() -> Self {
        TrialSchedule {
            stages: vec![100, 1_000, 10_000],
        }
    }
}

impl TryFrom<&[i64]> for TrialSchedule {
    type Error = GseaError;

    fn try_from(stages: &[i64]) -> Result<Self, Self::Error> {
        let stages = stages
            .iter()
            .enumerate()
            .map(|(i, &s)| {
                usize::try_from(s).map_err(|_| {
                    GseaError::InvalidSchedule(format!(
                        "stage {} has a non-positive trial count",
                        i
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        TrialSchedule::new(&stages)
    }
}

/// Progress of the adaptive test for one gene set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageState {
    NotStarted,
    StageRunning(usize),
    /// Enough exceedances were seen after this stage.
    Converged { stage: usize },
    /// The given stage was not conclusive; the next one runs.
    Escalated { from: usize },
    /// Every stage ran without converging; the estimate is floored at `1 / trials`.
    Exhausted,
}

impl StageState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StageState::Converged { .. } | StageState::Exhausted)
    }
}

/// Aggregate of the null scores drawn for one gene set.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NullSummary {
    pub trials: usize,
    /// Null scores at least as extreme as the observed one, in its direction.
    pub exceedances: usize,
    /// Null scores with the same sign as the observed one.
    pub same_sign: usize,
    pub same_sign_sum: f64,
}

impl NullSummary {
    fn record(&mut self, null: f64, observed: f64) {
        self.trials += 1;
        if observed >= 0.0 {
            if null >= observed {
                self.exceedances += 1;
            }
            if null >= 0.0 {
                self.same_sign += 1;
                self.same_sign_sum += null;
            }
        } else {
            if null <= observed {
                self.exceedances += 1;
            }
            if null < 0.0 {
                self.same_sign += 1;
                self.same_sign_sum += null;
            }
        }
    }

    /// `max(exceedances, 1) / trials`, never exactly zero.
    pub fn p_value(&self) -> f64 {
        if self.trials == 0 {
            return 1.0;
        }
        (self.exceedances.max(1) as f64 / self.trials as f64).min(1.0)
    }

    /// Observed score divided by the magnitude of the mean same-sign null score.
    pub fn normalized_score(&self, observed: f64) -> Option<f64> {
        if self.same_sign == 0 {
            return None;
        }
        let mean = (self.same_sign_sum / self.same_sign as f64).abs();
        if mean == 0.0 {
            return None;
        }
        Some(observed / mean)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignificanceEstimate {
    pub p_value: f64,
    pub summary: NullSummary,
    /// Terminal state of the test, [`StageState::Converged`] or [`StageState::Exhausted`].
    pub state: StageState,
}

#[derive(Debug, Clone)]
pub struct PermutationEngine {
    scorer: EnrichmentScorer,
    schedule: TrialSchedule,
    min_exceedances: usize,
}

impl PermutationEngine {
    pub fn new(scorer: EnrichmentScorer, schedule: TrialSchedule) -> Self {
        PermutationEngine {
            scorer,
            schedule,
            min_exceedances: DEFAULT_MIN_EXCEEDANCES,
        }
    }

    /// Exceedances after which a stage counts as converged.
    pub fn with_min_exceedances(mut self, min_exceedances: usize) -> Self {
        self.min_exceedances = min_exceedances;
        self
    }

    pub fn schedule(&self) -> &TrialSchedule {
        &self.schedule
    }

    /// Estimate the permutation p-value of `observed` for `gene_set`.
    ///
    /// Without a seed a random one is drawn, which makes the result irreproducible.
    pub fn estimate_significance(
        &self,
        ranked: &RankedList,
        gene_set: &GeneSet,
        observed: f64,
        seed: Option<u64>,
    ) -> Result<SignificanceEstimate, GseaError> {
        let positions = hit_positions(ranked, gene_set)?;
        let weights = self.scorer.weights(ranked);
        let seed = seed.unwrap_or_else(|| {
            let seed = rand::random();
            debug!("No seed supplied for {}, using {}", gene_set.name(), seed);
            seed
        });
        Ok(self.estimate_for_size(&weights, positions.len(), observed, seed))
    }

    /// Run the adaptive test for a set of `set_size` hits against precomputed weights.
    pub fn estimate_for_size(
        &self,
        weights: &RankWeights,
        set_size: usize,
        observed: f64,
        seed: u64,
    ) -> SignificanceEstimate {
        let n = weights.len();
        let k = set_size.min(n);
        self.log_saturation(n, k);

        let mut rng = StdRng::seed_from_u64(seed);
        let mut summary = NullSummary::default();
        let mut state = StageState::NotStarted;
        let stages = self.schedule.stages();

        while !state.is_terminal() {
            state = match state {
                StageState::NotStarted => StageState::StageRunning(0),
                StageState::StageRunning(stage) => {
                    while summary.trials < stages[stage] {
                        let mut positions = index::sample(&mut rng, n, k).into_vec();
                        positions.sort_unstable();
                        let null = self.scorer.score_positions(weights, &positions);
                        summary.record(null.score, observed);
                    }
                    if summary.exceedances >= self.min_exceedances {
                        StageState::Converged { stage }
                    } else if stage + 1 < stages.len() {
                        StageState::Escalated { from: stage }
                    } else {
                        StageState::Exhausted
                    }
                }
                StageState::Escalated { from } => StageState::StageRunning(from + 1),
                terminal => terminal,
            };
            trace!(
                ?state,
                trials = summary.trials,
                exceedances = summary.exceedances,
                "permutation stage"
            );
        }

        SignificanceEstimate {
            p_value: summary.p_value(),
            summary,
            state,
        }
    }

    fn log_saturation(&self, n: usize, k: usize) {
        let distinct = binomial(n as u64, k as u64);
        if distinct < self.schedule.max_trials() as f64 {
            debug!(
                "Only {} distinct sets of size {} among {} genes; up to {} trials will repeat draws",
                distinct,
                k,
                n,
                self.schedule.max_trials()
            );
        }
    }
}
