//! Weighted running-sum enrichment statistic.
//!
//! Walking the ranked list from the top, every gene set member ("hit") raises the running sum by
//! its share of the total hit weight and every other gene ("miss") lowers it by `1 / (N - K)`,
//! where `N` is the list length and `K` the number of hits. Both excursions therefore total one
//! and the statistic does not depend on the list length. The enrichment score is the larger of
//! the maximum positive and the maximum negative excursion.

use crate::enrichment::gene_sets::GeneSet;
use crate::enrichment::ranked::RankedList;
use crate::enrichment::utils::signed_edge;
use crate::enrichment::GseaError;

/// Which per-gene quantity the hit weight is derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeightSource {
    /// The gene's score itself (absolute value).
    Score,
    /// The gene's descending rank, `N - position`.
    Rank,
}

/// Hit weighting policy: `weight = |x| ^ power` with `x` taken from `source`.
///
/// `power = 0` gives the classic unweighted Kolmogorov-Smirnov statistic, `power = 1` (the
/// default) weights every hit by its score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Weighting {
    pub source: WeightSource,
    pub power: f64,
}

impl Weighting {
    pub fn new(source: WeightSource, power: f64) -> Self {
        Weighting { source, power }
    }

    pub fn unweighted() -> Self {
        Weighting::new(WeightSource::Score, 0.0)
    }
}

impl Default for Weighting {
    fn default() -> Self {
        Weighting::new(WeightSource::Score, 1.0)
    }
}

/// Hit weights for every position of a ranked list, computed once and shared across gene sets
/// and permutation trials.
#[derive(Debug, Clone)]
pub struct RankWeights(Vec<f64>);

impl RankWeights {
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Enrichment score of one gene set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnrichmentScore {
    /// Signed extremum of the running sum. Positive means the set clusters toward the top.
    pub score: f64,
    /// Signed distance of the extremum from the list centre, in `(-1, 1)`.
    pub edge: f64,
    /// Ranked-list position of the extremum. `None` when the running sum never leaves zero.
    pub position: Option<usize>,
}

impl EnrichmentScore {
    fn zero() -> Self {
        EnrichmentScore {
            score: 0.0,
            edge: 0.0,
            position: None,
        }
    }

    fn from_extremes(
        peak: (f64, Option<usize>),
        trough: (f64, Option<usize>),
        n: usize,
    ) -> Self {
        let (score, position) = if peak.0 >= -trough.0 { peak } else { trough };
        match position {
            Some(pos) => EnrichmentScore {
                score,
                edge: signed_edge(pos, n),
                position: Some(pos),
            },
            None => EnrichmentScore::zero(),
        }
    }
}

/// Full running-sum trace of one gene set, for plotting and leading-edge inspection.
#[derive(Debug, Clone)]
pub struct RunningSum {
    /// Running-sum value after each ranked-list position.
    pub values: Vec<f64>,
    /// Positions of the gene set members in the ranked list.
    pub hit_positions: Vec<usize>,
    pub score: EnrichmentScore,
    /// Members contributing to the defining excursion, in ranked order.
    pub leading_edge: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EnrichmentScorer {
    weighting: Weighting,
}

impl EnrichmentScorer {
    pub fn new(weighting: Weighting) -> Self {
        EnrichmentScorer { weighting }
    }

    pub fn weighting(&self) -> Weighting {
        self.weighting
    }

    pub fn weights(&self, ranked: &RankedList) -> RankWeights {
        let n = ranked.len();
        let power = self.weighting.power;
        let weights = match self.weighting.source {
            WeightSource::Score => ranked
                .scores()
                .iter()
                .map(|s| s.abs().powf(power))
                .collect(),
            WeightSource::Rank => (0..n).map(|i| ((n - i) as f64).powf(power)).collect(),
        };
        RankWeights(weights)
    }

    /// Score `gene_set` against `ranked`. Members absent from the list are ignored.
    ///
    /// # Errors
    ///
    /// [`GseaError::EmptyIntersection`] when no member of the set is in the list.
    pub fn score(
        &self,
        ranked: &RankedList,
        gene_set: &GeneSet,
    ) -> Result<EnrichmentScore, GseaError> {
        let positions = hit_positions(ranked, gene_set)?;
        Ok(self.score_positions(&self.weights(ranked), &positions))
    }

    /// Score a set given as sorted, distinct ranked-list positions.
    ///
    /// Only the hits are visited: the miss run before each hit is applied as a single step, and
    /// its low point is the position just before the hit.
    pub fn score_positions(&self, weights: &RankWeights, positions: &[usize]) -> EnrichmentScore {
        let weights = weights.as_slice();
        let n = weights.len();
        let k = positions.len();
        if n == 0 || k == 0 {
            return EnrichmentScore::zero();
        }

        let steps = Steps::new(weights, positions);
        let mut running = 0.0;
        let mut peak = (0.0, None);
        let mut trough = (0.0, None);
        let mut next = 0;

        for &p in positions {
            if p > next {
                running -= steps.miss * (p - next) as f64;
                if running < trough.0 {
                    trough = (running, Some(p - 1));
                }
            }
            running += steps.hit(weights[p]);
            if running > peak.0 {
                peak = (running, Some(p));
            }
            next = p + 1;
        }
        if next < n {
            running -= steps.miss * (n - next) as f64;
            if running < trough.0 {
                trough = (running, Some(n - 1));
            }
        }

        EnrichmentScore::from_extremes(peak, trough, n)
    }

    /// Walk the whole list and keep the running sum at every position.
    pub fn running_sum(
        &self,
        ranked: &RankedList,
        gene_set: &GeneSet,
    ) -> Result<RunningSum, GseaError> {
        let positions = hit_positions(ranked, gene_set)?;
        let weights = self.weights(ranked);
        let score = self.score_positions(&weights, &positions);

        let steps = Steps::new(weights.as_slice(), &positions);
        let mut values = Vec::with_capacity(ranked.len());
        let mut running = 0.0;
        let mut hits = positions.iter().peekable();
        for (i, &w) in weights.as_slice().iter().enumerate() {
            if hits.next_if_eq(&&i).is_some() {
                running += steps.hit(w);
            } else {
                running -= steps.miss;
            }
            values.push(running);
        }

        let leading_edge = leading_edge(ranked, &positions, &score);
        Ok(RunningSum {
            values,
            hit_positions: positions,
            score,
            leading_edge,
        })
    }
}

/// Normalised step sizes for one set of hits.
struct Steps {
    hit_total: f64,
    equal_hit: f64,
    miss: f64,
}

impl Steps {
    fn new(weights: &[f64], positions: &[usize]) -> Self {
        let n = weights.len();
        let k = positions.len();
        let hit_total: f64 = positions.iter().map(|&p| weights[p]).sum();
        // No misses when the set covers the whole list.
        let miss = if n > k { 1.0 / (n - k) as f64 } else { 0.0 };
        Steps {
            hit_total,
            equal_hit: 1.0 / k as f64,
            miss,
        }
    }

    fn hit(&self, weight: f64) -> f64 {
        if self.hit_total > 0.0 {
            weight / self.hit_total
        } else {
            self.equal_hit
        }
    }
}

/// Hits up to the peak for a positive score, hits after the trough for a negative one.
pub(crate) fn leading_edge(
    ranked: &RankedList,
    positions: &[usize],
    score: &EnrichmentScore,
) -> Vec<String> {
    let genes = |keep: &dyn Fn(usize) -> bool| -> Vec<String> {
        positions
            .iter()
            .filter(|&&p| keep(p))
            .filter_map(|&p| ranked.gene(p).map(str::to_string))
            .collect()
    };
    match score.position {
        Some(pos) if score.score > 0.0 => genes(&|p| p <= pos),
        Some(pos) if score.score < 0.0 => genes(&|p| p > pos),
        _ => Vec::new(),
    }
}

/// Sorted ranked-list positions of the set's members.
pub(crate) fn hit_positions(
    ranked: &RankedList,
    gene_set: &GeneSet,
) -> Result<Vec<usize>, GseaError> {
    let positions = ranked.positions_of(gene_set.genes().iter().map(String::as_str));
    if positions.is_empty() {
        return Err(GseaError::EmptyIntersection {
            pathway: gene_set.name().to_string(),
        });
    }
    Ok(positions)
}
