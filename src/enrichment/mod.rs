//! Gene set enrichment analysis over ranked gene lists.
//!
//! This module implements the permutation-based enrichment statistic: a weighted running-sum
//! (Kolmogorov-Smirnov-like) score per gene set, an adaptive multi-stage permutation test to
//! estimate its significance, and a bulk runner that processes a whole gene set collection and
//! adjusts the resulting p-values for multiple testing.
//!
//! ## Components
//!
//! - **[`EnrichmentScorer`]**: running-sum enrichment score and edge for one gene set
//! - **[`PermutationEngine`]**: adaptive permutation test driven by a [`TrialSchedule`]
//! - **[`BulkRunner`]**: scores every size-filtered gene set in parallel and emits a [`ResultTable`]
//!
//! ## Quick Example
//!
//! ```rust,no_run
//! use single_gsea::enrichment::{BulkRunner, GeneSetCollection, GseaConfig, RankedList, SizeBounds};
//!
//! let ranked = RankedList::new(vec![("A", 5.0), ("B", 4.0), ("C", 3.0), ("D", -1.0)])?;
//! let mut sets = GeneSetCollection::new();
//! sets.insert("top", ["A", "B"])?;
//!
//! let config = GseaConfig::default()
//!     .with_size_bounds(SizeBounds::new(1, 500)?)
//!     .with_seed(42);
//! let table = BulkRunner::new(config).run(&ranked, &sets)?;
//! for row in table.iter() {
//!     println!("{}\t{}\t{}", row.pathway_name, row.enrichment_score, row.adjusted_p_value);
//! }
//! # Ok::<(), anyhow::Error>(())
//! ```

use thiserror::Error;

mod bulk;
mod gene_sets;
mod permutation;
mod ranked;
mod score;
pub(crate) mod utils;

pub use bulk::{
    bulk_gsea, BulkRunner, CancelToken, EnrichmentResult, GseaConfig, ResultTable, SkippedSet,
};
pub use gene_sets::{GeneSet, GeneSetCollection, SizeBounds};
pub use permutation::{
    NullSummary, PermutationEngine, SignificanceEstimate, StageState, TrialSchedule,
};
pub use ranked::RankedList;
pub use score::{EnrichmentScore, EnrichmentScorer, RankWeights, RunningSum, WeightSource, Weighting};

/// Errors raised while building inputs or computing enrichment.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GseaError {
    #[error("gene set '{pathway}' has no members in the ranked list")]
    EmptyIntersection { pathway: String },
    #[error("invalid trial schedule: {0}")]
    InvalidSchedule(String),
    #[error("invalid size bounds: min={min} must be smaller than max={max}")]
    InvalidSizeBounds { min: usize, max: usize },
    #[error("duplicate gene identifier in ranked list: {0}")]
    DuplicateGene(String),
    #[error("duplicate pathway name in gene set collection: {0}")]
    DuplicatePathway(String),
    #[error("non-finite score for gene {gene}")]
    NonFiniteScore { gene: String },
    #[error("ranked list cannot be empty")]
    EmptyRankedList,
    #[error("run was cancelled")]
    Cancelled,
}
