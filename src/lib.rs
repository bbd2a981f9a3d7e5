//! # single-gsea
//!
//! Permutation-based gene set enrichment analysis for ranked gene lists, part of the single-rust
//! ecosystem.
//!
//! Given genes ranked by a differential-expression metric and a collection of named gene sets,
//! this crate computes a weighted running-sum enrichment score for every gene set, estimates its
//! significance with an adaptive permutation test and adjusts the resulting p-values for multiple
//! testing.
//!
//! ## Core Features
//!
//! - **Enrichment Score**: weighted Kolmogorov-Smirnov-like running sum with a signed edge
//! - **Adaptive Permutation Test**: cheap first stage, escalating only for small p-values
//! - **Bulk Runs**: size filtering, parallel execution across gene sets, FDR adjustment
//! - **Reproducibility**: seeded runs give identical results regardless of thread count
//!
//! ## Quick Start
//!
//! Build a [`enrichment::RankedList`] and a [`enrichment::GeneSetCollection`], then run a
//! [`enrichment::BulkRunner`] configured with a [`enrichment::GseaConfig`].
//!
//! ## Module Organization
//!
//! - **[`enrichment`]**: ranked lists, gene sets, scoring, permutation testing and bulk runs
//! - **[`testing`]**: multiple testing correction

pub mod enrichment;
pub mod testing;

pub use enrichment::{
    BulkRunner, EnrichmentResult, GeneSetCollection, GseaConfig, GseaError, RankedList,
    ResultTable,
};
