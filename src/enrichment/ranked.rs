use std::collections::HashMap;

use rustc_hash::FxHashMap;
use single_utilities::traits::FloatOps;

use crate::enrichment::utils::descending_order;
use crate::enrichment::GseaError;

/// Genes ordered by a differential-expression score, highest first.
///
/// Gene identifiers are unique and every score is finite. Ties keep the order in which the
/// genes were supplied.
#[derive(Debug, Clone)]
pub struct RankedList {
    genes: Vec<String>,
    scores: Vec<f64>,
    index: FxHashMap<String, usize>,
}

impl RankedList {
    /// Build a ranked list from `(gene, score)` pairs in any order.
    ///
    /// # Errors
    ///
    /// * [`GseaError::EmptyRankedList`] if no pairs are supplied
    /// * [`GseaError::DuplicateGene`] if a gene identifier appears twice
    /// * [`GseaError::NonFiniteScore`] if a score is NaN or infinite
    pub fn new<S, T, I>(pairs: I) -> Result<Self, GseaError>
    where
        S: Into<String>,
        T: FloatOps,
        I: IntoIterator<Item = (S, T)>,
    {
        let mut input_genes = Vec::new();
        let mut input_scores = Vec::new();
        for (gene, score) in pairs {
            let gene = gene.into();
            let score = num_traits::ToPrimitive::to_f64(&score).unwrap_or(f64::NAN);
            if !score.is_finite() {
                return Err(GseaError::NonFiniteScore { gene });
            }
            input_genes.push(gene);
            input_scores.push(score);
        }

        if input_genes.is_empty() {
            return Err(GseaError::EmptyRankedList);
        }

        let order = descending_order(&input_scores);
        let mut genes = Vec::with_capacity(order.len());
        let mut scores = Vec::with_capacity(order.len());
        let mut index = FxHashMap::with_capacity_and_hasher(order.len(), Default::default());

        for (position, &i) in order.iter().enumerate() {
            let gene = std::mem::take(&mut input_genes[i]);
            if index.insert(gene.clone(), position).is_some() {
                return Err(GseaError::DuplicateGene(gene));
            }
            genes.push(gene);
            scores.push(input_scores[i]);
        }

        Ok(RankedList {
            genes,
            scores,
            index,
        })
    }

    /// Build a ranked list from an unordered map. Tied scores are ordered by gene identifier so
    /// the result does not depend on hash iteration order.
    pub fn from_map(scores: &HashMap<String, f64>) -> Result<Self, GseaError> {
        let mut pairs: Vec<(&String, f64)> = scores.iter().map(|(g, &s)| (g, s)).collect();
        pairs.sort_by(|a, b| a.0.cmp(b.0));
        Self::new(pairs.into_iter().map(|(g, s)| (g.clone(), s)))
    }

    pub fn len(&self) -> usize {
        self.genes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.genes.is_empty()
    }

    /// Position of `gene` in the ranking (0 is the highest score).
    pub fn position(&self, gene: &str) -> Option<usize> {
        self.index.get(gene).copied()
    }

    pub fn gene(&self, position: usize) -> Option<&str> {
        self.genes.get(position).map(String::as_str)
    }

    pub fn genes(&self) -> &[String] {
        &self.genes
    }

    pub fn scores(&self) -> &[f64] {
        &self.scores
    }

    /// Sorted, de-duplicated positions of the given genes that are present in the list.
    pub fn positions_of<'a, I>(&self, genes: I) -> Vec<usize>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut positions: Vec<usize> = genes
            .into_iter()
            .filter_map(|gene| self.position(gene))
            .collect();
        positions.sort_unstable();
        positions.dedup();
        positions
    }
}
