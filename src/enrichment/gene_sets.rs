use rustc_hash::{FxHashMap, FxHashSet};

use crate::enrichment::GseaError;

/// A named collection of gene identifiers (a pathway).
///
/// Duplicate members are collapsed on construction, keeping the first occurrence.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneSet {
    name: String,
    genes: Vec<String>,
}

impl GeneSet {
    pub fn new<N, G, I>(name: N, genes: I) -> Self
    where
        N: Into<String>,
        G: Into<String>,
        I: IntoIterator<Item = G>,
    {
        let mut seen = FxHashSet::default();
        let genes = genes
            .into_iter()
            .map(Into::into)
            .filter(|gene: &String| seen.insert(gene.clone()))
            .collect();
        GeneSet {
            name: name.into(),
            genes,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn genes(&self) -> &[String] {
        &self.genes
    }

    /// Number of unique members.
    pub fn len(&self) -> usize {
        self.genes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.genes.is_empty()
    }
}

/// Exclusive size bounds used to filter a [`GeneSetCollection`]: a set is kept when
/// `min < size < max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeBounds {
    min: usize,
    max: usize,
}

impl SizeBounds {
    pub fn new(min: usize, max: usize) -> Result<Self, GseaError> {
        if min >= max {
            return Err(GseaError::InvalidSizeBounds { min, max });
        }
        Ok(SizeBounds { min, max })
    }

    pub fn min(&self) -> usize {
        self.min
    }

    pub fn max(&self) -> usize {
        self.max
    }

    pub fn contains(&self, size: usize) -> bool {
        size > self.min && size < self.max
    }
}

impl Default for SizeBounds {
    fn default() -> Self {
        SizeBounds { min: 15, max: 500 }
    }
}

/// Gene sets keyed by unique pathway name, iterated in insertion order.
#[derive(Debug, Clone, Default)]
pub struct GeneSetCollection {
    sets: Vec<GeneSet>,
    index: FxHashMap<String, usize>,
}

impl GeneSetCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a collection from `(pathway, genes)` pairs, failing on the first repeated name.
    pub fn from_pairs<N, G, S, I>(pairs: I) -> Result<Self, GseaError>
    where
        N: Into<String>,
        G: Into<String>,
        S: IntoIterator<Item = G>,
        I: IntoIterator<Item = (N, S)>,
    {
        let mut collection = Self::new();
        for (name, genes) in pairs {
            collection.insert(name, genes)?;
        }
        Ok(collection)
    }

    pub fn insert<N, G, S>(&mut self, name: N, genes: S) -> Result<(), GseaError>
    where
        N: Into<String>,
        G: Into<String>,
        S: IntoIterator<Item = G>,
    {
        self.push(GeneSet::new(name, genes))
    }

    pub fn push(&mut self, set: GeneSet) -> Result<(), GseaError> {
        if self.index.contains_key(set.name()) {
            return Err(GseaError::DuplicatePathway(set.name().to_string()));
        }
        self.index.insert(set.name().to_string(), self.sets.len());
        self.sets.push(set);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&GeneSet> {
        self.index.get(name).map(|&i| &self.sets[i])
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &GeneSet> {
        self.sets.iter()
    }

    /// Sets whose size lies strictly within `bounds`, in insertion order.
    pub fn filter_by_size(&self, bounds: SizeBounds) -> Vec<&GeneSet> {
        self.sets
            .iter()
            .filter(|set| bounds.contains(set.len()))
            .collect()
    }
}
