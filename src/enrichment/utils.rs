use std::hash::{Hash, Hasher};

use rustc_hash::FxHasher;

/// Indices that order `values` from highest to lowest. Ties keep their input order.
pub(crate) fn descending_order(values: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| {
        values[b]
            .partial_cmp(&values[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    order
}

/// Per gene set seed, so a set's null distribution does not depend on which worker runs it
/// or where it sits in the collection.
pub(crate) fn derive_seed(base_seed: u64, pathway: &str) -> u64 {
    let mut hasher = FxHasher::default();
    base_seed.hash(&mut hasher);
    pathway.hash(&mut hasher);
    hasher.finish()
}

/// `1 - (2 * position + 1) / n`: positive near the top of the list, negative near the bottom.
pub(crate) fn signed_edge(position: usize, n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    1.0 - (2 * position + 1) as f64 / n as f64
}
