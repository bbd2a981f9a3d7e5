//! Multiple testing correction over the p-values of one enrichment run.

use anyhow::{Result, anyhow};
use std::cmp::Ordering;

fn validate_p_values(p_values: &[f64]) -> Result<()> {
    if p_values.is_empty() {
        return Err(anyhow!("Empty p-value array"));
    }

    for (i, &p) in p_values.iter().enumerate() {
        if !(0.0..=1.0).contains(&p) {
            return Err(anyhow!("Invalid p-value at index {}: {}", i, p));
        }
    }
    Ok(())
}

/// Apply Bonferroni correction to p-values
///
/// Each p-value is multiplied by the number of tests and capped at 1.0.
///
/// # Example
/// ```
/// use single_gsea::testing::correction::bonferroni_correction;
///
/// let adjusted = bonferroni_correction(&[0.01, 0.03, 0.05]).unwrap();
/// assert!((adjusted[0] - 0.03).abs() < 1e-12);
/// ```
pub fn bonferroni_correction(p_values: &[f64]) -> Result<Vec<f64>> {
    validate_p_values(p_values)?;
    let n = p_values.len() as f64;
    Ok(p_values.iter().map(|&p| (p * n).min(1.0)).collect())
}

/// Apply the Benjamini-Hochberg procedure for controlling the false discovery rate
///
/// Adjusted values are never smaller than the raw p-values and keep their rank order.
///
/// # Example
/// ```
/// use single_gsea::testing::correction::benjamini_hochberg_correction;
///
/// let adjusted = benjamini_hochberg_correction(&[0.01, 0.03, 0.05]).unwrap();
/// assert!(adjusted.iter().all(|&q| q <= 0.05 + 1e-12));
/// ```
pub fn benjamini_hochberg_correction(p_values: &[f64]) -> Result<Vec<f64>> {
    validate_p_values(p_values)?;
    let n = p_values.len();

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| {
        p_values[a]
            .partial_cmp(&p_values[b])
            .unwrap_or(Ordering::Equal)
    });

    // Step up from the largest p-value, carrying the running minimum
    let mut adjusted = vec![0.0; n];
    let mut current_min: f64 = 1.0;
    for (rank, &idx) in order.iter().enumerate().rev() {
        let candidate = (p_values[idx] * n as f64 / (rank + 1) as f64).min(1.0);
        current_min = current_min.min(candidate);
        adjusted[idx] = current_min;
    }

    Ok(adjusted)
}
