//! Multiple testing correction for batches of enrichment p-values.

pub mod correction;

/// How raw p-values of one run are turned into adjusted p-values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PValueAdjustment {
    /// Benjamini-Hochberg false discovery rate.
    #[default]
    BenjaminiHochberg,
    /// Bonferroni family-wise error rate.
    Bonferroni,
    /// Adjusted values equal the raw p-values.
    None,
}

impl PValueAdjustment {
    /// Adjust a whole batch at once. An empty batch yields an empty result.
    pub fn apply(&self, p_values: &[f64]) -> anyhow::Result<Vec<f64>> {
        if p_values.is_empty() {
            return Ok(Vec::new());
        }
        match self {
            PValueAdjustment::BenjaminiHochberg => {
                correction::benjamini_hochberg_correction(p_values)
            }
            PValueAdjustment::Bonferroni => correction::bonferroni_correction(p_values),
            PValueAdjustment::None => Ok(p_values.to_vec()),
        }
    }
}
