//! Combination of one rate measured several times.

use nc_common::{Error, Result};
use nc_math::compensated_sum;
use serde::{Deserialize, Serialize};

use crate::moments::Estimate;

/// Four views of a repeated measurement.
///
/// They answer different questions, so all four are reported:
/// `propagated_uncertainty` is the statistical precision of the weighted
/// mean, `sample_std_dev` the empirical scatter of the inputs and
/// `mean_uncertainty` their average quoted precision.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CombinedRate {
    /// Inverse-variance weighted mean.
    pub weighted_mean: f64,
    /// `1 / sqrt(sum w_i)`.
    pub propagated_uncertainty: f64,
    /// Sample standard deviation (`n - 1`); `None` for a single input.
    pub sample_std_dev: Option<f64>,
    pub mean_uncertainty: f64,
    pub count: usize,
}

impl CombinedRate {
    /// The weighted mean with its propagated uncertainty.
    pub fn estimate(&self) -> Estimate {
        Estimate::new(self.weighted_mean, self.propagated_uncertainty)
    }
}

/// Plain mean and `n - 1` sample standard deviation of the values.
fn scatter(estimates: &[Estimate]) -> (f64, Option<f64>) {
    let n = estimates.len();
    let mean = compensated_sum(estimates.iter().map(|e| e.value)) / n as f64;
    let sample_std_dev = (n > 1).then(|| {
        let ss = compensated_sum(estimates.iter().map(|e| (e.value - mean).powi(2)));
        (ss / (n - 1) as f64).sqrt()
    });
    (mean, sample_std_dev)
}

/// Combine independent estimates of the same rate.
///
/// Every uncertainty must be finite and strictly positive; a zero
/// uncertainty would carry infinite weight.
pub fn combine_rates(estimates: &[Estimate]) -> Result<CombinedRate> {
    if estimates.is_empty() {
        return Err(Error::invalid_input("no rates to combine"));
    }
    if let Some((i, e)) = estimates
        .iter()
        .enumerate()
        .find(|(_, e)| !(e.value.is_finite() && e.uncertainty.is_finite() && e.uncertainty > 0.0))
    {
        return Err(Error::invalid_input(format!(
            "rate {i} has value {} and uncertainty {}; uncertainties must be finite and positive",
            e.value, e.uncertainty
        )));
    }

    let n = estimates.len();
    let weights: Vec<f64> = estimates
        .iter()
        .map(|e| 1.0 / (e.uncertainty * e.uncertainty))
        .collect();
    let weight_sum = compensated_sum(weights.iter().copied());
    let weighted_mean =
        compensated_sum(estimates.iter().zip(&weights).map(|(e, w)| e.value * w)) / weight_sum;
    let (_, sample_std_dev) = scatter(estimates);

    Ok(CombinedRate {
        weighted_mean,
        propagated_uncertainty: 1.0 / weight_sum.sqrt(),
        sample_std_dev,
        mean_uncertainty: compensated_sum(estimates.iter().map(|e| e.uncertainty)) / n as f64,
        count: n,
    })
}

/// Equal-weight combination for estimates that cannot carry
/// inverse-variance weights (zero or clamped uncertainties).
///
/// `weighted_mean` is the plain mean and `propagated_uncertainty` is
/// `sqrt(sum sigma_i^2) / n`. Uncertainties must be finite and non-negative.
pub fn average_rates(estimates: &[Estimate]) -> Result<CombinedRate> {
    if estimates.is_empty() {
        return Err(Error::invalid_input("no rates to average"));
    }
    if let Some((i, e)) = estimates
        .iter()
        .enumerate()
        .find(|(_, e)| !(e.value.is_finite() && e.uncertainty.is_finite() && e.uncertainty >= 0.0))
    {
        return Err(Error::invalid_input(format!(
            "rate {i} has value {} and uncertainty {}; both must be finite",
            e.value, e.uncertainty
        )));
    }

    let n = estimates.len();
    let (mean, sample_std_dev) = scatter(estimates);
    let sum_sq = compensated_sum(estimates.iter().map(|e| e.uncertainty * e.uncertainty));
    Ok(CombinedRate {
        weighted_mean: mean,
        propagated_uncertainty: sum_sq.sqrt() / n as f64,
        sample_std_dev,
        mean_uncertainty: compensated_sum(estimates.iter().map(|e| e.uncertainty)) / n as f64,
        count: n,
    })
}
