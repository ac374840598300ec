//! Factorial moments and Feynman statistics of a gate-count histogram.
//!
//! With `F_n(k) = k (k-1) ... (k-n+1)` and `N` gates, the factorial moment
//! is `C_n = sum_k F_n(k) f[k] / N`. The statistics derived here are
//!
//! - `Var = C_2 + C_1 - C_1^2`, `VTM = Var / C_1`, `Y = VTM - 1`
//! - `Y1 = C_1 / T`, `Y2 = (C_2 - C_1^2) / (2T)`, `R2 = Y2 / Y1`
//! - `Ym = C_1 (C_2 / C_1^2 - 1)`
//!
//! Uncertainties come from the sampling variances of the moment estimates,
//! using `F_1 F_2 = F_3 + 2F_2` and `F_2^2 = F_4 + 4F_3 + 2F_2`:
//!
//! - `N Var(C_1) = C_2 + C_1 - C_1^2`
//! - `N Var(C_2) = C_4 + 4C_3 + 2C_2 - C_2^2`
//! - `N Cov(C_1, C_2) = C_3 + 2C_2 - C_1 C_2`
//!
//! `Y`, `Y2` and `R2` propagate the full 2x2 covariance. `Ym` is the
//! reduced-moment form and propagates the diagonal terms only.
//!
//! `Ym` reduces algebraically to `C_2 / C_1 - C_1`, so its value always
//! equals `Y`. The two differ only in the uncertainty: `Ym` drops the
//! `Cov(C_1, C_2)` term.

use nc_common::{FeynmanHistogram, InputError, Result};
use nc_math::{compensated_sum, factorial, falling_factorial, poisson_pmf};
use serde::{Deserialize, Serialize};

/// A value with a one-sigma uncertainty.
///
/// `degraded` marks values whose variance estimate came out negative
/// (small-sample noise); the uncertainty is then clamped to zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Estimate {
    pub value: f64,
    pub uncertainty: f64,
    #[serde(default)]
    pub degraded: bool,
}

impl Estimate {
    pub fn new(value: f64, uncertainty: f64) -> Self {
        Self {
            value,
            uncertainty,
            degraded: false,
        }
    }

    /// Build from a variance, clamping a negative variance to zero.
    pub fn from_variance(value: f64, variance: f64) -> Self {
        if variance >= 0.0 {
            Self::new(value, variance.sqrt())
        } else {
            Self {
                value,
                uncertainty: 0.0,
                degraded: true,
            }
        }
    }

    pub fn relative_uncertainty(&self) -> f64 {
        self.uncertainty / self.value.abs()
    }
}

/// Factorial moment `C_n` of a histogram, for any order.
pub fn factorial_moment(hist: &FeynmanHistogram, n: u32) -> Result<f64> {
    let gates = hist.total_gates();
    if gates == 0 {
        return Err(InputError::MalformedHistogram("histogram has no gates".into()).into());
    }
    let sum = compensated_sum(
        hist.frequency()
            .iter()
            .enumerate()
            .map(|(k, &f)| falling_factorial(k as u64, n) * f as f64),
    );
    Ok(sum / gates as f64)
}

/// The first four factorial moments of a histogram.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Moments {
    pub gates: u64,
    /// `C_1..C_4`.
    pub factorial: [f64; 4],
}

impl Moments {
    pub fn from_histogram(hist: &FeynmanHistogram) -> Result<Self> {
        let mut factorial = [0.0; 4];
        for (n, slot) in factorial.iter_mut().enumerate() {
            *slot = factorial_moment(hist, n as u32 + 1)?;
        }
        Ok(Self {
            gates: hist.total_gates(),
            factorial,
        })
    }

    /// `C_n` for `n` in `1..=4`.
    pub fn c(&self, n: usize) -> f64 {
        self.factorial[n - 1]
    }

    pub fn mean(&self) -> f64 {
        self.c(1)
    }

    pub fn variance(&self) -> f64 {
        let c1 = self.c(1);
        self.c(2) + c1 - c1 * c1
    }

    /// `Var / Mean`, `None` when the mean is zero.
    pub fn variance_to_mean(&self) -> Option<f64> {
        (self.c(1) > 0.0).then(|| self.variance() / self.c(1))
    }

    /// Reduced factorial moment `C_n / C_1^n`, `None` when `C_1 == 0`.
    pub fn reduced(&self, n: usize) -> Option<f64> {
        let c1 = self.c(1);
        (c1 > 0.0).then(|| self.c(n) / c1.powi(n as i32))
    }

    /// Binomial moment `m_n = C_n / n!`.
    pub fn binomial(&self, n: usize) -> f64 {
        self.c(n) / factorial(n as u32)
    }

    fn var_c1(&self) -> f64 {
        self.variance() / self.gates as f64
    }

    fn var_c2(&self) -> f64 {
        let c2 = self.c(2);
        (self.c(4) + 4.0 * self.c(3) + 2.0 * c2 - c2 * c2) / self.gates as f64
    }

    fn cov_c1_c2(&self) -> f64 {
        (self.c(3) + 2.0 * self.c(2) - self.c(1) * self.c(2)) / self.gates as f64
    }

    /// `g^T Sigma g` over `(C_1, C_2)`.
    fn propagate(&self, d_c1: f64, d_c2: f64, with_covariance: bool) -> f64 {
        let mut var = d_c1 * d_c1 * self.var_c1() + d_c2 * d_c2 * self.var_c2();
        if with_covariance {
            var += 2.0 * d_c1 * d_c2 * self.cov_c1_c2();
        }
        var
    }
}

/// All Feynman statistics for one gate width.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeynmanStatistics {
    pub gatewidth: f64,
    pub moments: Moments,
    pub mean: f64,
    pub variance: f64,
    pub variance_to_mean: Option<f64>,
    /// Reduced factorial moments `C_n / C_1^n`, `n = 1..=4`.
    pub reduced: Option<[f64; 4]>,
    /// Binomial moments `C_n / n!`, `n = 1..=4`.
    pub binomial: [f64; 4],
    pub y: Option<Estimate>,
    pub y1: Estimate,
    pub y2: Estimate,
    pub r2: Option<Estimate>,
    pub ym: Option<Estimate>,
}

impl FeynmanStatistics {
    /// True if any reported uncertainty was clamped.
    pub fn degraded(&self) -> bool {
        [Some(self.y1), Some(self.y2), self.y, self.r2, self.ym]
            .iter()
            .flatten()
            .any(|e| e.degraded)
    }
}

/// Derives moments and Feynman statistics from histograms.
#[derive(Debug, Clone, Copy, Default)]
pub struct MomentAnalyzer;

impl MomentAnalyzer {
    pub fn analyze(&self, hist: &FeynmanHistogram) -> Result<FeynmanStatistics> {
        let m = Moments::from_histogram(hist)?;
        let t = hist.gatewidth();
        let (c1, c2) = (m.c(1), m.c(2));

        let y1 = Estimate::from_variance(c1 / t, m.var_c1() / (t * t));
        let y2 = Estimate::from_variance(
            (c2 - c1 * c1) / (2.0 * t),
            m.propagate(-c1 / t, 1.0 / (2.0 * t), true),
        );

        let (y, r2, ym, reduced) = if c1 > 0.0 {
            let y = Estimate::from_variance(
                c2 / c1 - c1,
                m.propagate(-c2 / (c1 * c1) - 1.0, 1.0 / c1, true),
            );
            let r2 = Estimate::from_variance(
                (c2 - c1 * c1) / (2.0 * c1),
                m.propagate(-c2 / (2.0 * c1 * c1) - 0.5, 1.0 / (2.0 * c1), true),
            );
            let nu2 = c2 / (c1 * c1);
            let ym = Estimate::from_variance(
                c1 * (nu2 - 1.0),
                m.propagate(-c2 / (c1 * c1) - 1.0, 1.0 / c1, false),
            );
            let reduced = [1, 2, 3, 4].map(|n| m.reduced(n).unwrap_or(f64::NAN));
            (Some(y), Some(r2), Some(ym), Some(reduced))
        } else {
            (None, None, None, None)
        };

        Ok(FeynmanStatistics {
            gatewidth: t,
            moments: m,
            mean: c1,
            variance: m.variance(),
            variance_to_mean: m.variance_to_mean(),
            reduced,
            binomial: [m.binomial(1), m.binomial(2), m.binomial(3), m.binomial(4)],
            y,
            y1,
            y2,
            r2,
            ym,
        })
    }
}

/// Expected gate frequencies for an uncorrelated (Poisson) source with the
/// histogram's mean, over the histogram's count range.
pub fn poisson_reference(hist: &FeynmanHistogram) -> Result<Vec<f64>> {
    let mean = factorial_moment(hist, 1)?;
    let gates = hist.total_gates() as f64;
    Ok((0..hist.frequency().len())
        .map(|k| gates * poisson_pmf(k as u64, mean))
        .collect())
}

/// `frequency - poisson_reference`, the correlated excess per count.
pub fn poisson_excess(hist: &FeynmanHistogram) -> Result<Vec<f64>> {
    let reference = poisson_reference(hist)?;
    Ok(hist
        .frequency()
        .iter()
        .zip(reference)
        .map(|(&f, r)| f as f64 - r)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() <= tol
    }

    fn hist(frequency: Vec<u64>) -> FeynmanHistogram {
        FeynmanHistogram::new(10.0, frequency).unwrap()
    }

    #[test]
    fn factorial_moments_by_hand() {
        // counts 0,1,2,3 once each: C1 = 6/4, C2 = (2 + 6)/4, C3 = 6/4
        let m = Moments::from_histogram(&hist(vec![1, 1, 1, 1])).unwrap();
        assert!(approx_eq(m.c(1), 1.5, 1e-12));
        assert!(approx_eq(m.c(2), 2.0, 1e-12));
        assert!(approx_eq(m.c(3), 1.5, 1e-12));
        assert!(approx_eq(m.c(4), 0.0, 1e-12));
        assert!(approx_eq(m.binomial(2), 1.0, 1e-12));
        // mean 1.5, E[k^2] = 14/4, var = 3.5 - 2.25
        assert!(approx_eq(m.variance(), 1.25, 1e-12));
    }

    #[test]
    fn poisson_like_histogram_has_small_y() {
        // Poisson(2) frequencies scaled to 10000 gates
        let freq: Vec<u64> = (0..15)
            .map(|k| (10_000.0 * poisson_pmf(k, 2.0)).round() as u64)
            .collect();
        let stats = MomentAnalyzer.analyze(&hist(freq)).unwrap();
        assert!(approx_eq(stats.mean, 2.0, 0.01));
        let y = stats.y.unwrap();
        assert!(y.value.abs() < 0.01, "Y = {}", y.value);
        assert!(approx_eq(stats.variance_to_mean.unwrap(), 1.0, 0.01));
        // R2 = Y / 2 and Ym = Y in value
        assert!(approx_eq(stats.r2.unwrap().value, y.value / 2.0, 1e-12));
        assert!(approx_eq(stats.ym.unwrap().value, y.value, 1e-12));
    }

    #[test]
    fn ym_equals_y_without_covariance_term() {
        let stats = MomentAnalyzer.analyze(&hist(vec![40, 30, 20, 10])).unwrap();
        let (y, ym) = (stats.y.unwrap(), stats.ym.unwrap());
        assert!(approx_eq(ym.value, y.value, 1e-12));

        let m = stats.moments;
        let (c1, c2) = (m.c(1), m.c(2));
        let (d_c1, d_c2) = (-c2 / (c1 * c1) - 1.0, 1.0 / c1);
        let covariance_term = 2.0 * d_c1 * d_c2 * m.cov_c1_c2();
        assert!(covariance_term.abs() > 1e-6);
        assert!(approx_eq(
            ym.uncertainty.powi(2),
            y.uncertainty.powi(2) - covariance_term,
            1e-12
        ));
    }

    #[test]
    fn rates_scale_with_gate_width() {
        let h = FeynmanHistogram::new(4.0, vec![2, 3, 4, 1]).unwrap();
        let stats = MomentAnalyzer.analyze(&h).unwrap();
        let m = stats.moments;
        assert!(approx_eq(stats.y1.value, m.c(1) / 4.0, 1e-12));
        assert!(approx_eq(
            stats.y2.value,
            (m.c(2) - m.c(1) * m.c(1)) / 8.0,
            1e-12
        ));
        let r2 = stats.r2.unwrap().value;
        assert!(approx_eq(r2, stats.y2.value / stats.y1.value, 1e-12));
    }

    #[test]
    fn uncertainty_matches_finite_difference_on_y() {
        // Y = C2/C1 - C1; compare analytic gradient against central differences
        let h = hist(vec![50, 80, 60, 30, 10, 5]);
        let m = Moments::from_histogram(&h).unwrap();
        let (c1, c2) = (m.c(1), m.c(2));
        let f = |a: f64, b: f64| b / a - a;
        let eps = 1e-6;
        let d1 = (f(c1 + eps, c2) - f(c1 - eps, c2)) / (2.0 * eps);
        let d2 = (f(c1, c2 + eps) - f(c1, c2 - eps)) / (2.0 * eps);
        let expected = m.propagate(d1, d2, true).sqrt();
        let y = MomentAnalyzer.analyze(&h).unwrap().y.unwrap();
        assert!(approx_eq(y.uncertainty, expected, 1e-6 * expected));
        assert!(!y.degraded);
    }

    #[test]
    fn zero_mean_is_undefined_not_a_crash() {
        let stats = MomentAnalyzer.analyze(&hist(vec![7])).unwrap();
        assert_eq!(stats.mean, 0.0);
        assert!(stats.y.is_none());
        assert!(stats.r2.is_none());
        assert!(stats.reduced.is_none());
        assert!(stats.variance_to_mean.is_none());
        assert_eq!(stats.y1.value, 0.0);
    }

    #[test]
    fn negative_variance_is_clamped_and_flagged() {
        let e = Estimate::from_variance(1.0, -1e-9);
        assert_eq!(e.uncertainty, 0.0);
        assert!(e.degraded);
        let ok = Estimate::from_variance(1.0, 4.0);
        assert_eq!(ok.uncertainty, 2.0);
        assert!(!ok.degraded);
    }

    #[test]
    fn deterministic_counts_have_zero_uncertainty() {
        // every gate holds exactly 2 events, so every sampling variance is 0
        let stats = MomentAnalyzer.analyze(&hist(vec![0, 0, 100])).unwrap();
        assert_eq!(stats.y2.uncertainty, 0.0);
        assert!(!stats.degraded());
        // sub-Poisson: Y = C2/C1 - C1 = -1
        assert!(approx_eq(stats.y.unwrap().value, -1.0, 1e-12));
    }

    #[test]
    fn empty_histogram_rejected() {
        let err = Moments::from_histogram(&hist(vec![0, 0])).unwrap_err();
        assert_eq!(err.code(), 15);
    }

    #[test]
    fn poisson_reference_sums_to_gates_and_excess_is_small() {
        let freq: Vec<u64> = (0..20)
            .map(|k| (1e5 * poisson_pmf(k, 3.0)).round() as u64)
            .collect();
        let h = hist(freq);
        let reference = poisson_reference(&h).unwrap();
        let total: f64 = reference.iter().sum();
        assert!(approx_eq(total, h.total_gates() as f64, 1.0));
        let excess = poisson_excess(&h).unwrap();
        assert!(excess.iter().all(|e| e.abs() < 5.0));
    }
}
