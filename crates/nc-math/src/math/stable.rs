//! Numerically stable primitives for counting statistics.

use std::f64::consts::PI;

const LOG_SQRT_2PI: f64 = 0.918_938_533_204_672_8; // 0.5 * ln(2*pi)
const LANCZOS_G: f64 = 7.0;
#[allow(clippy::excessive_precision)] // These are published numerical constants
const LANCZOS_COEFFS: [f64; 9] = [
    0.999_999_999_999_809_93,
    676.520_368_121_885_1,
    -1_259.139_216_722_402_8,
    771.323_428_777_653_1,
    -176.615_029_162_140_59,
    12.507_343_278_686_905,
    -0.138_571_095_265_720_12,
    9.984_369_578_019_571_6e-6,
    1.505_632_735_149_311_6e-7,
];

/// Natural log of the Gamma function (log |Gamma(z)|).
///
/// Uses a Lanczos approximation with reflection for z < 0.5.
pub fn log_gamma(z: f64) -> f64 {
    if z.is_nan() || z == f64::NEG_INFINITY {
        return f64::NAN;
    }
    if z == f64::INFINITY {
        return f64::INFINITY;
    }
    if z <= 0.0 && (z - z.round()).abs() < 1e-15 {
        return f64::NAN;
    }
    if z < 0.5 {
        let sin_pi = (PI * z).sin();
        if sin_pi == 0.0 {
            return f64::NAN;
        }
        return PI.ln() - sin_pi.abs().ln() - log_gamma(1.0 - z);
    }

    let z_minus = z - 1.0;
    let mut x = LANCZOS_COEFFS[0];
    for (i, coeff) in LANCZOS_COEFFS.iter().enumerate().skip(1) {
        x += coeff / (z_minus + i as f64);
    }
    let t = z_minus + LANCZOS_G + 0.5;
    LOG_SQRT_2PI + (z_minus + 0.5) * t.ln() - t + x.ln()
}

/// log(n!) using the Gamma function.
pub fn log_factorial(n: u64) -> f64 {
    if n <= 1 {
        return 0.0;
    }
    log_gamma((n as f64) + 1.0)
}

/// n! as a float. Exact for n <= 20, Lanczos beyond.
pub fn factorial(n: u32) -> f64 {
    if n <= 20 {
        return (1..=u64::from(n)).product::<u64>() as f64;
    }
    log_factorial(u64::from(n)).exp()
}

/// Falling factorial `k (k-1) ... (k-n+1)`.
///
/// Zero whenever `k < n`; one for `n == 0`.
pub fn falling_factorial(k: u64, n: u32) -> f64 {
    let n = u64::from(n);
    if k < n {
        return 0.0;
    }
    let mut acc = 1.0;
    for j in 0..n {
        acc *= (k - j) as f64;
    }
    acc
}

/// Log of the Poisson probability mass `P(k; mean)`.
///
/// `mean == 0` puts all mass on `k == 0`.
pub fn poisson_log_pmf(k: u64, mean: f64) -> f64 {
    if mean.is_nan() || mean < 0.0 {
        return f64::NAN;
    }
    if mean == 0.0 {
        return if k == 0 { 0.0 } else { f64::NEG_INFINITY };
    }
    (k as f64) * mean.ln() - mean - log_factorial(k)
}

/// Poisson probability mass `P(k; mean)`.
pub fn poisson_pmf(k: u64, mean: f64) -> f64 {
    poisson_log_pmf(k, mean).exp()
}

/// Neumaier-compensated sum.
///
/// Histogram sums span many orders of magnitude across bins; plain
/// accumulation loses the small tail bins.
pub fn compensated_sum<I>(values: I) -> f64
where
    I: IntoIterator<Item = f64>,
{
    let mut sum = 0.0;
    let mut carry = 0.0;
    for v in values {
        let t = sum + v;
        if sum.abs() >= v.abs() {
            carry += (sum - t) + v;
        } else {
            carry += (v - t) + sum;
        }
        sum = t;
    }
    sum + carry
}

/// Relative difference `|a - b| / max(|a|, |b|)`; zero when both are zero.
pub fn relative_difference(a: f64, b: f64) -> f64 {
    let scale = a.abs().max(b.abs());
    if scale == 0.0 {
        return 0.0;
    }
    (a - b).abs() / scale
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
        if a.is_nan() || b.is_nan() {
            return false;
        }
        (a - b).abs() <= tol
    }

    #[test]
    fn log_gamma_known_values() {
        assert!(approx_eq(log_gamma(1.0), 0.0, 1e-12));
        assert!(approx_eq(log_gamma(0.5), 0.5 * PI.ln(), 1e-10));
        assert!(approx_eq(log_gamma(5.0), 24.0f64.ln(), 1e-10));
    }

    #[test]
    fn log_gamma_negative_integer_is_nan() {
        assert!(log_gamma(-2.0).is_nan());
    }

    #[test]
    fn factorial_exact_and_large() {
        assert_eq!(factorial(0), 1.0);
        assert_eq!(factorial(5), 120.0);
        assert_eq!(factorial(20), 2_432_902_008_176_640_000.0);
        let f25 = factorial(25);
        assert!((f25 / 1.551_121_004_333_098_6e25 - 1.0).abs() < 1e-9);
    }

    #[test]
    fn falling_factorial_values() {
        assert_eq!(falling_factorial(5, 0), 1.0);
        assert_eq!(falling_factorial(5, 1), 5.0);
        assert_eq!(falling_factorial(5, 2), 20.0);
        assert_eq!(falling_factorial(5, 3), 60.0);
        assert_eq!(falling_factorial(2, 3), 0.0);
        assert_eq!(falling_factorial(0, 1), 0.0);
    }

    #[test]
    fn poisson_pmf_sums_to_one() {
        let mean = 3.7;
        let total: f64 = (0..60).map(|k| poisson_pmf(k, mean)).sum();
        assert!(approx_eq(total, 1.0, 1e-12));
    }

    #[test]
    fn poisson_zero_mean() {
        assert_eq!(poisson_pmf(0, 0.0), 1.0);
        assert_eq!(poisson_pmf(3, 0.0), 0.0);
        assert!(poisson_log_pmf(1, -1.0).is_nan());
    }

    #[test]
    fn compensated_sum_recovers_small_terms() {
        let mut values = vec![1e16];
        values.extend(std::iter::repeat(1.0).take(1000));
        values.push(-1e16);
        assert_eq!(compensated_sum(values), 1000.0);
    }

    #[test]
    fn relative_difference_basic() {
        assert_eq!(relative_difference(0.0, 0.0), 0.0);
        assert!(approx_eq(relative_difference(1.0, 0.99), 0.01, 1e-12));
        assert!(approx_eq(relative_difference(-2.0, 2.0), 2.0, 1e-12));
    }
}
