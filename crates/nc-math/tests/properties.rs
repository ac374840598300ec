//! Property-based tests for nc-math numerical functions.
//!
//! Uses proptest to verify mathematical properties hold across many random inputs.

use nc_math::{
    falling_factorial, invert, levenberg_marquardt, log_factorial, log_gamma, poisson_pmf,
    real_roots, sg_smooth, solve, CurveModel, LmConfig, QuadraticRoots,
};
use proptest::prelude::*;

/// Tolerance for floating point comparisons.
const TOL: f64 = 1e-10;

fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
    if a.is_nan() || b.is_nan() {
        return false;
    }
    (a - b).abs() <= tol.max(tol * a.abs().max(b.abs()))
}

// ============================================================================
// Gamma / factorial properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Gamma(z+1) = z Gamma(z).
    #[test]
    fn log_gamma_recurrence(z in 0.1..50.0f64) {
        let lhs = log_gamma(z + 1.0);
        let rhs = z.ln() + log_gamma(z);
        prop_assert!(approx_eq(lhs, rhs, 1e-8), "z={} lhs={} rhs={}", z, lhs, rhs);
    }

    /// log(n!) - log((n-1)!) = log(n).
    #[test]
    fn log_factorial_step(n in 1u64..10_000) {
        let diff = log_factorial(n) - log_factorial(n - 1);
        prop_assert!(approx_eq(diff, (n as f64).ln(), 1e-8));
    }

    /// k^(n) = k * (k-1)^(n-1).
    #[test]
    fn falling_factorial_recurrence(k in 1u64..500, n in 1u32..5) {
        let lhs = falling_factorial(k, n);
        let rhs = k as f64 * falling_factorial(k - 1, n - 1);
        prop_assert!(approx_eq(lhs, rhs, TOL));
    }

    /// Poisson mean recovered from the pmf.
    #[test]
    fn poisson_mean_recovered(mean in 0.01..20.0f64) {
        let m: f64 = (0..200u64).map(|k| k as f64 * poisson_pmf(k, mean)).sum();
        prop_assert!(approx_eq(m, mean, 1e-9), "mean={} got={}", mean, m);
    }
}

// ============================================================================
// Linear algebra
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    /// Diagonally dominant systems are solved to high accuracy.
    #[test]
    fn solve_residual_small(
        diag in prop::collection::vec(5.0..10.0f64, 3),
        off in prop::collection::vec(-1.0..1.0f64, 9),
        rhs in prop::collection::vec(-10.0..10.0f64, 3),
    ) {
        let a: Vec<Vec<f64>> = (0..3)
            .map(|i| (0..3).map(|j| if i == j { diag[i] } else { off[i * 3 + j] }).collect())
            .collect();
        let x = solve(&a, &rhs).unwrap();
        for i in 0..3 {
            let lhs: f64 = (0..3).map(|j| a[i][j] * x[j]).sum();
            prop_assert!(approx_eq(lhs, rhs[i], 1e-9));
        }
        let inv = invert(&a).unwrap();
        let x2: Vec<f64> = (0..3).map(|i| (0..3).map(|j| inv[i][j] * rhs[j]).sum()).collect();
        for i in 0..3 {
            prop_assert!(approx_eq(x[i], x2[i], 1e-9));
        }
    }
}

// ============================================================================
// Quadratic roots
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    /// Roots built from known factors are recovered.
    #[test]
    fn quadratic_roots_recovered(r1 in -100.0..100.0f64, r2 in -100.0..100.0f64, a in 0.1..10.0f64) {
        prop_assume!((r1 - r2).abs() > 1e-3);
        let roots = real_roots(a, -a * (r1 + r2), a * r1 * r2);
        match roots {
            QuadraticRoots::Two { low, high } => {
                prop_assert!(approx_eq(low, r1.min(r2), 1e-8), "low={} expected={}", low, r1.min(r2));
                prop_assert!(approx_eq(high, r1.max(r2), 1e-8), "high={} expected={}", high, r1.max(r2));
            }
            other => prop_assert!(false, "unexpected {:?}", other),
        }
    }
}

// ============================================================================
// Smoothing and fitting
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Smoothing never changes a constant signal.
    #[test]
    fn smoothing_preserves_constants(c in -1e3..1e3f64, n in 1usize..40, m in 1usize..6) {
        let data = vec![c; n];
        for v in sg_smooth(&data, m, 2) {
            prop_assert!(approx_eq(v, c, 1e-9));
        }
    }
}

struct Exponential;

impl CurveModel for Exponential {
    fn parameter_count(&self) -> usize {
        3
    }
    fn value(&self, x: f64, p: &[f64]) -> f64 {
        p[0] * (-p[1] * x).exp() + p[2]
    }
    fn gradient(&self, x: f64, p: &[f64], out: &mut [f64]) {
        let e = (-p[1] * x).exp();
        out[0] = e;
        out[1] = -p[0] * x * e;
        out[2] = 1.0;
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Noiseless single exponentials are recovered from a 30% perturbed guess.
    #[test]
    fn exponential_recovered(
        amp in 10.0..1000.0f64,
        rate in 0.005..0.05f64,
        base in 0.0..50.0f64,
        jitter in 0.7..1.3f64,
    ) {
        let x: Vec<f64> = (0..60).map(|i| 2.0 + i as f64 * 5.0).collect();
        let y: Vec<f64> = x.iter().map(|v| amp * (-rate * v).exp() + base).collect();
        let guess = [amp * jitter, rate / jitter, base + 1.0];
        let sol = levenberg_marquardt(&Exponential, &x, &y, None, &guess, &LmConfig::default()).unwrap();
        prop_assert!(approx_eq(sol.params[1], rate, 1e-6), "rate {} vs {}", sol.params[1], rate);
        prop_assert!(approx_eq(sol.params[0], amp, 1e-6));
    }
}
