//! Decay model curves and their analytic gradients.
//!
//! Parameter order:
//! - `log_one`: `[a, b]`
//! - `log_two`: `[a, b, c, d]`
//! - `exp_one`: `[a, b, c]`
//! - `exp_two`: `[a, b, c, d, e]`
//!
//! In every two-term model the terms are `(a, b)` and `(c, d)`.

use nc_common::DecayModel;
use nc_math::CurveModel;

/// Below this `|b tau|` the log-model kernel uses its Taylor series.
const SERIES_CUTOFF: f64 = 1e-4;

/// `g(u) = (1 - e^{-u}) / u`.
fn kernel(u: f64) -> f64 {
    if u.abs() < SERIES_CUTOFF {
        1.0 - u / 2.0 + u * u / 6.0 - u * u * u / 24.0
    } else {
        -(-u).exp_m1() / u
    }
}

/// `g'(u) = (e^{-u}(1 + u) - 1) / u^2`.
fn kernel_derivative(u: f64) -> f64 {
    if u.abs() < 1e-3 {
        -0.5 + u / 3.0 - u * u / 8.0 + u * u * u / 30.0
    } else {
        ((-u).exp() * (1.0 + u) - 1.0) / (u * u)
    }
}

/// `a (1 - (1 - e^{-b tau}) / (b tau))`.
pub fn log_one(tau: f64, a: f64, b: f64) -> f64 {
    a * (1.0 - kernel(b * tau))
}

pub fn log_two(tau: f64, a: f64, b: f64, c: f64, d: f64) -> f64 {
    log_one(tau, a, b) + log_one(tau, c, d)
}

/// `a e^{-b x} + c`.
pub fn exp_one(x: f64, a: f64, b: f64, c: f64) -> f64 {
    a * (-b * x).exp() + c
}

/// `a e^{-b x} + c e^{-d x} + e`.
pub fn exp_two(x: f64, a: f64, b: f64, c: f64, d: f64, e: f64) -> f64 {
    a * (-b * x).exp() + c * (-d * x).exp() + e
}

fn log_term_gradient(tau: f64, a: f64, b: f64, out: &mut [f64]) {
    let u = b * tau;
    out[0] = 1.0 - kernel(u);
    out[1] = -a * kernel_derivative(u) * tau;
}

fn exp_term_gradient(x: f64, a: f64, b: f64, out: &mut [f64]) {
    let e = (-b * x).exp();
    out[0] = e;
    out[1] = -a * x * e;
}

/// A [`DecayModel`] as a curve the solver can fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecayCurve {
    pub model: DecayModel,
}

impl DecayCurve {
    pub fn new(model: DecayModel) -> Self {
        Self { model }
    }

    /// Evaluate on every point of `x`.
    pub fn evaluate(&self, x: &[f64], params: &[f64]) -> Vec<f64> {
        x.iter().map(|&xi| self.value(xi, params)).collect()
    }
}

impl CurveModel for DecayCurve {
    fn parameter_count(&self) -> usize {
        self.model.parameter_count()
    }

    fn value(&self, x: f64, p: &[f64]) -> f64 {
        match self.model {
            DecayModel::LogOne => log_one(x, p[0], p[1]),
            DecayModel::LogTwo => log_two(x, p[0], p[1], p[2], p[3]),
            DecayModel::ExpOne => exp_one(x, p[0], p[1], p[2]),
            DecayModel::ExpTwo => exp_two(x, p[0], p[1], p[2], p[3], p[4]),
        }
    }

    fn gradient(&self, x: f64, p: &[f64], out: &mut [f64]) {
        match self.model {
            DecayModel::LogOne => log_term_gradient(x, p[0], p[1], out),
            DecayModel::LogTwo => {
                log_term_gradient(x, p[0], p[1], &mut out[..2]);
                log_term_gradient(x, p[2], p[3], &mut out[2..4]);
            }
            DecayModel::ExpOne => {
                exp_term_gradient(x, p[0], p[1], &mut out[..2]);
                out[2] = 1.0;
            }
            DecayModel::ExpTwo => {
                exp_term_gradient(x, p[0], p[1], &mut out[..2]);
                exp_term_gradient(x, p[2], p[3], &mut out[2..4]);
                out[4] = 1.0;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() <= tol
    }

    #[test]
    fn log_one_limits() {
        // starts at zero, saturates at the amplitude
        assert!(approx_eq(log_one(0.0, 3.0, 0.1), 0.0, 1e-15));
        assert!(approx_eq(log_one(1e6, 3.0, 0.1), 3.0, 1e-4));
        // small-argument slope a b / 2
        assert!(approx_eq(log_one(1e-6, 2.0, 0.5) / 1e-6, 0.5, 1e-6));
    }

    #[test]
    fn kernel_series_is_continuous() {
        for u in [SERIES_CUTOFF * 0.999, SERIES_CUTOFF * 1.001] {
            let exact = -(-u).exp_m1() / u;
            assert!(approx_eq(kernel(u), exact, 1e-14));
        }
        for u in [0.999e-3, 1.001e-3, 0.3, 5.0] {
            let h = 1e-6;
            let numeric = (kernel(u + h) - kernel(u - h)) / (2.0 * h);
            assert!(approx_eq(kernel_derivative(u), numeric, 1e-8), "u = {u}");
        }
    }

    #[test]
    fn gradients_match_finite_differences() {
        let cases: [(DecayModel, Vec<f64>, f64); 4] = [
            (DecayModel::LogOne, vec![2.0, 0.01], 150.0),
            (DecayModel::LogTwo, vec![2.0, 0.01, 0.5, 0.001], 150.0),
            (DecayModel::ExpOne, vec![100.0, 0.02, 5.0], 40.0),
            (DecayModel::ExpTwo, vec![100.0, 0.02, 30.0, 0.002, 5.0], 40.0),
        ];
        for (model, params, x) in cases {
            let curve = DecayCurve::new(model);
            let mut analytic = vec![0.0; params.len()];
            curve.gradient(x, &params, &mut analytic);
            for j in 0..params.len() {
                let h = 1e-7 * params[j].abs().max(1e-3);
                let mut up = params.clone();
                let mut down = params.clone();
                up[j] += h;
                down[j] -= h;
                let numeric = (curve.value(x, &up) - curve.value(x, &down)) / (2.0 * h);
                let tol = 1e-6 * numeric.abs().max(1e-3);
                assert!(
                    approx_eq(analytic[j], numeric, tol),
                    "{model} d/dp{j}: {} vs {}",
                    analytic[j],
                    numeric
                );
            }
        }
    }

    #[test]
    fn two_term_models_are_sums() {
        let x = 25.0;
        assert!(approx_eq(
            log_two(x, 1.0, 0.1, 2.0, 0.01),
            log_one(x, 1.0, 0.1) + log_one(x, 2.0, 0.01),
            1e-15
        ));
        assert!(approx_eq(
            exp_two(x, 10.0, 0.1, 5.0, 0.01, 1.0),
            exp_one(x, 10.0, 0.1, 1.0) + 5.0 * (-0.01f64 * x).exp(),
            1e-12
        ));
        let curve = DecayCurve::new(DecayModel::ExpOne);
        assert_eq!(curve.evaluate(&[0.0, 1.0], &[2.0, 0.0, 1.0]), vec![3.0, 3.0]);
    }
}
