//! Real roots of `a x^2 + b x + c = 0`.

use serde::{Deserialize, Serialize};

/// Classification of the real solutions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum QuadraticRoots {
    /// Two distinct real roots, ascending.
    Two { low: f64, high: f64 },
    /// One repeated real root.
    Double { root: f64 },
    /// `a == 0`: a single root of the linear equation.
    Linear { root: f64 },
    /// Negative discriminant.
    Complex,
    /// `a == b == 0`: no unique solution.
    Degenerate,
}

impl QuadraticRoots {
    /// All real roots as a vector (ascending).
    pub fn to_vec(self) -> Vec<f64> {
        match self {
            QuadraticRoots::Two { low, high } => vec![low, high],
            QuadraticRoots::Double { root } | QuadraticRoots::Linear { root } => vec![root],
            QuadraticRoots::Complex | QuadraticRoots::Degenerate => Vec::new(),
        }
    }
}

/// Solve with the cancellation-free form `q = -(b + sign(b) sqrt(disc)) / 2`,
/// roots `q / a` and `c / q`.
pub fn real_roots(a: f64, b: f64, c: f64) -> QuadraticRoots {
    let scale = a.abs().max(b.abs()).max(c.abs());
    if scale == 0.0 || !scale.is_finite() {
        return QuadraticRoots::Degenerate;
    }
    if a.abs() <= f64::EPSILON * scale {
        if b.abs() <= f64::EPSILON * scale {
            return QuadraticRoots::Degenerate;
        }
        return QuadraticRoots::Linear { root: -c / b };
    }

    let disc = b * b - 4.0 * a * c;
    let tol = 4.0 * f64::EPSILON * (b * b).max((4.0 * a * c).abs());
    if disc < -tol {
        return QuadraticRoots::Complex;
    }
    if disc.abs() <= tol {
        return QuadraticRoots::Double {
            root: -b / (2.0 * a),
        };
    }

    let sqrt_disc = disc.sqrt();
    let q = -0.5 * (b + b.signum() * sqrt_disc);
    // disc > tol >= 0 here, so q != 0
    let (r1, r2) = (q / a, c / q);
    QuadraticRoots::Two {
        low: r1.min(r2),
        high: r1.max(r2),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_roots() {
        assert_eq!(
            real_roots(1.0, -3.0, 2.0),
            QuadraticRoots::Two { low: 1.0, high: 2.0 }
        );
    }

    #[test]
    fn cancellation_free_small_root() {
        // x^2 - 1e8 x + 1 = 0 has a root near 1e-8
        let roots = real_roots(1.0, -1e8, 1.0).to_vec();
        assert!((roots[0] - 1e-8).abs() / 1e-8 < 1e-12);
    }

    #[test]
    fn double_root() {
        assert_eq!(
            real_roots(1.0, -2.0, 1.0),
            QuadraticRoots::Double { root: 1.0 }
        );
    }

    #[test]
    fn complex_and_degenerate() {
        assert_eq!(real_roots(1.0, 0.0, 1.0), QuadraticRoots::Complex);
        assert_eq!(real_roots(0.0, 0.0, 1.0), QuadraticRoots::Degenerate);
        assert_eq!(real_roots(0.0, 2.0, -4.0), QuadraticRoots::Linear { root: 2.0 });
    }

    #[test]
    fn symmetric_roots_with_zero_b() {
        let roots = real_roots(2.0, 0.0, -8.0).to_vec();
        assert_eq!(roots, vec![-2.0, 2.0]);
    }
}
