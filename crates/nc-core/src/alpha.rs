//! Combined decay constant for a two-exponential Rossi fit.
//!
//! A single exponential `P e^{-alpha t}` matching the two-term curve in both
//! area (`S = p1/r1 + p2/r2`) and initial slope (`D = p1 r1 + p2 r2`) has
//! `alpha^2 = D / S`. Writing `alpha = r1 (1 - R) + r2 R` gives
//!
//! ```text
//! (r2 - r1)^2 R^2 + 2 r1 (r2 - r1) R + r1^2 - D/S = 0
//! ```
//!
//! and exactly one root must lie in `[0, 1]`. The variance of `alpha` is
//! `g^T Sigma g` over the full fit covariance, with
//!
//! ```text
//! d alpha / d p_i = (r_i S - D / r_i) / (2 alpha S^2)
//! d alpha / d r_i = (p_i S + D p_i / r_i^2) / (2 alpha S^2)
//! ```
//!
//! and a zero partial for the offset.

use nc_common::{DecayModel, Error, Result};
use nc_math::{quadratic_form, real_roots, QuadraticRoots};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::fit::FitResult;

/// Slack when testing a root against `[0, 1]`.
const ROOT_TOLERANCE: f64 = 1e-12;

/// Result of combining two decay terms.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CombinedAlpha {
    /// Weight `R` of the second rate.
    pub mixing_fraction: f64,
    pub combined_rate: f64,
    pub variance: f64,
    pub uncertainty: f64,
    /// Set when the propagated variance was negative and clamped.
    pub degraded: bool,
}

/// Area and slope sums.
fn moments(p1: f64, r1: f64, p2: f64, r2: f64) -> (f64, f64) {
    (p1 / r1 + p2 / r2, p1 * r1 + p2 * r2)
}

/// `[d/dp1, d/dr1, d/dp2, d/dr2]` of `alpha`.
pub(crate) fn alpha_gradient(p1: f64, r1: f64, p2: f64, r2: f64) -> [f64; 4] {
    let (s, d) = moments(p1, r1, p2, r2);
    let alpha = (d / s).sqrt();
    let denom = 2.0 * alpha * s * s;
    [
        (r1 * s - d / r1) / denom,
        (p1 * s + d * p1 / (r1 * r1)) / denom,
        (r2 * s - d / r2) / denom,
        (p2 * s + d * p2 / (r2 * r2)) / denom,
    ]
}

/// Combine terms `(p1, r1)` and `(p2, r2)`.
///
/// `covariance` is ordered `[p1, r1, p2, r2]` with an optional trailing
/// offset row and column.
pub fn combine(
    p1: f64,
    r1: f64,
    p2: f64,
    r2: f64,
    covariance: &[Vec<f64>],
) -> Result<CombinedAlpha> {
    if [p1, r1, p2, r2].iter().any(|v| !v.is_finite()) {
        return Err(Error::invalid_input("alpha inputs must be finite"));
    }
    if r1 <= 0.0 || r2 <= 0.0 {
        return Err(Error::invalid_input(format!(
            "decay rates must be positive, got {r1:e} and {r2:e}"
        )));
    }
    let dim = covariance.len();
    if !(dim == 4 || dim == 5) || covariance.iter().any(|row| row.len() != dim) {
        return Err(Error::invalid_input(format!(
            "alpha covariance must be 4x4 or 5x5, got {dim} rows"
        )));
    }
    if r1 == r2 {
        return Err(Error::PhysicallyInvalidRoot {
            detail: format!("equal rates {r1:e} admit no unique mixing fraction"),
        });
    }

    let (s, d) = moments(p1, r1, p2, r2);
    let target = d / s;
    if !(target.is_finite() && target > 0.0) {
        return Err(Error::PhysicallyInvalidRoot {
            detail: format!("slope/area ratio {target:e} is not positive"),
        });
    }

    let delta = r2 - r1;
    let roots = real_roots(delta * delta, 2.0 * r1 * delta, r1 * r1 - target);
    let candidates = match roots {
        QuadraticRoots::Two { .. } | QuadraticRoots::Double { .. } => roots.to_vec(),
        other => {
            return Err(Error::PhysicallyInvalidRoot {
                detail: format!("mixing quadratic has no usable roots ({other:?})"),
            })
        }
    };
    let valid: Vec<f64> = candidates
        .into_iter()
        .filter(|r| (-ROOT_TOLERANCE..=1.0 + ROOT_TOLERANCE).contains(r))
        .collect();
    let mixing_fraction = match valid.as_slice() {
        [r] => r.clamp(0.0, 1.0),
        [] => {
            return Err(Error::PhysicallyInvalidRoot {
                detail: format!("no root in [0, 1] for rates {r1:e}, {r2:e}"),
            })
        }
        _ => {
            return Err(Error::PhysicallyInvalidRoot {
                detail: format!("both roots lie in [0, 1] for rates {r1:e}, {r2:e}"),
            })
        }
    };

    let combined_rate = r1 * (1.0 - mixing_fraction) + r2 * mixing_fraction;
    let mut gradient = alpha_gradient(p1, r1, p2, r2).to_vec();
    gradient.resize(dim, 0.0);
    let variance = quadratic_form(&gradient, covariance);
    let (uncertainty, degraded) = if variance >= 0.0 {
        (variance.sqrt(), false)
    } else {
        (0.0, true)
    };

    debug!(mixing_fraction, combined_rate, uncertainty, degraded, "alpha combined");
    Ok(CombinedAlpha {
        mixing_fraction,
        combined_rate,
        variance,
        uncertainty,
        degraded,
    })
}

/// Combine the two terms of an accepted `exp_two` fit.
pub fn combine_fit(fit: &FitResult) -> Result<CombinedAlpha> {
    if fit.model != DecayModel::ExpTwo {
        return Err(Error::invalid_input(format!(
            "alpha combination needs an exp_two fit, got {}",
            fit.model
        )));
    }
    let p = &fit.parameters;
    combine(p[0], p[1], p[2], p[3], &fit.covariance)
}
