//! Initial-guess heuristics for decay fits.
//!
//! The numerical gradient of the curve is smoothed with a Savitzky-Golay
//! filter and differentiated again; the point of largest `|curvature|`
//! anchors the guess.
//!
//! - Exponential models: the baseline is the mean of the last tenth of the
//!   curve. The rate is the logarithmic gradient at the anchor relative to
//!   that baseline, and the amplitude is the anchor's excess over baseline
//!   carried back to `x = 0`.
//! - Log models: the amplitude is slightly above the largest value and
//!   the rate is found by inverting `log_one` at the anchor. Curvature is
//!   taken against `ln tau` since gate sweeps are usually log-spaced.
//!
//! Two-term guesses repeat the single-term guess with the second term halved.
//!
//! This refines the plain anchor-point guess (amplitude = curve value at the
//! anchor, rate = gradient there). Taken literally, that guess has the wrong
//! units for the rate and underestimates amplitudes far from `x = 0`. The
//! anchor is the same. Only the read-out of amplitude and rate is corrected.

use nc_common::{DecayModel, InputError, Result};
use nc_math::{gradient, SavitzkyGolay};
use tracing::trace;

use super::model::log_one;

/// Fraction of the curve's tail used as the exponential baseline.
const TAIL_FRACTION: f64 = 0.1;

/// Log-model curves rarely reach saturation inside the sweep.
const SATURATION_MARGIN: f64 = 1.05;

/// Index of the largest `|d^2 y / dx^2|` after smoothing the gradient.
fn max_curvature_index(x: &[f64], y: &[f64], filter: &SavitzkyGolay) -> usize {
    let smoothed = filter.smooth(&gradient(x, y));
    let curvature = gradient(x, &smoothed);
    curvature
        .iter()
        .enumerate()
        .filter(|(_, c)| c.is_finite())
        .fold((0, f64::NEG_INFINITY), |best, (i, c)| {
            if c.abs() > best.1 {
                (i, c.abs())
            } else {
                best
            }
        })
        .0
}

fn tail_mean(y: &[f64]) -> f64 {
    let take = ((y.len() as f64 * TAIL_FRACTION).ceil() as usize).clamp(1, y.len());
    y[y.len() - take..].iter().sum::<f64>() / take as f64
}

/// Solve `1 - (1 - e^{-u}) / u = target` for `u > 0` by bisection in `ln u`.
fn invert_log_kernel(target: f64) -> f64 {
    let (mut lo, mut hi) = (1e-8f64.ln(), 1e8f64.ln());
    for _ in 0..200 {
        let mid = 0.5 * (lo + hi);
        if log_one(mid.exp(), 1.0, 1.0) < target {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    (0.5 * (lo + hi)).exp()
}

fn exp_guess(x: &[f64], y: &[f64], filter: &SavitzkyGolay) -> (f64, f64, f64) {
    let baseline = tail_mean(y);
    let idx = max_curvature_index(x, y, filter);
    let smoothed = filter.smooth(&gradient(x, y));
    let excess = y[idx] - baseline;

    let span = (x[x.len() - 1] - x[0]).abs().max(f64::MIN_POSITIVE);
    let mut rate = -smoothed[idx] / excess;
    if !(rate.is_finite() && rate > 0.0) {
        rate = 1.0 / span;
    }
    let mut amplitude = excess * (rate * x[idx]).exp();
    if !amplitude.is_finite() || amplitude == 0.0 {
        amplitude = excess;
    }
    (amplitude, rate, baseline)
}

fn log_guess(x: &[f64], y: &[f64], filter: &SavitzkyGolay) -> (f64, f64) {
    let axis: Vec<f64> = if x.iter().all(|v| *v > 0.0) {
        x.iter().map(|v| v.ln()).collect()
    } else {
        x.to_vec()
    };
    let idx = max_curvature_index(&axis, y, filter);

    let peak = y.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let amplitude = if peak > 0.0 {
        SATURATION_MARGIN * peak
    } else {
        y[idx]
    };
    let ratio = (y[idx] / amplitude).clamp(1e-6, 1.0 - 1e-6);
    let u = invert_log_kernel(ratio);
    let rate = if x[idx] > 0.0 {
        u / x[idx]
    } else {
        u / x.iter().copied().fold(f64::MIN_POSITIVE, f64::max)
    };
    (amplitude, rate)
}

/// Initial parameters for `model` on the curve `(x, y)`.
///
/// `x` must be sorted ascending with at least three points.
pub fn initial_guess(
    model: DecayModel,
    x: &[f64],
    y: &[f64],
    filter: &SavitzkyGolay,
) -> Result<Vec<f64>> {
    if x.len() != y.len() {
        return Err(InputError::LengthMismatch {
            left: "x",
            left_len: x.len(),
            right: "y",
            right_len: y.len(),
        }
        .into());
    }
    if x.len() < 3 {
        return Err(InputError::Other(format!(
            "initial guess needs at least 3 points, got {}",
            x.len()
        ))
        .into());
    }

    let guess = match model {
        DecayModel::LogOne | DecayModel::LogTwo => {
            let (a, b) = log_guess(x, y, filter);
            if model == DecayModel::LogOne {
                vec![a, b]
            } else {
                vec![a, b, a / 2.0, b / 2.0]
            }
        }
        DecayModel::ExpOne | DecayModel::ExpTwo => {
            let (a, b, c) = exp_guess(x, y, filter);
            if model == DecayModel::ExpOne {
                vec![a, b, c]
            } else {
                vec![a, b, a / 2.0, b / 2.0, c]
            }
        }
    };
    trace!(model = %model, ?guess, "initial guess");
    Ok(guess)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fit::model::exp_one;

    fn filter() -> SavitzkyGolay {
        SavitzkyGolay::new(2, 2).unwrap()
    }

    fn rel_close(a: f64, b: f64, rel: f64) -> bool {
        (a - b).abs() <= rel * b.abs()
    }

    #[test]
    fn kernel_inversion_round_trips() {
        for u in [0.01, 0.5, 1.594, 10.0, 300.0] {
            let target = log_one(u, 1.0, 1.0);
            assert!(rel_close(invert_log_kernel(target), u, 1e-6), "u = {u}");
        }
    }

    #[test]
    fn exp_guess_near_truth_for_clean_decay() {
        let x: Vec<f64> = (0..100).map(|i| 5.0 + 10.0 * i as f64).collect();
        let y: Vec<f64> = x.iter().map(|&t| exp_one(t, 500.0, 0.01, 20.0)).collect();
        let g = initial_guess(DecayModel::ExpOne, &x, &y, &filter()).unwrap();
        assert_eq!(g.len(), 3);
        assert!(rel_close(g[1], 0.01, 0.2), "rate {}", g[1]);
        assert!(rel_close(g[0], 500.0, 0.3), "amplitude {}", g[0]);
        assert!(rel_close(g[2], 20.0, 0.2), "baseline {}", g[2]);
    }

    #[test]
    fn two_term_guess_halves_second_term() {
        let x: Vec<f64> = (0..50).map(|i| 1.0 + 4.0 * i as f64).collect();
        let y: Vec<f64> = x.iter().map(|&t| exp_one(t, 100.0, 0.05, 1.0)).collect();
        let g = initial_guess(DecayModel::ExpTwo, &x, &y, &filter()).unwrap();
        assert_eq!(g.len(), 5);
        assert_eq!(g[2], g[0] / 2.0);
        assert_eq!(g[3], g[1] / 2.0);
    }

    #[test]
    fn log_guess_is_positive_and_scaled() {
        let x: Vec<f64> = (0..20).map(|i| 10.0 * 1.4f64.powi(i)).collect();
        let y: Vec<f64> = x.iter().map(|&t| log_one(t, 2.5, 0.004)).collect();
        let g = initial_guess(DecayModel::LogOne, &x, &y, &filter()).unwrap();
        assert!(g[0] > 0.0 && g[1] > 0.0);
        assert!(rel_close(g[0], 2.5, 0.5), "amplitude {}", g[0]);
        assert!(g[1] > 0.0004 && g[1] < 0.04, "rate {}", g[1]);

        let two = initial_guess(DecayModel::LogTwo, &x, &y, &filter()).unwrap();
        assert_eq!(two.len(), 4);
    }

    #[test]
    fn too_few_points_rejected() {
        let err = initial_guess(DecayModel::ExpOne, &[1.0, 2.0], &[3.0, 1.0], &filter());
        assert!(err.is_err());
        let mismatch = initial_guess(DecayModel::ExpOne, &[1.0, 2.0, 3.0], &[3.0], &filter());
        assert_eq!(mismatch.unwrap_err().code(), 14);
    }
}
