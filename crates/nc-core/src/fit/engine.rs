//! Decay-curve fitting with explicit acceptance.
//!
//! Each call to [`DecayFitEngine::fit`] walks one attempt through
//! `Unfit -> Guessed -> Fitted -> Accepted | Rejected`. Only accepted fits
//! produce a [`FitResult`]; every other exit is an error the caller must
//! handle.
//!
//! Two-term models are canonical: the first term always carries the larger
//! rate. The initial guess is canonicalized before solving and the solution
//! after, so guesses that differ only in term order give identical results.

use std::cmp::Ordering;
use std::fmt;

use nc_common::{DecayModel, Error, InputError, RejectReason, Result};
use nc_config::FitConfig;
use nc_math::{
    levenberg_marquardt, relative_difference, LmConfig, Matrix, SavitzkyGolay, SolverError,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::guess::initial_guess;
use super::model::DecayCurve;
use crate::moments::Estimate;

/// Lifecycle stage of a single fit attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitStage {
    Unfit,
    Guessed,
    Fitted,
    Accepted,
    Rejected,
}

impl fmt::Display for FitStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FitStage::Unfit => "unfit",
            FitStage::Guessed => "guessed",
            FitStage::Fitted => "fitted",
            FitStage::Accepted => "accepted",
            FitStage::Rejected => "rejected",
        };
        f.write_str(s)
    }
}

/// Engine settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitOptions {
    pub solver: LmConfig,
    /// Two-term fits whose rates differ by less than this fraction are
    /// rejected.
    pub degenerate_rate_threshold: f64,
    pub savgol_half_width: usize,
    pub savgol_order: usize,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            solver: LmConfig::default(),
            degenerate_rate_threshold: 0.01,
            savgol_half_width: 2,
            savgol_order: 2,
        }
    }
}

impl From<&FitConfig> for FitOptions {
    fn from(config: &FitConfig) -> Self {
        Self {
            solver: LmConfig {
                max_iterations: config.max_iterations,
                cost_tolerance: config.tolerance,
                step_tolerance: config.tolerance,
                ..LmConfig::default()
            },
            degenerate_rate_threshold: config.degenerate_rate_threshold,
            savgol_half_width: config.savgol_half_width,
            savgol_order: config.savgol_order,
        }
    }
}

/// One decay component of an accepted fit.
///
/// Amplitude, rate and lifetime always travel together; canonical ordering
/// moves whole terms, never individual fields.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecayTerm {
    pub amplitude: Estimate,
    pub rate: Estimate,
    /// `1 / rate`, uncertainty `lifetime * rate_err / rate`.
    pub lifetime: Estimate,
}

impl DecayTerm {
    fn new(amplitude: Estimate, rate: Estimate) -> Self {
        let lifetime = 1.0 / rate.value;
        Self {
            amplitude,
            rate,
            lifetime: Estimate {
                value: lifetime,
                uncertainty: (lifetime * rate.uncertainty / rate.value).abs(),
                degraded: rate.degraded,
            },
        }
    }
}

/// An accepted fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitResult {
    pub model: DecayModel,
    /// Canonical parameter vector.
    pub parameters: Vec<f64>,
    /// Covariance in the same order as `parameters`.
    pub covariance: Matrix,
    /// `sqrt(covariance[i][i])`, zero where the diagonal came out negative.
    pub uncertainties: Vec<f64>,
    /// Decay terms, fastest first.
    pub terms: Vec<DecayTerm>,
    /// Constant offset for exponential models.
    pub offset: Option<Estimate>,
    pub cost: f64,
    pub reduced_chi_square: f64,
    pub iterations: usize,
    pub points: usize,
}

impl FitResult {
    /// Model curve at `x`.
    pub fn evaluate(&self, x: &[f64]) -> Vec<f64> {
        DecayCurve::new(self.model).evaluate(x, &self.parameters)
    }

    /// `y - f(x)` at each point.
    pub fn residuals(&self, x: &[f64], y: &[f64]) -> Vec<f64> {
        self.evaluate(x).iter().zip(y).map(|(f, yi)| yi - f).collect()
    }

    /// The fastest decay term.
    pub fn primary(&self) -> &DecayTerm {
        &self.terms[0]
    }

    /// True if any parameter variance was clamped.
    pub fn degraded(&self) -> bool {
        self.terms.iter().any(|t| t.amplitude.degraded || t.rate.degraded)
            || self.offset.is_some_and(|o| o.degraded)
    }
}

/// Orders two-term parameters by descending rate, then descending amplitude.
fn term_order(params: &[f64]) -> Ordering {
    params[3]
        .total_cmp(&params[1])
        .then_with(|| params[2].total_cmp(&params[0]))
}

/// Parameter permutation that exchanges the two decay terms.
fn swap_permutation(model: DecayModel) -> Vec<usize> {
    let mut perm = vec![2, 3, 0, 1];
    if model.has_offset() {
        perm.push(4);
    }
    perm
}

/// Put a two-term parameter vector in canonical order.
pub fn canonicalize_parameters(model: DecayModel, params: &mut [f64]) -> bool {
    if !model.is_two_term() || term_order(params) != Ordering::Greater {
        return false;
    }
    let perm = swap_permutation(model);
    let swapped: Vec<f64> = perm.iter().map(|&i| params[i]).collect();
    params.copy_from_slice(&swapped);
    true
}

fn permute_covariance(cov: &Matrix, perm: &[usize]) -> Matrix {
    perm.iter()
        .map(|&i| perm.iter().map(|&j| cov[i][j]).collect())
        .collect()
}

fn distinct_count(x: &[f64]) -> usize {
    let mut sorted = x.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted.dedup();
    sorted.len()
}

/// Tracks one attempt and logs each transition.
#[derive(Debug)]
struct FitAttempt {
    model: DecayModel,
    stage: FitStage,
}

impl FitAttempt {
    fn new(model: DecayModel) -> Self {
        Self {
            model,
            stage: FitStage::Unfit,
        }
    }

    fn advance(&mut self, next: FitStage) {
        debug!(model = %self.model, from = %self.stage, to = %next, "fit stage");
        self.stage = next;
    }

    fn reject(&mut self, reason: RejectReason) -> Error {
        self.advance(FitStage::Rejected);
        debug!(model = %self.model, %reason, "fit rejected");
        Error::FitRejected {
            model: self.model.name(),
            reason,
        }
    }

    fn solver_error(&mut self, err: SolverError) -> Error {
        match err {
            SolverError::NotConverged { iterations, cost } => {
                self.advance(FitStage::Rejected);
                debug!(model = %self.model, iterations, cost, "fit did not converge");
                Error::FitNotConverged {
                    model: self.model.name(),
                    iterations,
                }
            }
            SolverError::TooFewPoints { points, params } => {
                self.reject(RejectReason::InsufficientData {
                    points,
                    required: params + 2,
                })
            }
            SolverError::NonFinite("parameters") => self.reject(RejectReason::NonFiniteParameters),
            SolverError::Linalg(_) => self.reject(RejectReason::SingularCovariance),
            other => {
                self.advance(FitStage::Rejected);
                InputError::Other(other.to_string()).into()
            }
        }
    }
}

/// Fits decay models and decides whether the result is usable.
#[derive(Debug, Clone)]
pub struct DecayFitEngine {
    options: FitOptions,
    filter: SavitzkyGolay,
}

impl DecayFitEngine {
    pub fn new(options: FitOptions) -> Result<Self> {
        if !(options.degenerate_rate_threshold >= 0.0 && options.degenerate_rate_threshold < 1.0) {
            return Err(Error::invalid_input(format!(
                "degenerate rate threshold must be in [0, 1), got {}",
                options.degenerate_rate_threshold
            )));
        }
        let filter = SavitzkyGolay::new(options.savgol_half_width, options.savgol_order)
            .map_err(|e| Error::invalid_input(format!("smoothing filter: {e}")))?;
        Ok(Self { options, filter })
    }

    pub fn from_config(config: &FitConfig) -> Result<Self> {
        Self::new(FitOptions::from(config))
    }

    pub fn options(&self) -> &FitOptions {
        &self.options
    }

    /// Unweighted fit of `model` to `(x, y)`.
    ///
    /// Without a `guess` the curvature heuristic provides one.
    pub fn fit(
        &self,
        model: DecayModel,
        x: &[f64],
        y: &[f64],
        guess: Option<&[f64]>,
    ) -> Result<FitResult> {
        self.fit_weighted(model, x, y, None, guess)
    }

    /// Fit with per-point standard deviations `sigma` (weights `1/sigma^2`).
    pub fn fit_weighted(
        &self,
        model: DecayModel,
        x: &[f64],
        y: &[f64],
        sigma: Option<&[f64]>,
        guess: Option<&[f64]>,
    ) -> Result<FitResult> {
        let mut attempt = FitAttempt::new(model);

        if x.len() != y.len() {
            return Err(InputError::LengthMismatch {
                left: "x",
                left_len: x.len(),
                right: "y",
                right_len: y.len(),
            }
            .into());
        }
        if x.iter().chain(y).any(|v| !v.is_finite()) {
            return Err(Error::invalid_input("fit data contains non-finite values"));
        }
        let weights = match sigma {
            Some(s) if s.len() != x.len() => {
                return Err(InputError::LengthMismatch {
                    left: "x",
                    left_len: x.len(),
                    right: "sigma",
                    right_len: s.len(),
                }
                .into());
            }
            Some(s) if s.iter().any(|v| !(v.is_finite() && *v > 0.0)) => {
                return Err(Error::invalid_input("sigma must be finite and positive"));
            }
            Some(s) => Some(s.iter().map(|v| 1.0 / (v * v)).collect::<Vec<f64>>()),
            None => None,
        };

        let points = distinct_count(x);
        if points < model.min_points() {
            return Err(attempt.reject(RejectReason::InsufficientData {
                points,
                required: model.min_points(),
            }));
        }

        let mut start = match guess {
            Some(g) if g.len() != model.parameter_count() => {
                return Err(Error::invalid_input(format!(
                    "{model} expects {} guess parameters, got {}",
                    model.parameter_count(),
                    g.len()
                )));
            }
            Some(g) => g.to_vec(),
            None => initial_guess(model, x, y, &self.filter)?,
        };
        canonicalize_parameters(model, &mut start);
        attempt.advance(FitStage::Guessed);

        let curve = DecayCurve::new(model);
        let solution = levenberg_marquardt(
            &curve,
            x,
            y,
            weights.as_deref(),
            &start,
            &self.options.solver,
        )
        .map_err(|e| attempt.solver_error(e))?;
        attempt.advance(FitStage::Fitted);

        let mut params = solution.params;
        let mut covariance = solution.covariance;
        if canonicalize_parameters(model, &mut params) {
            let perm = swap_permutation(model);
            covariance = covariance.map(|c| permute_covariance(&c, &perm));
        }

        if model.is_two_term() {
            let (first, second) = (params[1], params[3]);
            if relative_difference(first, second) < self.options.degenerate_rate_threshold {
                return Err(attempt.reject(RejectReason::DegenerateRates {
                    first,
                    second,
                    threshold_pct: self.options.degenerate_rate_threshold * 100.0,
                }));
            }
        }
        let Some(covariance) = covariance else {
            return Err(attempt.reject(RejectReason::SingularCovariance));
        };
        if params.iter().any(|v| !v.is_finite()) {
            return Err(attempt.reject(RejectReason::NonFiniteParameters));
        }

        let estimates: Vec<Estimate> = params
            .iter()
            .enumerate()
            .map(|(i, &p)| Estimate::from_variance(p, covariance[i][i]))
            .collect();
        let terms = (0..model.term_count())
            .map(|t| DecayTerm::new(estimates[2 * t], estimates[2 * t + 1]))
            .collect();
        let offset = model.has_offset().then(|| estimates[params.len() - 1]);

        attempt.advance(FitStage::Accepted);
        Ok(FitResult {
            model,
            uncertainties: estimates.iter().map(|e| e.uncertainty).collect(),
            parameters: params,
            covariance,
            terms,
            offset,
            cost: solution.cost,
            reduced_chi_square: solution.reduced_chi_square,
            iterations: solution.iterations,
            points: x.len(),
        })
    }
}
