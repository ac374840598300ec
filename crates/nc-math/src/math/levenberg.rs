//! Levenberg-Marquardt nonlinear least squares.
//!
//! Minimizes `sum_i w_i (y_i - f(x_i; p))^2` for a one-dimensional model
//! with an analytic Jacobian. The damping term uses Marquardt's diagonal
//! scaling so parameters of very different magnitude (amplitudes in
//! counts, rates in 1/ns) share one trust region.
//!
//! Covariance follows the usual unweighted-fit convention: the inverse of
//! `J^T W J` scaled by the residual variance `SSR / (n - p)`.

use super::linalg::{invert, solve, LinalgError, Matrix};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A parametric curve `f(x; p)` with its gradient in `p`.
pub trait CurveModel {
    /// Number of free parameters.
    fn parameter_count(&self) -> usize;

    /// Evaluate `f(x; params)`.
    fn value(&self, x: f64, params: &[f64]) -> f64;

    /// Write `df/dp_j` at `x` into `out` (length `parameter_count`).
    fn gradient(&self, x: f64, params: &[f64], out: &mut [f64]);
}

/// Solver configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LmConfig {
    /// Maximum accepted-step iterations.
    pub max_iterations: usize,
    /// Relative cost reduction below which the fit has converged.
    pub cost_tolerance: f64,
    /// Relative parameter step below which the fit has converged.
    pub step_tolerance: f64,
    /// Starting damping factor.
    pub initial_damping: f64,
    /// Damping ceiling; exceeding it means no descent direction remains.
    pub max_damping: f64,
}

impl Default for LmConfig {
    fn default() -> Self {
        Self {
            max_iterations: 500,
            cost_tolerance: 1e-12,
            step_tolerance: 1e-12,
            initial_damping: 1e-3,
            max_damping: 1e16,
        }
    }
}

/// Solver output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LmSolution {
    /// Best-fit parameters.
    pub params: Vec<f64>,
    /// Parameter covariance, `None` when `J^T J` is singular.
    pub covariance: Option<Matrix>,
    /// Weighted sum of squared residuals.
    pub cost: f64,
    /// `cost / (n - p)`.
    pub reduced_chi_square: f64,
    /// Accepted iterations.
    pub iterations: usize,
}

/// Errors from the solver.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SolverError {
    #[error("x has {x} points but y has {y}")]
    LengthMismatch { x: usize, y: usize },
    #[error("initial guess has {got} parameters, model expects {expected}")]
    GuessLength { expected: usize, got: usize },
    #[error("{points} points cannot constrain {params} parameters")]
    TooFewPoints { points: usize, params: usize },
    #[error("non-finite value in {0}")]
    NonFinite(&'static str),
    #[error("did not converge after {iterations} iterations (cost {cost:e})")]
    NotConverged { iterations: usize, cost: f64 },
    #[error("linear algebra failure: {0}")]
    Linalg(#[from] LinalgError),
}

struct Workspace {
    jacobian: Vec<Vec<f64>>,
    residuals: Vec<f64>,
}

fn weighted_cost<M: CurveModel>(
    model: &M,
    x: &[f64],
    y: &[f64],
    weights: Option<&[f64]>,
    params: &[f64],
) -> f64 {
    x.iter()
        .zip(y)
        .enumerate()
        .map(|(i, (&xi, &yi))| {
            let r = yi - model.value(xi, params);
            let w = weights.map_or(1.0, |w| w[i]);
            w * r * r
        })
        .sum()
}

fn fill_workspace<M: CurveModel>(
    model: &M,
    x: &[f64],
    y: &[f64],
    weights: Option<&[f64]>,
    params: &[f64],
    ws: &mut Workspace,
) {
    for (i, (&xi, &yi)) in x.iter().zip(y).enumerate() {
        let sw = weights.map_or(1.0, |w| w[i].sqrt());
        ws.residuals[i] = sw * (yi - model.value(xi, params));
        model.gradient(xi, params, &mut ws.jacobian[i]);
        for g in ws.jacobian[i].iter_mut() {
            *g *= sw;
        }
    }
}

fn normal_equations(ws: &Workspace, p: usize) -> (Matrix, Vec<f64>) {
    let mut jtj = vec![vec![0.0; p]; p];
    let mut jtr = vec![0.0; p];
    for (row, &r) in ws.jacobian.iter().zip(&ws.residuals) {
        for a in 0..p {
            jtr[a] += row[a] * r;
            for b in a..p {
                jtj[a][b] += row[a] * row[b];
            }
        }
    }
    for a in 0..p {
        for b in 0..a {
            jtj[a][b] = jtj[b][a];
        }
    }
    (jtj, jtr)
}

/// Invert `J^T J` after symmetric diagonal scaling, which keeps the pivot
/// test meaningful when parameter magnitudes differ by many decades.
fn scaled_inverse(jtj: &[Vec<f64>]) -> Result<Matrix, LinalgError> {
    let p = jtj.len();
    let d: Vec<f64> = (0..p)
        .map(|i| {
            let v = jtj[i][i];
            if v > 0.0 {
                1.0 / v.sqrt()
            } else {
                1.0
            }
        })
        .collect();
    let scaled: Matrix = (0..p)
        .map(|i| (0..p).map(|j| jtj[i][j] * d[i] * d[j]).collect())
        .collect();
    let inv = invert(&scaled)?;
    Ok((0..p)
        .map(|i| (0..p).map(|j| inv[i][j] * d[i] * d[j]).collect())
        .collect())
}

/// Fit `model` to `(x, y)` starting from `initial`.
///
/// `weights`, when given, multiply each squared residual (use `1/sigma^2`).
pub fn levenberg_marquardt<M: CurveModel>(
    model: &M,
    x: &[f64],
    y: &[f64],
    weights: Option<&[f64]>,
    initial: &[f64],
    config: &LmConfig,
) -> Result<LmSolution, SolverError> {
    let p = model.parameter_count();
    if x.len() != y.len() {
        return Err(SolverError::LengthMismatch {
            x: x.len(),
            y: y.len(),
        });
    }
    if let Some(w) = weights {
        if w.len() != x.len() {
            return Err(SolverError::LengthMismatch {
                x: x.len(),
                y: w.len(),
            });
        }
        if w.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(SolverError::NonFinite("weights"));
        }
    }
    if initial.len() != p {
        return Err(SolverError::GuessLength {
            expected: p,
            got: initial.len(),
        });
    }
    let n = x.len();
    if n <= p {
        return Err(SolverError::TooFewPoints {
            points: n,
            params: p,
        });
    }
    if x.iter().chain(y).any(|v| !v.is_finite()) {
        return Err(SolverError::NonFinite("data"));
    }
    if initial.iter().any(|v| !v.is_finite()) {
        return Err(SolverError::NonFinite("initial guess"));
    }

    let mut params = initial.to_vec();
    let mut cost = weighted_cost(model, x, y, weights, &params);
    if !cost.is_finite() {
        return Err(SolverError::NonFinite("initial cost"));
    }

    let mut ws = Workspace {
        jacobian: vec![vec![0.0; p]; n],
        residuals: vec![0.0; n],
    };
    let mut damping = config.initial_damping;
    let mut iterations = 0;
    let mut converged = false;

    while iterations < config.max_iterations {
        if cost == 0.0 {
            converged = true;
            break;
        }
        fill_workspace(model, x, y, weights, &params, &mut ws);
        let (jtj, jtr) = normal_equations(&ws, p);

        let mut accepted = None;
        while damping <= config.max_damping {
            let mut damped = jtj.clone();
            for (i, row) in damped.iter_mut().enumerate() {
                row[i] += damping * jtj[i][i].max(1e-30);
            }
            let step = match solve(&damped, &jtr) {
                Ok(step) => step,
                Err(_) => {
                    damping *= 10.0;
                    continue;
                }
            };
            let trial: Vec<f64> = params.iter().zip(&step).map(|(a, b)| a + b).collect();
            let trial_cost = weighted_cost(model, x, y, weights, &trial);
            if trial_cost.is_finite() && trial_cost < cost {
                accepted = Some((trial, trial_cost, step));
                damping = (damping / 10.0).max(1e-15);
                break;
            }
            damping *= 10.0;
        }

        let Some((trial, trial_cost, step)) = accepted else {
            // No damping level reduces the cost: the gradient has vanished
            // to working precision.
            converged = true;
            break;
        };

        iterations += 1;
        let reduction = (cost - trial_cost) / cost;
        let small_step = step
            .iter()
            .zip(&trial)
            .all(|(s, v)| s.abs() <= config.step_tolerance * (v.abs() + config.step_tolerance));
        params = trial;
        cost = trial_cost;
        if reduction <= config.cost_tolerance || small_step {
            converged = true;
            break;
        }
    }

    if !converged {
        return Err(SolverError::NotConverged { iterations, cost });
    }
    if params.iter().any(|v| !v.is_finite()) {
        return Err(SolverError::NonFinite("parameters"));
    }

    fill_workspace(model, x, y, weights, &params, &mut ws);
    let (jtj, _) = normal_equations(&ws, p);
    let dof = (n - p) as f64;
    let reduced_chi_square = cost / dof;
    let covariance = scaled_inverse(&jtj).ok().map(|inv| {
        inv.into_iter()
            .map(|row| row.into_iter().map(|v| v * reduced_chi_square).collect())
            .collect()
    });

    Ok(LmSolution {
        params,
        covariance,
        cost,
        reduced_chi_square,
        iterations,
    })
}
