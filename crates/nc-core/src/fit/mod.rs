//! Decay-model fitting.
//!
//! - [`model`]: the four decay curves and their Jacobians
//! - [`guess`]: curvature-based initial parameters
//! - [`engine`]: the fit state machine and canonical results

pub mod engine;
pub mod guess;
pub mod model;

pub use engine::{
    canonicalize_parameters, DecayFitEngine, DecayTerm, FitOptions, FitResult, FitStage,
};
pub use guess::initial_guess;
pub use model::{exp_one, exp_two, log_one, log_two, DecayCurve};
