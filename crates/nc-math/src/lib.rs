//! Numerical primitives for neutron correlation analysis.

pub mod math;

pub use math::levenberg::{levenberg_marquardt, CurveModel, LmConfig, LmSolution, SolverError};
pub use math::linalg::{invert, quadratic_form, solve, LinalgError, Matrix};
pub use math::quadratic::{real_roots, QuadraticRoots};
pub use math::savgol::{gradient, sg_derivative, sg_smooth, SavitzkyGolay, SgError};
pub use math::stable::*;
