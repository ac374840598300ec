//! Core math modules.

pub mod levenberg;
pub mod linalg;
pub mod quadratic;
pub mod savgol;
pub mod stable;
