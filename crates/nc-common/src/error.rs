//! Error types for neutron correlation analysis.
//!
//! Every fallible operation in the analysis crates returns [`Error`]. The
//! taxonomy separates malformed input, fits that failed or were rejected,
//! and physically inadmissible results, so callers can decide per error
//! whether to retry with a different guess, skip a derived quantity, or
//! abort.
//!
//! Errors serialize to structured JSON for machine consumers:
//! ```json
//! {
//!   "code": 21,
//!   "category": "fit",
//!   "message": "exp_two fit rejected: rates 0.0100 and 0.0100 differ by less than 1.0%",
//!   "recoverable": true
//! }
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for analysis operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse grouping used for exit codes and report filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Malformed events, windows, or histograms.
    Input,
    /// Curve fits that did not converge or were rejected.
    Fit,
    /// Results with no physical interpretation.
    Physics,
    /// Configuration file errors.
    Config,
    /// Reading inputs or writing reports failed.
    Io,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Input => write!(f, "input"),
            ErrorCategory::Fit => write!(f, "fit"),
            ErrorCategory::Physics => write!(f, "physics"),
            ErrorCategory::Config => write!(f, "config"),
            ErrorCategory::Io => write!(f, "io"),
        }
    }
}

/// Ways an input can be invalid.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InputError {
    #[error("event list is empty")]
    EmptyEvents,

    #[error("{name} must be positive and finite (got {value})")]
    NonPositiveWindow { name: &'static str, value: f64 },

    #[error("event {index} has invalid time {time}")]
    InvalidTime { index: usize, time: f64 },

    #[error("{name} must be at least 1")]
    ZeroCount { name: &'static str },

    #[error("length mismatch: {left} has {left_len}, {right} has {right_len}")]
    LengthMismatch {
        left: &'static str,
        left_len: usize,
        right: &'static str,
        right_len: usize,
    },

    #[error("malformed histogram: {0}")]
    MalformedHistogram(String),

    #[error("{0}")]
    Other(String),
}

/// Why a completed fit was not accepted.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "reason")]
pub enum RejectReason {
    #[error("{points} usable points, at least {required} required")]
    InsufficientData { points: usize, required: usize },

    #[error("rates {first:.4e} and {second:.4e} differ by less than {threshold_pct:.1}%")]
    DegenerateRates {
        first: f64,
        second: f64,
        threshold_pct: f64,
    },

    #[error("parameter covariance is singular")]
    SingularCovariance,

    #[error("non-finite fitted parameters")]
    NonFiniteParameters,
}

/// Unified error type for the analysis crates.
#[derive(Error, Debug)]
pub enum Error {
    // Input errors (10-19)
    #[error("invalid input: {0}")]
    InvalidInput(#[from] InputError),

    // Fit errors (20-29)
    #[error("{model} fit did not converge after {iterations} iterations")]
    FitNotConverged {
        model: &'static str,
        iterations: usize,
    },

    #[error("{model} fit rejected: {reason}")]
    FitRejected {
        model: &'static str,
        reason: RejectReason,
    },

    // Physics errors (30-39)
    #[error("no physically valid root in [0, 1]: {detail}")]
    PhysicallyInvalidRoot { detail: String },

    // Configuration errors (40-49)
    #[error("configuration error: {0}")]
    Config(String),

    // I/O errors (60-69)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Shorthand for [`InputError::Other`].
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Error::InvalidInput(InputError::Other(message.into()))
    }

    /// Stable numeric code. Ranges follow the category:
    /// - 10-19: Input errors
    /// - 20-29: Fit errors
    /// - 30-39: Physics errors
    /// - 40-49: Configuration errors
    /// - 60-69: I/O errors
    pub fn code(&self) -> u32 {
        match self {
            Error::InvalidInput(InputError::EmptyEvents) => 10,
            Error::InvalidInput(InputError::NonPositiveWindow { .. }) => 11,
            Error::InvalidInput(InputError::InvalidTime { .. }) => 12,
            Error::InvalidInput(InputError::ZeroCount { .. }) => 13,
            Error::InvalidInput(InputError::LengthMismatch { .. }) => 14,
            Error::InvalidInput(InputError::MalformedHistogram(_)) => 15,
            Error::InvalidInput(InputError::Other(_)) => 19,
            Error::FitNotConverged { .. } => 20,
            Error::FitRejected { .. } => 21,
            Error::PhysicallyInvalidRoot { .. } => 30,
            Error::Config(_) => 40,
            Error::Io(_) => 60,
            Error::Json(_) => 61,
        }
    }

    /// Category of this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::InvalidInput(_) => ErrorCategory::Input,
            Error::FitNotConverged { .. } | Error::FitRejected { .. } => ErrorCategory::Fit,
            Error::PhysicallyInvalidRoot { .. } => ErrorCategory::Physics,
            Error::Config(_) => ErrorCategory::Config,
            Error::Io(_) | Error::Json(_) => ErrorCategory::Io,
        }
    }

    /// Whether a caller can reasonably retry with different inputs.
    ///
    /// A non-converged fit may succeed from another initial guess; a
    /// degenerate two-term fit will not, but the one-term model may.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::InvalidInput(_) => false,
            Error::FitNotConverged { .. } => true,
            Error::FitRejected { reason, .. } => !matches!(
                reason,
                RejectReason::InsufficientData { .. }
            ),
            Error::PhysicallyInvalidRoot { .. } => false,
            Error::Config(_) => true,
            Error::Io(_) => true,
            Error::Json(_) => false,
        }
    }

    /// Short hint on how to fix the input or configuration.
    pub fn remediation(&self) -> &'static str {
        match self {
            Error::InvalidInput(InputError::EmptyEvents) => {
                "No events remain after filtering. Check the time cutoff and detector channel filter."
            }
            Error::InvalidInput(InputError::NonPositiveWindow { .. }) => {
                "Gate widths and reset times must be positive numbers of nanoseconds."
            }
            Error::InvalidInput(_) => "Check the input arrays for matching lengths and finite values.",
            Error::FitNotConverged { .. } => {
                "Retry with an explicit initial guess or a larger iteration limit."
            }
            Error::FitRejected { reason, .. } => match reason {
                RejectReason::InsufficientData { .. } => {
                    "Add more gate widths or bins; two-term fits need at least six distinct points."
                }
                RejectReason::DegenerateRates { .. } => {
                    "The two decay terms are indistinguishable. Use the one-term model."
                }
                RejectReason::SingularCovariance | RejectReason::NonFiniteParameters => {
                    "The model is over-parameterized for this data. Use the one-term model or narrow the fit range."
                }
            },
            Error::PhysicallyInvalidRoot { .. } => {
                "The two-term fit has no physical single-rate equivalent. Check amplitude signs and rate separation."
            }
            Error::Config(_) => "Validate the analysis configuration file.",
            Error::Io(_) => "Check that the file exists and is readable.",
            Error::Json(_) => "Invalid JSON. Check the file syntax.",
        }
    }
}

/// Error record embedded in JSON reports and CLI error output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredError {
    /// Stable error code.
    pub code: u32,

    /// Which group the code belongs to.
    pub category: ErrorCategory,

    /// Display text of the error.
    pub message: String,

    /// True when retrying with different input or settings can succeed.
    pub recoverable: bool,

    /// Remediation hint.
    pub remediation: String,
}

impl From<&Error> for StructuredError {
    fn from(err: &Error) -> Self {
        StructuredError {
            code: err.code(),
            category: err.category(),
            message: err.to_string(),
            recoverable: err.is_recoverable(),
            remediation: err.remediation().to_string(),
        }
    }
}

impl StructuredError {
    /// Compact JSON; falls back to a minimal object if serialization fails.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(r#"{{"code":{},"error":"serialization_failed"}}"#, self.code)
        })
    }
}
