//! Configuration validation errors and semantic validation.

use nc_common::DecayModel;
use thiserror::Error;

use crate::analysis::{AnalysisConfig, FeynmanConfig, FitConfig, RossiConfig, StreamConfig};

/// Validation result type.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Configuration validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("I/O error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Semantic validation failed: {0}")]
    SemanticError(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: String, actual: String },
}

impl ValidationError {
    /// Error code for structured error reporting.
    pub fn code(&self) -> u32 {
        match self {
            ValidationError::IoError(_) => 40,
            ValidationError::ParseError(_) => 41,
            ValidationError::SemanticError(_) => 42,
            ValidationError::InvalidValue { .. } => 43,
            ValidationError::VersionMismatch { .. } => 44,
        }
    }
}

impl From<ValidationError> for nc_common::Error {
    fn from(err: ValidationError) -> Self {
        nc_common::Error::Config(err.to_string())
    }
}

fn invalid(field: &str, message: impl Into<String>) -> ValidationError {
    ValidationError::InvalidValue {
        field: field.to_string(),
        message: message.into(),
    }
}

fn require_positive(field: &str, value: f64) -> ValidationResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(field, format!("Must be positive and finite, got {value}")))
    }
}

/// Validate a whole analysis configuration.
pub fn validate_config(config: &AnalysisConfig) -> ValidationResult<()> {
    if config.schema_version != crate::CONFIG_SCHEMA_VERSION {
        return Err(ValidationError::VersionMismatch {
            expected: crate::CONFIG_SCHEMA_VERSION.to_string(),
            actual: config.schema_version.clone(),
        });
    }

    validate_stream(&config.stream)?;
    validate_feynman(&config.feynman)?;
    validate_rossi(&config.rossi)?;
    validate_fit(&config.fit)?;
    Ok(())
}

fn validate_stream(stream: &StreamConfig) -> ValidationResult<()> {
    if let Some(cutoff) = stream.time_cutoff {
        require_positive("stream.time_cutoff", cutoff)?;
    }
    if let Some(channels) = &stream.channels {
        if channels.is_empty() {
            return Err(invalid("stream.channels", "Must list at least one channel"));
        }
    }
    Ok(())
}

fn validate_guess(field: &str, model: DecayModel, guess: Option<&[f64]>) -> ValidationResult<()> {
    let Some(guess) = guess else {
        return Ok(());
    };
    if guess.len() != model.parameter_count() {
        return Err(invalid(
            field,
            format!(
                "{} takes {} parameters, got {}",
                model,
                model.parameter_count(),
                guess.len()
            ),
        ));
    }
    if guess.iter().any(|v| !v.is_finite()) {
        return Err(invalid(field, "Guess values must be finite"));
    }
    Ok(())
}

fn validate_feynman(feynman: &FeynmanConfig) -> ValidationResult<()> {
    if !feynman.model.is_feynman() {
        return Err(invalid(
            "feynman.model",
            format!("Must be log_one or log_two, got {}", feynman.model),
        ));
    }

    match &feynman.gate_widths {
        Some(widths) => {
            if widths.is_empty() {
                return Err(invalid("feynman.gate_widths", "Must not be empty"));
            }
            for (i, w) in widths.iter().enumerate() {
                require_positive(&format!("feynman.gate_widths[{i}]"), *w)?;
            }
        }
        None => {
            let sweep = &feynman.sweep;
            require_positive("feynman.sweep.start", sweep.start)?;
            require_positive("feynman.sweep.stop", sweep.stop)?;
            if sweep.count == 0 {
                return Err(invalid("feynman.sweep.count", "Must be at least 1"));
            }
            if sweep.count > 1 && sweep.stop <= sweep.start {
                return Err(ValidationError::SemanticError(format!(
                    "Gate sweep stop ({}) must exceed start ({})",
                    sweep.stop, sweep.start
                )));
            }
        }
    }

    validate_guess("feynman.guess", feynman.model, feynman.guess.as_deref())
}

fn validate_rossi(rossi: &RossiConfig) -> ValidationResult<()> {
    require_positive("rossi.reset_time", rossi.reset_time)?;
    if rossi.number_bins == 0 {
        return Err(invalid("rossi.number_bins", "Must be at least 1"));
    }
    if rossi.model.is_feynman() {
        return Err(invalid(
            "rossi.model",
            format!("Must be exp_one or exp_two, got {}", rossi.model),
        ));
    }
    if let Some([min, max]) = rossi.fit_range {
        if !(min.is_finite() && max.is_finite()) || min < 0.0 || max <= min {
            return Err(invalid(
                "rossi.fit_range",
                format!("Must satisfy 0 <= min < max, got [{min}, {max}]"),
            ));
        }
        if min >= rossi.reset_time {
            return Err(ValidationError::SemanticError(format!(
                "Fit range starts at {min} ns, beyond the {} ns reset time",
                rossi.reset_time
            )));
        }
    }
    validate_guess("rossi.guess", rossi.model, rossi.guess.as_deref())
}

fn validate_fit(fit: &FitConfig) -> ValidationResult<()> {
    if fit.max_iterations == 0 {
        return Err(invalid("fit.max_iterations", "Must be at least 1"));
    }
    require_positive("fit.tolerance", fit.tolerance)?;
    if !(fit.degenerate_rate_threshold > 0.0 && fit.degenerate_rate_threshold < 1.0) {
        return Err(invalid(
            "fit.degenerate_rate_threshold",
            format!("Must be in (0, 1), got {}", fit.degenerate_rate_threshold),
        ));
    }
    if fit.savgol_half_width == 0 {
        return Err(invalid("fit.savgol_half_width", "Must be at least 1"));
    }
    if fit.savgol_order >= 2 * fit.savgol_half_width + 1 {
        return Err(invalid(
            "fit.savgol_order",
            format!(
                "Must be below the window size {}, got {}",
                2 * fit.savgol_half_width + 1,
                fit.savgol_order
            ),
        ));
    }
    Ok(())
}
