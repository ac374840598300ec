//! Exit codes for the nc-core CLI.
//!
//! Exit code ranges:
//! - 0-1: Analysis outcomes (a report was written to stdout)
//! - 10-19: User errors (arguments, configuration, input data)
//! - 20-29: Internal and I/O errors

use nc_common::{Error, ErrorCategory};

/// Exit codes for nc-core operations.
///
/// These codes are a stable contract for scripts driving the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    // ========================================================================
    // Analysis outcomes (0-1)
    // ========================================================================
    /// Report written and every fit accepted
    Clean = 0,

    /// Report written but a fit or rate combination was rejected
    FitRejected = 1,

    // ========================================================================
    // User errors (10-19)
    // ========================================================================
    /// Invalid arguments
    ArgsError = 10,

    /// Configuration could not be loaded or failed validation
    ConfigError = 11,

    /// Event data or analysis windows are invalid
    InputError = 12,

    // ========================================================================
    // Internal errors (20-29)
    // ========================================================================
    /// Invariant violated inside the engine
    InternalError = 20,

    /// I/O error
    IoError = 21,
}

impl ExitCode {
    /// Value passed to `std::process::exit`.
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Whether a report was produced.
    pub fn is_operational(self) -> bool {
        (self as i32) < 10
    }

    /// Whether the user can fix the cause (codes 10-19).
    pub fn is_user_error(self) -> bool {
        (10..20).contains(&(self as i32))
    }

    pub fn is_error(self) -> bool {
        (self as i32) >= 10
    }

    /// Get the code name as a string constant (for JSON output).
    pub fn code_name(&self) -> &'static str {
        match self {
            ExitCode::Clean => "OK_CLEAN",
            ExitCode::FitRejected => "OK_FIT_REJECTED",
            ExitCode::ArgsError => "ERR_ARGS",
            ExitCode::ConfigError => "ERR_CONFIG",
            ExitCode::InputError => "ERR_INPUT",
            ExitCode::InternalError => "ERR_INTERNAL",
            ExitCode::IoError => "ERR_IO",
        }
    }

    /// Exit code for an error that aborted a run.
    pub fn from_error(err: &Error) -> Self {
        match err {
            Error::Json(_) => ExitCode::InternalError,
            _ => match err.category() {
                ErrorCategory::Input => ExitCode::InputError,
                ErrorCategory::Fit | ErrorCategory::Physics => ExitCode::FitRejected,
                ErrorCategory::Config => ExitCode::ConfigError,
                ErrorCategory::Io => ExitCode::IoError,
            },
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

impl std::fmt::Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.code_name(), self.as_i32())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nc_common::{InputError, RejectReason};

    #[test]
    fn ranges_are_consistent() {
        assert!(ExitCode::Clean.is_operational());
        assert!(ExitCode::FitRejected.is_operational());
        assert!(!ExitCode::FitRejected.is_error());
        assert!(ExitCode::ConfigError.is_user_error());
        assert!(ExitCode::IoError.is_error());
        assert!(!ExitCode::IoError.is_user_error());
        assert_eq!(i32::from(ExitCode::InputError), 12);
        assert_eq!(ExitCode::ArgsError.to_string(), "ERR_ARGS (10)");
    }

    #[test]
    fn errors_map_by_category() {
        assert_eq!(
            ExitCode::from_error(&InputError::EmptyEvents.into()),
            ExitCode::InputError
        );
        assert_eq!(
            ExitCode::from_error(&Error::FitRejected {
                model: "exp_two",
                reason: RejectReason::SingularCovariance,
            }),
            ExitCode::FitRejected
        );
        assert_eq!(
            ExitCode::from_error(&Error::Config("bad".into())),
            ExitCode::ConfigError
        );
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert_eq!(ExitCode::from_error(&io.into()), ExitCode::IoError);
    }
}
