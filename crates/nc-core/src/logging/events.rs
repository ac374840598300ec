//! Stable event names and stages for binary logging.

use serde::{Deserialize, Serialize};

/// Processing stages of an analysis run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Startup and configuration.
    Init,
    /// Reading the event file.
    Load,
    /// Feynman or Rossi analysis.
    Analyze,
    /// Writing the report.
    Report,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::Init => "init",
            Stage::Load => "load",
            Stage::Analyze => "analyze",
            Stage::Report => "report",
        };
        write!(f, "{}", s)
    }
}

/// Event names emitted by the binary.
pub mod event_names {
    pub const RUN_STARTED: &str = "run.started";
    pub const RUN_FINISHED: &str = "run.finished";

    pub const CONFIG_LOADED: &str = "config.loaded";
    pub const CONFIG_DEFAULT_USED: &str = "config.default_used";

    pub const EVENTS_LOADED: &str = "events.loaded";

    pub const ANALYSIS_FINISHED: &str = "analysis.finished";
    pub const FIT_REJECTED: &str = "analysis.fit_rejected";

    pub const RUN_FAILED: &str = "run.failed";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&Stage::Analyze).unwrap(), "\"analyze\"");
        assert_eq!(Stage::Load.to_string(), "load");
    }

    #[test]
    fn event_names_are_dotted() {
        for name in [
            event_names::RUN_STARTED,
            event_names::CONFIG_LOADED,
            event_names::EVENTS_LOADED,
            event_names::FIT_REJECTED,
        ] {
            assert!(name.contains('.'), "{name}");
        }
    }
}
