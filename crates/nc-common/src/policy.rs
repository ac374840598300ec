//! Named analysis choices shared by configuration and the engine.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How Sequential binning accounts for gates that contain no events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyGates {
    /// Every skipped gate adds one to `frequency[0]`.
    #[default]
    Tally,
    /// Only gates that contain at least one event are recorded.
    Skip,
}

/// Which event pairs a Rossi histogram counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairingPolicy {
    /// Any two events, including same-detector pairs.
    #[default]
    All,
    /// Only pairs recorded on different detectors.
    CrossChannel,
}

impl PairingPolicy {
    pub fn accepts(self, trigger: u32, partner: u32) -> bool {
        match self {
            PairingPolicy::All => true,
            PairingPolicy::CrossChannel => trigger != partner,
        }
    }
}

/// Rossi windowing rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RossiVariant {
    /// Every event triggers; all later events inside the window count.
    #[default]
    TypeI,
    /// Non-overlapping windows; the next trigger is the first event at or
    /// after the end of the current window.
    TypeII,
    /// Every event triggers; only the first eligible later event counts.
    TypeIII,
}

impl fmt::Display for RossiVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RossiVariant::TypeI => write!(f, "type_i"),
            RossiVariant::TypeII => write!(f, "type_ii"),
            RossiVariant::TypeIII => write!(f, "type_iii"),
        }
    }
}

/// Decay model families.
///
/// `LogOne`/`LogTwo` describe Feynman-Y against gate width; `ExpOne`/`ExpTwo`
/// describe Rossi counts against time difference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecayModel {
    LogOne,
    LogTwo,
    ExpOne,
    ExpTwo,
}

impl DecayModel {
    pub fn name(self) -> &'static str {
        match self {
            DecayModel::LogOne => "log_one",
            DecayModel::LogTwo => "log_two",
            DecayModel::ExpOne => "exp_one",
            DecayModel::ExpTwo => "exp_two",
        }
    }

    /// Free parameters, in fit order.
    pub fn parameter_count(self) -> usize {
        match self {
            DecayModel::LogOne => 2,
            DecayModel::LogTwo => 4,
            DecayModel::ExpOne => 3,
            DecayModel::ExpTwo => 5,
        }
    }

    /// Number of decay terms (1 or 2).
    pub fn term_count(self) -> usize {
        match self {
            DecayModel::LogOne | DecayModel::ExpOne => 1,
            DecayModel::LogTwo | DecayModel::ExpTwo => 2,
        }
    }

    pub fn is_two_term(self) -> bool {
        self.term_count() == 2
    }

    /// Whether the model describes Feynman-Y curves.
    pub fn is_feynman(self) -> bool {
        matches!(self, DecayModel::LogOne | DecayModel::LogTwo)
    }

    /// Whether the model carries a constant offset parameter.
    pub fn has_offset(self) -> bool {
        !self.is_feynman()
    }

    /// Points required before a fit is attempted.
    pub fn min_points(self) -> usize {
        self.parameter_count() + 2
    }
}

impl fmt::Display for DecayModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DecayModel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "log_one" | "logone" => Ok(DecayModel::LogOne),
            "log_two" | "logtwo" => Ok(DecayModel::LogTwo),
            "exp_one" | "expone" => Ok(DecayModel::ExpOne),
            "exp_two" | "exptwo" => Ok(DecayModel::ExpTwo),
            _ => Err(format!(
                "unknown model '{s}': expected log_one, log_two, exp_one or exp_two"
            )),
        }
    }
}
