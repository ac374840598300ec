//! Analysis configuration types.
//!
//! Every section has defaults, so `{}` is a complete configuration. Times
//! are nanoseconds throughout.

use nc_common::{DecayModel, EmptyGates, PairingPolicy, RossiVariant};
use serde::{Deserialize, Serialize};

use crate::validate::{ValidationError, ValidationResult};

/// Complete analysis configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,

    #[serde(default)]
    pub stream: StreamConfig,

    #[serde(default)]
    pub feynman: FeynmanConfig,

    #[serde(default)]
    pub rossi: RossiConfig,

    #[serde(default)]
    pub fit: FitConfig,
}

fn default_schema_version() -> String {
    crate::CONFIG_SCHEMA_VERSION.to_string()
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            stream: StreamConfig::default(),
            feynman: FeynmanConfig::default(),
            rossi: RossiConfig::default(),
            fit: FitConfig::default(),
        }
    }
}

impl AnalysisConfig {
    /// Load from a JSON file.
    pub fn from_file(path: &std::path::Path) -> ValidationResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ValidationError::IoError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::parse_json(&content)
    }

    /// Parse from a JSON string.
    pub fn parse_json(content: &str) -> ValidationResult<Self> {
        serde_json::from_str(content).map_err(|e| ValidationError::ParseError(e.to_string()))
    }

    pub fn to_json(&self) -> ValidationResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| ValidationError::ParseError(e.to_string()))
    }
}

/// Event stream preprocessing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Drop events at or after this time.
    #[serde(default)]
    pub time_cutoff: Option<f64>,

    /// Keep only these detector channels.
    #[serde(default)]
    pub channels: Option<Vec<u32>>,
}

/// Which Feynman statistic is fitted against gate width.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeynmanStatistic {
    #[default]
    Y,
    Y2,
}

/// Spacing of a generated gate-width sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateSpacing {
    Linear,
    #[default]
    Log,
}

/// A generated list of gate widths.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateSweep {
    pub start: f64,
    pub stop: f64,
    pub count: usize,
    #[serde(default)]
    pub spacing: GateSpacing,
}

impl Default for GateSweep {
    fn default() -> Self {
        Self {
            start: 10.0,
            stop: 10_000.0,
            count: 30,
            spacing: GateSpacing::Log,
        }
    }
}

impl GateSweep {
    /// Gate widths from `start` to `stop` inclusive.
    pub fn widths(&self) -> Vec<f64> {
        match self.count {
            0 => Vec::new(),
            1 => vec![self.start],
            n => {
                let last = (n - 1) as f64;
                (0..n)
                    .map(|i| {
                        let t = i as f64 / last;
                        match self.spacing {
                            GateSpacing::Linear => self.start + t * (self.stop - self.start),
                            GateSpacing::Log => self.start * (self.stop / self.start).powf(t),
                        }
                    })
                    .collect()
            }
        }
    }
}

/// Feynman-Y (variance-to-mean) analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeynmanConfig {
    /// Explicit gate widths; overrides `sweep` when present.
    #[serde(default)]
    pub gate_widths: Option<Vec<f64>>,

    #[serde(default)]
    pub sweep: GateSweep,

    #[serde(default)]
    pub empty_gates: EmptyGates,

    #[serde(default)]
    pub statistic: FeynmanStatistic,

    #[serde(default = "default_feynman_model")]
    pub model: DecayModel,

    /// Initial guess `[a, b]` or `[a, b, c, d]`.
    #[serde(default)]
    pub guess: Option<Vec<f64>>,
}

fn default_feynman_model() -> DecayModel {
    DecayModel::LogOne
}

impl Default for FeynmanConfig {
    fn default() -> Self {
        Self {
            gate_widths: None,
            sweep: GateSweep::default(),
            empty_gates: EmptyGates::default(),
            statistic: FeynmanStatistic::default(),
            model: default_feynman_model(),
            guess: None,
        }
    }
}

impl FeynmanConfig {
    /// The gate widths to analyze.
    pub fn resolved_gate_widths(&self) -> Vec<f64> {
        match &self.gate_widths {
            Some(widths) => widths.clone(),
            None => self.sweep.widths(),
        }
    }
}

/// Rossi-alpha analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RossiConfig {
    pub reset_time: f64,
    pub number_bins: usize,

    #[serde(default)]
    pub binning: RossiVariant,

    #[serde(default)]
    pub pairing: PairingPolicy,

    #[serde(default = "default_rossi_model")]
    pub model: DecayModel,

    /// Fit only bin centers inside `[min, max]`.
    #[serde(default)]
    pub fit_range: Option<[f64; 2]>,

    /// Initial guess `[a, b, c]` or `[a, b, c, d, e]`.
    #[serde(default)]
    pub guess: Option<Vec<f64>>,
}

fn default_rossi_model() -> DecayModel {
    DecayModel::ExpOne
}

impl Default for RossiConfig {
    fn default() -> Self {
        Self {
            reset_time: 1000.0,
            number_bins: 100,
            binning: RossiVariant::default(),
            pairing: PairingPolicy::default(),
            model: default_rossi_model(),
            fit_range: None,
            guess: None,
        }
    }
}

/// Curve-fit engine settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitConfig {
    pub max_iterations: usize,
    /// Relative cost reduction that ends the iteration.
    pub tolerance: f64,
    /// Two-term fits whose rates differ by less than this fraction are
    /// rejected as degenerate.
    pub degenerate_rate_threshold: f64,
    pub savgol_half_width: usize,
    pub savgol_order: usize,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            max_iterations: 500,
            tolerance: 1e-12,
            degenerate_rate_threshold: 0.01,
            savgol_half_width: 2,
            savgol_order: 2,
        }
    }
}
