//! Configuration snapshots for reproducible reports.
//!
//! A snapshot records which configuration produced an analysis, so a report
//! can be traced back to the exact settings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::analysis::AnalysisConfig;
use crate::resolve::ResolvedPath;

/// A frozen snapshot of configuration state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    /// When this snapshot was taken.
    pub timestamp: DateTime<Utc>,

    /// Schema version of the configuration.
    pub schema_version: String,

    /// Where the configuration came from.
    pub source: String,

    /// Path the configuration was loaded from.
    #[serde(default)]
    pub path: Option<String>,

    /// SHA-256 hash of the configuration JSON.
    pub sha256: String,

    /// Key configuration values for quick reference.
    pub summary: ConfigSummary,
}

/// Summary of key configuration values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigSummary {
    pub gate_width_count: usize,
    pub feynman_model: String,
    pub rossi_model: String,
    pub rossi_binning: String,
    pub reset_time: f64,
    pub number_bins: usize,
    pub degenerate_rate_threshold: f64,
}

impl ConfigSnapshot {
    /// Create a snapshot; `content` is the JSON the config was parsed from.
    pub fn new(config: &AnalysisConfig, resolved: &ResolvedPath, content: &str) -> Self {
        ConfigSnapshot {
            timestamp: Utc::now(),
            schema_version: config.schema_version.clone(),
            source: resolved.source.to_string(),
            path: resolved.path.as_ref().map(|p| p.display().to_string()),
            sha256: hash_content(content),
            summary: build_summary(config),
        }
    }

    /// Check if two snapshots were built from identical configuration.
    pub fn config_matches(&self, other: &ConfigSnapshot) -> bool {
        self.sha256 == other.sha256
    }
}

fn build_summary(config: &AnalysisConfig) -> ConfigSummary {
    ConfigSummary {
        gate_width_count: config.feynman.resolved_gate_widths().len(),
        feynman_model: config.feynman.model.to_string(),
        rossi_model: config.rossi.model.to_string(),
        rossi_binning: config.rossi.binning.to_string(),
        reset_time: config.rossi.reset_time,
        number_bins: config.rossi.number_bins,
        degenerate_rate_threshold: config.fit.degenerate_rate_threshold,
    }
}

/// Compute SHA-256 hash of content.
pub fn hash_content(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}
