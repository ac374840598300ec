//! Neutron correlation analysis configuration loading and validation.
//!
//! This crate provides:
//! - Typed Rust structs for analysis.json
//! - Config resolution (CLI → env → XDG → defaults)
//! - Semantic validation
//! - Config snapshots for reproducible reports

pub mod analysis;
pub mod resolve;
pub mod snapshot;
pub mod validate;

pub use analysis::{
    AnalysisConfig, FeynmanConfig, FeynmanStatistic, FitConfig, GateSpacing, GateSweep,
    RossiConfig, StreamConfig,
};
pub use resolve::{load_config, resolve_config_path, ConfigSource, LoadedConfig, ResolvedPath};
pub use snapshot::ConfigSnapshot;
pub use validate::{validate_config, ValidationError, ValidationResult};

/// Schema version for configuration files.
pub const CONFIG_SCHEMA_VERSION: &str = "1.0.0";
