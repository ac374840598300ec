//! Neutron Correlation Core Library
//!
//! This library turns time-tagged detector events into correlation
//! histograms and fits decay models to them:
//! - Sequential (Feynman) and Rossi binning strategies
//! - Factorial moments and the Feynman-Y family of statistics
//! - Gate-width sweeps and aggregation across measurements
//! - Log and exponential decay fits with covariance propagation
//! - Two-term rate combination and weighted rate averaging
//!
//! The binary entry point is in `main.rs`.

pub mod aggregate;
pub mod alpha;
pub mod binning;
pub mod calculator;
pub mod exit_codes;
pub mod fit;
pub mod input;
pub mod logging;
pub mod moments;
pub mod pipeline;
pub mod rates;
pub mod sweep;

pub use aggregate::{aggregate_r2, aggregate_statistic, AggregatedStatistic, R2Point, R2Strategy};
pub use alpha::{combine, combine_fit, CombinedAlpha};
pub use binning::{BinningStrategy, RossiBinning, RossiWindow, Sequential};
pub use calculator::HistogramCalculator;
pub use fit::{DecayFitEngine, FitOptions, FitResult};
pub use moments::{Estimate, FeynmanStatistics, MomentAnalyzer, Moments};
pub use pipeline::{run_feynman, run_rossi, FeynmanReport, Outcome, RossiReport};
pub use rates::{average_rates, combine_rates, CombinedRate};
pub use sweep::{Curve, FeynmanPoint, FeynmanSweep};

/// Schema version of the JSON reports written by the CLI.
pub const REPORT_SCHEMA_VERSION: &str = "1.0.0";
