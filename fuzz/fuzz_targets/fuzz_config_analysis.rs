//! Fuzz target for analysis.json parsing and validation.
//!
//! Parsing and validating arbitrary JSON should only ever return errors.

#![no_main]

use libfuzzer_sys::fuzz_target;
use nc_config::{validate_config, AnalysisConfig};

fuzz_target!(|data: &str| {
    if let Ok(config) = AnalysisConfig::parse_json(data) {
        let _ = validate_config(&config);
        let _ = config.to_json();
    }
});
