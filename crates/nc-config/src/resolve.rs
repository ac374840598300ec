//! Locating and loading the analysis config file.
//!
//! Resolution order: CLI argument → environment variable → XDG path → defaults.

use std::path::{Path, PathBuf};

use crate::analysis::AnalysisConfig;
use crate::snapshot::ConfigSnapshot;
use crate::validate::{validate_config, ValidationError, ValidationResult};

/// How the config file was chosen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConfigSource {
    /// `--config` on the command line.
    CliArgument,

    /// Set via `NC_CONFIG`.
    Environment,

    /// Found in the XDG config directory.
    XdgConfig,

    /// No file; `AnalysisConfig::default()`.
    #[default]
    BuiltinDefault,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::CliArgument => write!(f, "CLI argument"),
            ConfigSource::Environment => write!(f, "environment variable"),
            ConfigSource::XdgConfig => write!(f, "XDG config"),
            ConfigSource::BuiltinDefault => write!(f, "builtin default"),
        }
    }
}

/// Environment variable naming an analysis config file.
pub const ENV_CONFIG_PATH: &str = "NC_CONFIG";

/// Standard config file name.
const CONFIG_FILENAME: &str = "analysis.json";

/// Directory name under the user config dir.
const APP_NAME: &str = "neutron-correlation";

/// A resolved config path and its provenance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedPath {
    pub path: Option<PathBuf>,
    pub source: ConfigSource,
}

/// Resolve the analysis config path.
///
/// An explicit CLI path is returned even if missing, so loading reports the
/// error instead of silently falling back to defaults.
pub fn resolve_config_path(cli_path: Option<&Path>) -> ResolvedPath {
    if let Some(path) = cli_path {
        return ResolvedPath {
            path: Some(path.to_path_buf()),
            source: ConfigSource::CliArgument,
        };
    }

    if let Ok(env_path) = std::env::var(ENV_CONFIG_PATH) {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return ResolvedPath {
                path: Some(path),
                source: ConfigSource::Environment,
            };
        }
    }

    if let Some(dir) = xdg_config_dir() {
        let path = dir.join(CONFIG_FILENAME);
        if path.exists() {
            return ResolvedPath {
                path: Some(path),
                source: ConfigSource::XdgConfig,
            };
        }
    }

    ResolvedPath::default()
}

/// Get the XDG config directory for this application.
pub fn xdg_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_NAME))
}

/// A validated configuration with its snapshot.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: AnalysisConfig,
    pub snapshot: ConfigSnapshot,
}

/// Resolve, read, parse and validate the analysis config.
pub fn load_config(cli_path: Option<&Path>) -> ValidationResult<LoadedConfig> {
    let resolved = resolve_config_path(cli_path);
    let (config, content) = match &resolved.path {
        Some(path) => {
            let content = std::fs::read_to_string(path).map_err(|e| {
                ValidationError::IoError(format!("Failed to read {}: {}", path.display(), e))
            })?;
            (AnalysisConfig::parse_json(&content)?, content)
        }
        None => {
            let config = AnalysisConfig::default();
            let content = config.to_json()?;
            (config, content)
        }
    };
    validate_config(&config)?;
    let snapshot = ConfigSnapshot::new(&config, &resolved, &content);
    Ok(LoadedConfig { config, snapshot })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_source_display() {
        assert_eq!(format!("{}", ConfigSource::CliArgument), "CLI argument");
        assert_eq!(
            format!("{}", ConfigSource::Environment),
            "environment variable"
        );
        assert_eq!(format!("{}", ConfigSource::XdgConfig), "XDG config");
        assert_eq!(
            format!("{}", ConfigSource::BuiltinDefault),
            "builtin default"
        );
    }

    #[test]
    fn cli_path_wins_even_when_missing() {
        let path = Path::new("/nonexistent/analysis.json");
        let resolved = resolve_config_path(Some(path));
        assert_eq!(resolved.source, ConfigSource::CliArgument);
        assert_eq!(resolved.path.as_deref(), Some(path));

        let err = load_config(Some(path)).unwrap_err();
        assert!(matches!(err, ValidationError::IoError(_)));
    }

    #[test]
    fn xdg_dir_ends_with_app_name() {
        if let Some(path) = xdg_config_dir() {
            assert!(path.ends_with(APP_NAME));
        }
    }
}
