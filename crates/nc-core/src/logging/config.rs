//! Log level and format resolution.
//!
//! Sources, lowest precedence first:
//! - `RUST_LOG` (level keyword only)
//! - `NC_LOG`, `NC_LOG_FORMAT`, `NC_LOG_TIMESTAMPS`
//! - CLI flags (`--log-level`, `--log-format`, `-v`)

use serde::{Deserialize, Serialize};

pub const ENV_LOG_LEVEL: &str = "NC_LOG";
pub const ENV_LOG_FORMAT: &str = "NC_LOG_FORMAT";
pub const ENV_LOG_TIMESTAMPS: &str = "NC_LOG_TIMESTAMPS";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Console lines for a person at a terminal.
    #[default]
    Human,
    /// One JSON object per line.
    Jsonl,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "human" | "console" | "pretty" => Ok(LogFormat::Human),
            "jsonl" | "json" => Ok(LogFormat::Jsonl),
            other => Err(format!("log format '{}' is not one of human|jsonl", other)),
        }
    }
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            LogFormat::Human => "human",
            LogFormat::Jsonl => "jsonl",
        })
    }
}

/// Log level filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
    Off,
}

impl LogLevel {
    /// Level for `count` repetitions of `-v` (0 keeps the default).
    pub fn from_verbosity(count: u8) -> Option<Self> {
        match count {
            0 => None,
            1 => Some(LogLevel::Debug),
            _ => Some(LogLevel::Trace),
        }
    }
}

/// Canonical names first; later entries are accepted aliases.
const LEVEL_NAMES: &[(&str, LogLevel)] = &[
    ("trace", LogLevel::Trace),
    ("debug", LogLevel::Debug),
    ("info", LogLevel::Info),
    ("warn", LogLevel::Warn),
    ("error", LogLevel::Error),
    ("off", LogLevel::Off),
    ("warning", LogLevel::Warn),
    ("none", LogLevel::Off),
    ("quiet", LogLevel::Off),
];

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.to_ascii_lowercase();
        LEVEL_NAMES
            .iter()
            .find(|(name, _)| *name == wanted)
            .map(|(_, level)| *level)
            .ok_or_else(|| format!("log level '{}' is not one of trace|debug|info|warn|error|off", s))
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = LEVEL_NAMES
            .iter()
            .find(|(_, level)| level == self)
            .map_or("info", |(name, _)| *name);
        f.write_str(name)
    }
}

/// Most verbose level keyword mentioned in a `RUST_LOG` directive.
fn level_from_rust_log(directive: &str) -> Option<LogLevel> {
    LEVEL_NAMES[..5]
        .iter()
        .find(|(keyword, _)| directive.contains(keyword))
        .map(|(_, level)| *level)
}

/// Resolved logging settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub format: LogFormat,
    pub level: LogLevel,
    /// Whether human output carries timestamps.
    pub timestamps: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            format: LogFormat::Human,
            level: LogLevel::Info,
            timestamps: true,
        }
    }
}

impl LogConfig {
    /// Resolve from the process environment and CLI overrides.
    pub fn from_env(cli_level: Option<LogLevel>, cli_format: Option<LogFormat>) -> Self {
        Self::from_lookup(cli_level, cli_format, |key| std::env::var(key).ok())
    }

    /// Resolve with an explicit variable lookup.
    pub fn from_lookup<F>(
        cli_level: Option<LogLevel>,
        cli_format: Option<LogFormat>,
        lookup: F,
    ) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = LogConfig::default();

        if let Some(level) = lookup(ENV_LOG_LEVEL).and_then(|v| v.parse().ok()) {
            config.level = level;
        } else if let Some(level) = lookup("RUST_LOG").as_deref().and_then(level_from_rust_log) {
            config.level = level;
        }
        if let Some(format) = lookup(ENV_LOG_FORMAT).and_then(|v| v.parse().ok()) {
            config.format = format;
        }
        if let Some(flag) = lookup(ENV_LOG_TIMESTAMPS) {
            config.timestamps = !matches!(flag.trim(), "0" | "false" | "no" | "off");
        }

        if let Some(level) = cli_level {
            config.level = level;
        }
        if let Some(format) = cli_format {
            config.format = format;
        }
        config
    }
}
