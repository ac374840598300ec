//! Neutron Correlation Core - command line driver
//!
//! Reads a time-tagged event file, runs a Feynman or Rossi analysis as
//! configured, and writes a JSON report to stdout. Logs go to stderr.

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand, ValueEnum};
use nc_common::{
    DecayModel, EmptyGates, Error, PairingPolicy, Result, RossiVariant, StructuredError,
};
use nc_config::{
    load_config, validate_config, AnalysisConfig, ConfigSnapshot, ConfigSource,
    FeynmanStatistic, LoadedConfig,
};
use nc_core::exit_codes::ExitCode;
use nc_core::input::read_events;
use nc_core::logging::{
    event_names, generate_run_id, init_logging, LogConfig, LogFormat, LogLevel, Stage,
};
use nc_core::{run_feynman, run_rossi, REPORT_SCHEMA_VERSION};
use serde::Serialize;
use tracing::{error, info, warn};

/// Neutron correlation analysis of time-tagged detector events
#[derive(Parser)]
#[command(name = "nc-core")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOpts,
}

/// Global options available to all commands
#[derive(Args, Debug)]
struct GlobalOpts {
    /// Analysis config file (otherwise NC_CONFIG, then the XDG config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long, global = true)]
    log_level: Option<LogLevel>,

    /// Log format on stderr (human, jsonl)
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,

    /// Write single-line JSON instead of pretty-printed
    #[arg(long, global = true)]
    compact: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Feynman-Y analysis over a sweep of gate widths
    Feynman(FeynmanArgs),

    /// Rossi-alpha analysis of time differences
    Rossi(RossiArgs),

    /// Configuration management
    Config(ConfigArgs),

    /// Print version information
    Version,
}

// ============================================================================
// Command argument structs
// ============================================================================

#[derive(Args, Debug)]
struct FeynmanArgs {
    /// Event file with `time,detector` lines
    events: PathBuf,

    /// Gate widths to analyze (replaces the configured sweep)
    #[arg(long = "gate-width", value_delimiter = ',')]
    gate_widths: Vec<f64>,

    /// Decay model (log_one, log_two)
    #[arg(long)]
    model: Option<DecayModel>,

    /// Statistic to fit against gate width
    #[arg(long, value_enum)]
    statistic: Option<StatisticArg>,

    /// How gates without events are counted
    #[arg(long, value_enum)]
    empty_gates: Option<EmptyGatesArg>,
}

#[derive(Args, Debug)]
struct RossiArgs {
    /// Event file with `time,detector` lines
    events: PathBuf,

    /// Time window after each trigger
    #[arg(long)]
    reset_time: Option<f64>,

    /// Number of histogram bins
    #[arg(long)]
    bins: Option<usize>,

    /// Windowing rule
    #[arg(long, value_enum)]
    binning: Option<BinningArg>,

    /// Which detector pairs count
    #[arg(long, value_enum)]
    pairing: Option<PairingArg>,

    /// Decay model (exp_one, exp_two)
    #[arg(long)]
    model: Option<DecayModel>,

    /// Fit only bin centers inside MIN MAX
    #[arg(long, num_args = 2, value_names = ["MIN", "MAX"])]
    fit_range: Option<Vec<f64>>,
}

#[derive(Args, Debug)]
struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Show the resolved configuration
    Show,
    /// Validate a configuration file
    Validate {
        /// File to validate (defaults to the resolved config)
        path: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum StatisticArg {
    Y,
    Y2,
}

impl From<StatisticArg> for FeynmanStatistic {
    fn from(arg: StatisticArg) -> Self {
        match arg {
            StatisticArg::Y => FeynmanStatistic::Y,
            StatisticArg::Y2 => FeynmanStatistic::Y2,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum EmptyGatesArg {
    Tally,
    Skip,
}

impl From<EmptyGatesArg> for EmptyGates {
    fn from(arg: EmptyGatesArg) -> Self {
        match arg {
            EmptyGatesArg::Tally => EmptyGates::Tally,
            EmptyGatesArg::Skip => EmptyGates::Skip,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum BinningArg {
    TypeI,
    TypeII,
    TypeIII,
}

impl From<BinningArg> for RossiVariant {
    fn from(arg: BinningArg) -> Self {
        match arg {
            BinningArg::TypeI => RossiVariant::TypeI,
            BinningArg::TypeII => RossiVariant::TypeII,
            BinningArg::TypeIII => RossiVariant::TypeIII,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum PairingArg {
    All,
    CrossChannel,
}

impl From<PairingArg> for PairingPolicy {
    fn from(arg: PairingArg) -> Self {
        match arg {
            PairingArg::All => PairingPolicy::All,
            PairingArg::CrossChannel => PairingPolicy::CrossChannel,
        }
    }
}

// ============================================================================
// Output envelopes
// ============================================================================

#[derive(Serialize)]
struct ConfigSection<'a> {
    source: &'a ConfigSnapshot,
    effective: &'a AnalysisConfig,
}

#[derive(Serialize)]
struct RunOutput<'a, R> {
    schema_version: &'static str,
    run_id: &'a str,
    generated_at: String,
    command: &'static str,
    input: String,
    /// OK_CLEAN or OK_FIT_REJECTED.
    outcome: &'static str,
    config: ConfigSection<'a>,
    report: R,
}

#[derive(Serialize)]
struct ErrorOutput<'a> {
    schema_version: &'static str,
    run_id: &'a str,
    generated_at: String,
    status: &'static str,
    exit_code: &'static str,
    error: StructuredError,
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            let code = if err.use_stderr() {
                ExitCode::ArgsError
            } else {
                ExitCode::Clean
            };
            std::process::exit(code.as_i32());
        }
    };

    let cli_level = if cli.global.quiet {
        Some(LogLevel::Error)
    } else {
        cli.global
            .log_level
            .or_else(|| LogLevel::from_verbosity(cli.global.verbose))
    };
    init_logging(&LogConfig::from_env(cli_level, cli.global.log_format));

    let run_id = generate_run_id();
    let exit_code = match &cli.command {
        Commands::Feynman(args) => run_feynman_command(&cli.global, &run_id, args),
        Commands::Rossi(args) => run_rossi_command(&cli.global, &run_id, args),
        Commands::Config(args) => run_config(&cli.global, &run_id, args),
        Commands::Version => {
            print_version(&cli.global);
            ExitCode::Clean
        }
    };

    std::process::exit(exit_code.as_i32());
}

// ============================================================================
// Command implementations
// ============================================================================

fn run_feynman_command(global: &GlobalOpts, run_id: &str, args: &FeynmanArgs) -> ExitCode {
    info!(event = event_names::RUN_STARTED, stage = %Stage::Init, run_id, command = "feynman");
    let result = (|| -> Result<ExitCode> {
        let loaded = load(global)?;
        let mut config = loaded.config;
        apply_feynman_overrides(&mut config, args);
        validate_config(&config)?;

        let events = load_events(&args.events)?;
        let report = run_feynman(events, &config)?;

        let accepted = report.fit.is_accepted();
        info!(
            event = event_names::ANALYSIS_FINISHED,
            stage = %Stage::Analyze,
            gate_widths = report.sweep.len(),
            fit_accepted = accepted,
            "feynman analysis finished"
        );
        if !accepted {
            warn!(event = event_names::FIT_REJECTED, stage = %Stage::Analyze, model = %report.model, "fit rejected");
        }

        let code = outcome_code(accepted);
        emit(
            global,
            &RunOutput {
                schema_version: REPORT_SCHEMA_VERSION,
                run_id,
                generated_at: chrono::Utc::now().to_rfc3339(),
                command: "feynman",
                input: args.events.display().to_string(),
                outcome: code.code_name(),
                config: ConfigSection {
                    source: &loaded.snapshot,
                    effective: &config,
                },
                report,
            },
        )?;
        Ok(code)
    })();
    finish(global, run_id, result)
}

fn run_rossi_command(global: &GlobalOpts, run_id: &str, args: &RossiArgs) -> ExitCode {
    info!(event = event_names::RUN_STARTED, stage = %Stage::Init, run_id, command = "rossi");
    let result = (|| -> Result<ExitCode> {
        let loaded = load(global)?;
        let mut config = loaded.config;
        apply_rossi_overrides(&mut config, args)?;
        validate_config(&config)?;

        let events = load_events(&args.events)?;
        let report = run_rossi(events, &config)?;

        let fit_accepted = report.fit.is_accepted();
        let alpha_accepted = report.alpha.as_ref().map_or(true, |a| a.is_accepted());
        info!(
            event = event_names::ANALYSIS_FINISHED,
            stage = %Stage::Analyze,
            bins = report.histogram.number_bins(),
            pairs = report.histogram.total(),
            fit_accepted,
            alpha_accepted,
            "rossi analysis finished"
        );
        if !(fit_accepted && alpha_accepted) {
            warn!(event = event_names::FIT_REJECTED, stage = %Stage::Analyze, model = %report.model, "fit rejected");
        }

        let code = outcome_code(fit_accepted && alpha_accepted);
        emit(
            global,
            &RunOutput {
                schema_version: REPORT_SCHEMA_VERSION,
                run_id,
                generated_at: chrono::Utc::now().to_rfc3339(),
                command: "rossi",
                input: args.events.display().to_string(),
                outcome: code.code_name(),
                config: ConfigSection {
                    source: &loaded.snapshot,
                    effective: &config,
                },
                report,
            },
        )?;
        Ok(code)
    })();
    finish(global, run_id, result)
}

fn run_config(global: &GlobalOpts, run_id: &str, args: &ConfigArgs) -> ExitCode {
    let result = match &args.command {
        ConfigCommands::Show => load(global).and_then(|loaded| {
            let response = serde_json::json!({
                "schema_version": REPORT_SCHEMA_VERSION,
                "run_id": run_id,
                "generated_at": chrono::Utc::now().to_rfc3339(),
                "source": &loaded.snapshot,
                "config": &loaded.config,
            });
            emit(global, &response).map(|_| ExitCode::Clean)
        }),
        ConfigCommands::Validate { path } => {
            let path = path.as_deref().or(global.config.as_deref());
            load_config(path).map_err(Error::from).and_then(|loaded| {
                let response = serde_json::json!({
                    "schema_version": REPORT_SCHEMA_VERSION,
                    "run_id": run_id,
                    "generated_at": chrono::Utc::now().to_rfc3339(),
                    "status": "valid",
                    "source": &loaded.snapshot,
                });
                emit(global, &response).map(|_| ExitCode::Clean)
            })
        }
    };
    finish(global, run_id, result)
}

fn print_version(global: &GlobalOpts) {
    let version_info = serde_json::json!({
        "schema_version": REPORT_SCHEMA_VERSION,
        "config_schema_version": nc_config::CONFIG_SCHEMA_VERSION,
        "nc_core_version": env!("CARGO_PKG_VERSION"),
        "rust_version": env!("CARGO_PKG_RUST_VERSION"),
    });
    if let Err(err) = emit(global, &version_info) {
        error!(error = %err, "failed to write version");
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn load(global: &GlobalOpts) -> Result<LoadedConfig> {
    let loaded = load_config(global.config.as_deref())?;
    let snapshot = &loaded.snapshot;
    if snapshot.path.is_none() {
        info!(event = event_names::CONFIG_DEFAULT_USED, stage = %Stage::Init, source = %ConfigSource::BuiltinDefault, "using built-in configuration");
    } else {
        info!(
            event = event_names::CONFIG_LOADED,
            stage = %Stage::Init,
            source = %snapshot.source,
            path = snapshot.path.as_deref().unwrap_or_default(),
            sha256 = %snapshot.sha256,
            "configuration loaded"
        );
    }
    Ok(loaded)
}

fn load_events(path: &Path) -> Result<nc_common::EventStream> {
    let events = read_events(path)?;
    info!(
        event = event_names::EVENTS_LOADED,
        stage = %Stage::Load,
        path = %path.display(),
        events = events.len(),
        duration = events.duration(),
        channels = ?events.channels(),
        "events loaded"
    );
    Ok(events)
}

fn apply_feynman_overrides(config: &mut AnalysisConfig, args: &FeynmanArgs) {
    let feynman = &mut config.feynman;
    if !args.gate_widths.is_empty() {
        feynman.gate_widths = Some(args.gate_widths.clone());
    }
    if let Some(model) = args.model {
        if model != feynman.model {
            feynman.guess = None;
        }
        feynman.model = model;
    }
    if let Some(statistic) = args.statistic {
        feynman.statistic = statistic.into();
    }
    if let Some(empty_gates) = args.empty_gates {
        feynman.empty_gates = empty_gates.into();
    }
}

fn apply_rossi_overrides(config: &mut AnalysisConfig, args: &RossiArgs) -> Result<()> {
    let rossi = &mut config.rossi;
    if let Some(reset_time) = args.reset_time {
        rossi.reset_time = reset_time;
    }
    if let Some(bins) = args.bins {
        rossi.number_bins = bins;
    }
    if let Some(binning) = args.binning {
        rossi.binning = binning.into();
    }
    if let Some(pairing) = args.pairing {
        rossi.pairing = pairing.into();
    }
    if let Some(model) = args.model {
        if model != rossi.model {
            rossi.guess = None;
        }
        rossi.model = model;
    }
    if let Some(range) = &args.fit_range {
        match range.as_slice() {
            [min, max] => rossi.fit_range = Some([*min, *max]),
            _ => return Err(Error::Config("--fit-range takes MIN and MAX".into())),
        }
    }
    Ok(())
}

fn outcome_code(accepted: bool) -> ExitCode {
    if accepted {
        ExitCode::Clean
    } else {
        ExitCode::FitRejected
    }
}

fn emit<T: Serialize>(global: &GlobalOpts, value: &T) -> Result<()> {
    let text = if global.compact {
        serde_json::to_string(value)?
    } else {
        serde_json::to_string_pretty(value)?
    };
    println!("{}", text);
    Ok(())
}

fn finish(global: &GlobalOpts, run_id: &str, result: Result<ExitCode>) -> ExitCode {
    match result {
        Ok(code) => {
            info!(event = event_names::RUN_FINISHED, stage = %Stage::Report, exit_code = %code);
            code
        }
        Err(err) => output_error(global, run_id, &err),
    }
}

/// Write a structured error to stderr and pick the exit code.
fn output_error(global: &GlobalOpts, run_id: &str, err: &Error) -> ExitCode {
    let exit_code = ExitCode::from_error(err);
    error!(
        event = event_names::RUN_FAILED,
        code = err.code(),
        category = %err.category(),
        error = %err,
        "run failed"
    );
    let response = ErrorOutput {
        schema_version: REPORT_SCHEMA_VERSION,
        run_id,
        generated_at: chrono::Utc::now().to_rfc3339(),
        status: "error",
        exit_code: exit_code.code_name(),
        error: StructuredError::from(err),
    };
    let text = if global.compact {
        serde_json::to_string(&response)
    } else {
        serde_json::to_string_pretty(&response)
    };
    match text {
        Ok(text) => eprintln!("{}", text),
        Err(_) => eprintln!("{}", StructuredError::from(err).to_json()),
    }
    exit_code
}
