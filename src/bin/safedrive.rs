//! safedrive CLI - run scoring and aggregation over a telemetry snapshot
//!
//! Commands:
//! - score: safety score for one session
//! - monthly-scores: per-session scores for a set of vehicles in a month
//! - report: cohort safety rates (district / demographic / hour)
//! - best-drivers: monthly leaderboard (rate or score variant)
//! - fleet: fleet-wide monthly summary
//! - trend: seven-month detection trend
//! - validate: check a snapshot file and print row counts

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use safedrive_core::detections::{monthly_trend, Detection, ResolutionLog};
use safedrive_core::{
    GroupBy, MemoryTelemetry, RankingVariant, ScoreEngine, ScoreError, CORE_VERSION, PRODUCER_NAME,
};

/// safedrive - scoring and aggregation over municipal driving telemetry
#[derive(Parser)]
#[command(name = "safedrive")]
#[command(version = CORE_VERSION)]
#[command(about = "Score driving sessions and aggregate safety reports", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Safety score for one session
    Score {
        /// Telemetry snapshot JSON (use - for stdin)
        #[arg(short, long)]
        snapshot: PathBuf,

        /// Session id to score
        #[arg(long)]
        session: String,

        /// Output format
        #[arg(long, default_value = "auto")]
        output_format: OutputFormat,
    },

    /// Per-session scores for a set of vehicles in one month
    MonthlyScores {
        /// Telemetry snapshot JSON (use - for stdin)
        #[arg(short, long)]
        snapshot: PathBuf,

        /// Vehicle ids to include (repeatable)
        #[arg(long = "vehicle", required = true)]
        vehicles: Vec<String>,

        #[arg(long)]
        year: i32,

        /// Month (1-12)
        #[arg(long)]
        month: u32,

        /// Output format
        #[arg(long, default_value = "auto")]
        output_format: OutputFormat,
    },

    /// Cohort safety rates for one month
    Report {
        /// Telemetry snapshot JSON (use - for stdin)
        #[arg(short, long)]
        snapshot: PathBuf,

        /// Cohort dimension
        #[arg(long, value_enum, default_value = "district")]
        group_by: GroupByArg,

        /// Year (defaults to the current UTC month)
        #[arg(long)]
        year: Option<i32>,

        /// Month 1-12 (defaults to the current UTC month)
        #[arg(long)]
        month: Option<u32>,

        /// Output format
        #[arg(long, default_value = "auto")]
        output_format: OutputFormat,
    },

    /// Monthly best-driver leaderboard
    BestDrivers {
        /// Telemetry snapshot JSON (use - for stdin)
        #[arg(short, long)]
        snapshot: PathBuf,

        /// Ranking formula
        #[arg(long, value_enum, default_value = "rate")]
        variant: VariantArg,

        #[arg(long)]
        year: Option<i32>,

        /// Month (1-12)
        #[arg(long)]
        month: Option<u32>,

        /// Leaderboard size (defaults to 10 for rate, 5 for score)
        #[arg(long)]
        limit: Option<usize>,

        /// Output format
        #[arg(long, default_value = "auto")]
        output_format: OutputFormat,
    },

    /// Fleet-wide monthly summary
    Fleet {
        /// Telemetry snapshot JSON (use - for stdin)
        #[arg(short, long)]
        snapshot: PathBuf,

        #[arg(long)]
        year: Option<i32>,

        /// Month (1-12)
        #[arg(long)]
        month: Option<u32>,

        /// Output format
        #[arg(long, default_value = "auto")]
        output_format: OutputFormat,
    },

    /// Seven-month detection trend
    Trend {
        /// Detection rows JSON array (use - for stdin)
        #[arg(short, long)]
        detections: PathBuf,

        /// Resolution log JSON
        #[arg(long)]
        log: Option<PathBuf>,

        #[arg(long)]
        year: i32,

        /// Reference month (1-12)
        #[arg(long)]
        month: u32,

        /// Output format
        #[arg(long, default_value = "auto")]
        output_format: OutputFormat,
    },

    /// Validate a snapshot file and print row counts
    Validate {
        /// Telemetry snapshot JSON (use - for stdin)
        #[arg(short, long)]
        snapshot: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum GroupByArg {
    District,
    Demographic,
    Hour,
}

impl From<GroupByArg> for GroupBy {
    fn from(arg: GroupByArg) -> Self {
        match arg {
            GroupByArg::District => GroupBy::District,
            GroupByArg::Demographic => GroupBy::Demographic,
            GroupByArg::Hour => GroupBy::Hour,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum VariantArg {
    Rate,
    Score,
}

impl From<VariantArg> for RankingVariant {
    fn from(arg: VariantArg) -> Self {
        match arg {
            VariantArg::Rate => RankingVariant::Rate,
            VariantArg::Score => RankingVariant::Score,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Pretty-print on a TTY, compact otherwise
    Auto,
    /// Compact JSON
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

/// Envelope wrapped around every report the CLI prints.
#[derive(Serialize)]
struct Report<T: Serialize> {
    producer: &'static str,
    version: &'static str,
    #[serde(flatten)]
    payload: T,
}

#[derive(Debug)]
enum CliError {
    Io(io::Error),
    Core(ScoreError),
    Json(serde_json::Error),
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Io(e) => write!(f, "I/O error: {e}"),
            CliError::Core(e) => write!(f, "{e}"),
            CliError::Json(e) => write!(f, "Invalid JSON: {e}"),
        }
    }
}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        CliError::Io(e)
    }
}

impl From<ScoreError> for CliError {
    fn from(e: ScoreError) -> Self {
        CliError::Core(e)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError::Json(e)
    }
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("safedrive: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Score {
            snapshot,
            session,
            output_format,
        } => {
            let engine = load_engine(&snapshot)?;
            let score = engine.session_score(&session)?;
            print_report(&score, output_format)
        }

        Commands::MonthlyScores {
            snapshot,
            vehicles,
            year,
            month,
            output_format,
        } => {
            let engine = load_engine(&snapshot)?;
            let scores = engine.monthly_session_scores(&vehicles, year, month)?;
            print_report(&scores, output_format)
        }

        Commands::Report {
            snapshot,
            group_by,
            year,
            month,
            output_format,
        } => {
            let engine = load_engine(&snapshot)?;
            let stats = engine.monthly_safety_rate(year, month, group_by.into())?;
            print_report(&stats, output_format)
        }

        Commands::BestDrivers {
            snapshot,
            variant,
            year,
            month,
            limit,
            output_format,
        } => {
            let engine = load_engine(&snapshot)?;
            let ranked = engine.best_drivers(year, month, limit, variant.into())?;
            print_report(&ranked, output_format)
        }

        Commands::Fleet {
            snapshot,
            year,
            month,
            output_format,
        } => {
            let engine = load_engine(&snapshot)?;
            let summary = engine.fleet_stats(year, month)?;
            print_report(&summary, output_format)
        }

        Commands::Trend {
            detections,
            log,
            year,
            month,
            output_format,
        } => {
            let rows: Vec<Detection> = serde_json::from_str(&read_input(&detections)?)?;
            let resolution_log = match log {
                Some(path) => ResolutionLog::from_json(&read_input(&path)?)?,
                None => ResolutionLog::new(),
            };
            let trend = monthly_trend(&rows, &resolution_log, year, month)?;
            print_report(&trend, output_format)
        }

        Commands::Validate { snapshot } => {
            let store = MemoryTelemetry::from_json(&read_input(&snapshot)?)?;
            println!("snapshot ok: {} sessions", store.session_count());
            Ok(())
        }
    }
}

fn load_engine(snapshot: &Path) -> Result<ScoreEngine<MemoryTelemetry>, CliError> {
    let store = MemoryTelemetry::from_json(&read_input(snapshot)?)?;
    Ok(ScoreEngine::new(store))
}

fn read_input(path: &Path) -> Result<String, CliError> {
    if path.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(path)?)
    }
}

fn print_report<T: Serialize>(payload: &T, format: OutputFormat) -> Result<(), CliError> {
    let report = Report {
        producer: PRODUCER_NAME,
        version: CORE_VERSION,
        payload: Body { result: payload },
    };
    let pretty = match format {
        OutputFormat::Json => false,
        OutputFormat::JsonPretty => true,
        OutputFormat::Auto => atty::is(atty::Stream::Stdout),
    };
    let rendered = if pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    println!("{rendered}");
    Ok(())
}

/// Wrapper so every report serializes under a "result" key.
#[derive(Serialize)]
struct Body<'a, T: Serialize> {
    result: &'a T,
}
