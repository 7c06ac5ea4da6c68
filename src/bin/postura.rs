//! Postura CLI - Command-line interface for Postura
//!
//! Commands:
//! - replay: Replay a recorded frame stream through a tracking session
//! - validate: Validate a recorded frame stream
//! - summary: Summarize the stored session history
//! - doctor: Diagnose configuration and storage health
//! - config: Print the default configuration

use clap::{Parser, Subcommand, ValueEnum};
use log::info;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use chrono::Utc;
use postura::history::{load_history, load_last_session, HISTORY_KEY};
use postura::pipeline::replay_events;
use postura::schema::FrameStreamAdapter;
use postura::summary::{format_hms, DashboardSummary, RangeView, PLACEHOLDER};
use postura::{
    FileStore, KeyValueStore, LogAnnouncer, TrackerConfig, TrackerError,
    POSTURA_VERSION, PRODUCER_NAME,
};

/// Postura - Posture and focus session tracking
#[derive(Parser)]
#[command(name = "postura")]
#[command(version = POSTURA_VERSION)]
#[command(about = "Track posture and focus from recorded landmark streams", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a recorded frame stream through a tracking session
    Replay {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Tracking mode ("Posture", "Focus" or "Focus & Posture")
        #[arg(long, default_value = "Focus & Posture")]
        mode: String,

        /// Planned duration ("30m", "1h", "1h 30m", "2h" or "None")
        #[arg(long, default_value = "None")]
        duration: String,

        /// Configuration file (JSON)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Store directory to persist the session record into
        #[arg(long)]
        store: Option<PathBuf>,

        /// Output format
        #[arg(long, default_value = "json-pretty")]
        output_format: OutputFormat,
    },

    /// Validate a recorded frame stream
    Validate {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Summarize the stored session history
    Summary {
        /// Store directory holding the session history
        #[arg(long)]
        store: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose configuration and storage health
    Doctor {
        /// Check a configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Check a store directory
        #[arg(long)]
        store: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the default configuration as JSON
    Config,
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// Newline-delimited JSON (one event per line)
    Ndjson,
    /// JSON array of events
    Json,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Single-line JSON
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), PosturaCliError> {
    match cli.command {
        Commands::Replay {
            input,
            input_format,
            mode,
            duration,
            config,
            store,
            output_format,
        } => cmd_replay(
            &input,
            input_format,
            &mode,
            &duration,
            config.as_deref(),
            store.as_deref(),
            output_format,
        ),

        Commands::Validate {
            input,
            input_format,
            json,
        } => cmd_validate(&input, input_format, json),

        Commands::Summary { store, json } => cmd_summary(&store, json),

        Commands::Doctor {
            config,
            store,
            json,
        } => cmd_doctor(config.as_deref(), store.as_deref(), json),

        Commands::Config => cmd_config(),
    }
}

fn cmd_replay(
    input: &Path,
    input_format: InputFormat,
    mode: &str,
    duration: &str,
    config: Option<&Path>,
    store: Option<&Path>,
    output_format: OutputFormat,
) -> Result<(), PosturaCliError> {
    let input_data = read_input(input)?;
    let events = parse_events(&input_data, &input_format)?;
    if events.is_empty() {
        return Err(PosturaCliError::NoEvents);
    }

    let config = match config {
        Some(path) => TrackerConfig::load(path)?,
        None => TrackerConfig::default(),
    };
    let store = store.map(FileStore::new);

    let report = replay_events(
        &events,
        mode,
        duration,
        config,
        Arc::new(LogAnnouncer),
        store.as_ref().map(|s| s as &dyn KeyValueStore),
        Utc::now(),
    )?;
    info!(
        "replayed {} frames; session ended by {:?}",
        report.frames_processed, report.ended_by
    );

    let output = match output_format {
        OutputFormat::Json => serde_json::to_string(&report)?,
        OutputFormat::JsonPretty => serde_json::to_string_pretty(&report)?,
    };
    println!("{}", output);
    Ok(())
}

fn cmd_validate(input: &Path, input_format: InputFormat, json: bool) -> Result<(), PosturaCliError> {
    let input_data = read_input(input)?;
    let events = parse_events(&input_data, &input_format)?;

    let results = FrameStreamAdapter::validate_events(&events);

    let report = ValidationReport {
        total_events: events.len(),
        valid_events: events.len() - results.len(),
        invalid_events: results.len(),
        errors: results
            .iter()
            .map(|r| ValidationErrorDetail {
                index: r.index,
                stream: r.stream.as_str().to_string(),
                error: r.error.to_string(),
            })
            .collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Total events:   {}", report.total_events);
        println!("Valid events:   {}", report.valid_events);
        println!("Invalid events: {}", report.invalid_events);

        if !report.errors.is_empty() {
            println!("\nErrors:");
            for err in &report.errors {
                println!("  - {} event (index {}): {}", err.stream, err.index, err.error);
            }
        }
    }

    if report.invalid_events > 0 {
        Err(PosturaCliError::ValidationFailed(report.invalid_events))
    } else {
        Ok(())
    }
}

fn cmd_summary(store_dir: &Path, json: bool) -> Result<(), PosturaCliError> {
    if !store_dir.is_dir() {
        return Err(PosturaCliError::MissingStore(store_dir.to_path_buf()));
    }
    let store = FileStore::new(store_dir);
    let history = load_history(&store);
    let last = load_last_session(&store);
    let summary = DashboardSummary::build(&history, last.as_ref(), Utc::now());

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("Session Summary");
    println!("===============");
    match &summary.last_session {
        Some(view) => {
            let mode = view.mode.map(|m| m.as_label()).unwrap_or(PLACEHOLDER);
            println!("Last session: {} ({})", mode, view.selected_time);
            if let Some(score) = view.posture_score {
                println!("  Posture:   {}/10", score);
            }
            if let Some(focus) = &view.focus {
                println!(
                    "  Focus:     {}% (focused {}, unfocused {})",
                    focus.percent,
                    format_hms(focus.focused_secs as f64),
                    format_hms(focus.unfocused_secs as f64)
                );
            }
        }
        None => println!("Last session: {}", PLACEHOLDER),
    }

    println!();
    print_range("Lifetime", &summary.lifetime);
    print_range("Past week", &summary.week);
    print_range("Past 5 weeks", &summary.five_weeks);
    Ok(())
}

fn print_range(name: &str, view: &RangeView) {
    println!(
        "{:<13} posture {:>5}  focus {:>4}  ({} sessions)",
        name,
        view.posture_label(),
        view.focus_label(),
        view.sessions
    );
}

fn cmd_doctor(config: Option<&Path>, store: Option<&Path>, json: bool) -> Result<(), PosturaCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "postura_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Postura version {}", POSTURA_VERSION),
    });

    // Check configuration file if provided
    if let Some(config_path) = config {
        let check = if config_path.exists() {
            match TrackerConfig::load(config_path) {
                Ok(_) => DoctorCheck {
                    name: "config".to_string(),
                    status: CheckStatus::Ok,
                    message: "Configuration file valid".to_string(),
                },
                Err(e) => DoctorCheck {
                    name: "config".to_string(),
                    status: CheckStatus::Error,
                    message: format!("Invalid configuration: {}", e),
                },
            }
        } else {
            DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Warning,
                message: "Configuration file does not exist".to_string(),
            }
        };
        checks.push(check);
    }

    // Check store directory if provided
    if let Some(store_dir) = store {
        checks.push(check_store(store_dir));
    }

    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (pass recordings with --input <file>)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (replay --input - ready)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: POSTURA_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Postura Doctor Report");
        println!("=====================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report
        .checks
        .iter()
        .any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(PosturaCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

fn check_store(store_dir: &Path) -> DoctorCheck {
    if !store_dir.is_dir() {
        return DoctorCheck {
            name: "store".to_string(),
            status: CheckStatus::Warning,
            message: "Store directory does not exist (created on first save)".to_string(),
        };
    }

    let store = FileStore::new(store_dir);
    match store.get(HISTORY_KEY) {
        Ok(Some(raw)) => match serde_json::from_str::<serde_json::Value>(&raw) {
            Ok(serde_json::Value::Array(entries)) => {
                let readable = load_history(&store).len();
                let status = if readable == entries.len() {
                    CheckStatus::Ok
                } else {
                    CheckStatus::Warning
                };
                DoctorCheck {
                    name: "store".to_string(),
                    status,
                    message: format!(
                        "{} of {} stored sessions readable",
                        readable,
                        entries.len()
                    ),
                }
            }
            Ok(_) => DoctorCheck {
                name: "store".to_string(),
                status: CheckStatus::Error,
                message: "Sessions history is not a list".to_string(),
            },
            Err(e) => DoctorCheck {
                name: "store".to_string(),
                status: CheckStatus::Error,
                message: format!("Invalid sessions JSON: {}", e),
            },
        },
        Ok(None) => DoctorCheck {
            name: "store".to_string(),
            status: CheckStatus::Ok,
            message: "No sessions recorded yet".to_string(),
        },
        Err(e) => DoctorCheck {
            name: "store".to_string(),
            status: CheckStatus::Error,
            message: format!("Cannot read sessions history: {}", e),
        },
    }
}

fn cmd_config() -> Result<(), PosturaCliError> {
    println!("{}", TrackerConfig::default().to_json_pretty()?);
    Ok(())
}

// Helper functions

fn read_input(input: &Path) -> Result<String, PosturaCliError> {
    if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn parse_events(
    input_data: &str,
    input_format: &InputFormat,
) -> Result<Vec<postura::FrameEvent>, PosturaCliError> {
    let events = match input_format {
        InputFormat::Ndjson => FrameStreamAdapter::parse_ndjson(input_data)?,
        InputFormat::Json => FrameStreamAdapter::parse_array(input_data)?,
    };
    Ok(events)
}

// Error types

#[derive(Debug)]
enum PosturaCliError {
    Io(io::Error),
    Tracker(TrackerError),
    Json(serde_json::Error),
    NoEvents,
    MissingStore(PathBuf),
    ValidationFailed(usize),
    DoctorFailed,
}

impl From<io::Error> for PosturaCliError {
    fn from(e: io::Error) -> Self {
        PosturaCliError::Io(e)
    }
}

impl From<TrackerError> for PosturaCliError {
    fn from(e: TrackerError) -> Self {
        PosturaCliError::Tracker(e)
    }
}

impl From<serde_json::Error> for PosturaCliError {
    fn from(e: serde_json::Error) -> Self {
        PosturaCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<PosturaCliError> for CliError {
    fn from(e: PosturaCliError) -> Self {
        match e {
            PosturaCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            PosturaCliError::Tracker(e) => {
                let (code, hint) = match &e {
                    TrackerError::UnknownMode(_) => (
                        "UNKNOWN_MODE",
                        "Use --mode \"Posture\", \"Focus\" or \"Focus & Posture\"",
                    ),
                    TrackerError::InvalidConfig(_) => {
                        ("INVALID_CONFIG", "Run 'postura config' for a valid starting point")
                    }
                    TrackerError::ParseError(_) | TrackerError::JsonError(_) => (
                        "PARSE_ERROR",
                        "Ensure input is a pose/face/stop frame stream",
                    ),
                    TrackerError::Io(_) => ("IO_ERROR", "Check file paths and permissions"),
                    _ => ("TRACKER_ERROR", "Run 'postura doctor' for details"),
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            PosturaCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            PosturaCliError::NoEvents => CliError {
                code: "NO_EVENTS".to_string(),
                message: "No events found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            PosturaCliError::MissingStore(path) => CliError {
                code: "MISSING_STORE".to_string(),
                message: format!("Store directory not found: {}", path.display()),
                hint: Some("Replay a session with --store first".to_string()),
            },
            PosturaCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} events failed validation", count),
                hint: Some("Fix validation errors and retry".to_string()),
            },
            PosturaCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct ValidationReport {
    total_events: usize,
    valid_events: usize,
    invalid_events: usize,
    errors: Vec<ValidationErrorDetail>,
}

#[derive(serde::Serialize)]
struct ValidationErrorDetail {
    index: usize,
    stream: String,
    error: String,
}

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
