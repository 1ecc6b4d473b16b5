//! Vibe CLI - Command-line interface for the Floq vibe engine
//!
//! Commands:
//! - run: Run the collection loop over live and replayed collectors (streaming mode)
//! - score: Compute a vibe point from a recorded snapshot window (batch mode)
//! - doctor: Diagnose configuration and feed files
//! - schema: Describe feed input and state output formats

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};
use tracing_subscriber::EnvFilter;

use floq_vibe::clock::{Clock, SystemClock};
use floq_vibe::collectors::{ReplayCollector, TemporalCollector};
use floq_vibe::config::OrchestratorConfig;
use floq_vibe::encoder::StateEncoder;
use floq_vibe::orchestrator::{derive_vibe_point, SignalOrchestrator};
use floq_vibe::types::{SignalSnapshot, VibeEngineState};
use floq_vibe::window::SnapshotWindow;
use floq_vibe::{PRODUCER_NAME, VIBE_VERSION};

/// Vibe - On-device multi-signal vibe confidence engine
#[derive(Parser)]
#[command(name = "vibe")]
#[command(author = "Floq")]
#[command(version = VIBE_VERSION)]
#[command(about = "Fuse location, movement, time and behavior signals into a vibe estimate", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the collection loop and stream engine state (streaming mode)
    Run {
        /// Orchestrator configuration (JSON)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Replay feed as NAME=PATH (NDJSON readings); repeatable
        #[arg(long = "feed", value_name = "NAME=PATH")]
        feeds: Vec<String>,

        /// Loop feeds instead of draining them once
        #[arg(long)]
        cycle: bool,

        /// Disable the built-in temporal collector
        #[arg(long)]
        no_temporal: bool,

        /// Local UTC offset in hours for the temporal collector
        #[arg(long, default_value = "0", allow_hyphen_values = true)]
        utc_offset_hours: i32,

        /// Stop after this many state updates
        #[arg(long)]
        ticks: Option<usize>,

        /// Output format
        #[arg(long, default_value = "ndjson")]
        output_format: OutputFormat,

        /// Save the snapshot window to file on exit
        #[arg(long)]
        save_window: Option<PathBuf>,
    },

    /// Compute a vibe point from a recorded window (batch mode)
    Score {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "window")]
        input_format: InputFormat,

        /// Evaluation time (RFC 3339); defaults to the newest snapshot
        #[arg(long)]
        at: Option<String>,

        /// Recent window in seconds
        #[arg(long, default_value = "60")]
        recent_window_secs: i64,

        /// Output format
        #[arg(long, default_value = "ndjson")]
        output_format: OutputFormat,
    },

    /// Diagnose configuration and feed files
    Doctor {
        /// Check configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Check replay feed as NAME=PATH; repeatable
        #[arg(long = "feed", value_name = "NAME=PATH")]
        feeds: Vec<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print format information
    Schema {
        /// Schema to print (input or output)
        #[arg(value_enum)]
        schema_type: SchemaType,
    },
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// Exported snapshot window (JSON object)
    Window,
    /// Newline-delimited snapshots
    Ndjson,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// One JSON record per line
    Ndjson,
    /// Pretty-printed JSON
    JsonPretty,
}

#[derive(Clone, ValueEnum)]
enum SchemaType {
    /// Replay feed reading
    Input,
    /// Encoded engine state
    Output,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
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

async fn run(cli: Cli) -> Result<(), VibeCliError> {
    match cli.command {
        Commands::Run {
            config,
            feeds,
            cycle,
            no_temporal,
            utc_offset_hours,
            ticks,
            output_format,
            save_window,
        } => {
            let options = RunOptions {
                config,
                feeds,
                cycle,
                no_temporal,
                utc_offset_hours,
                ticks,
                output_format,
                save_window,
            };
            cmd_run(options).await
        }

        Commands::Score {
            input,
            input_format,
            at,
            recent_window_secs,
            output_format,
        } => cmd_score(&input, input_format, at.as_deref(), recent_window_secs, output_format),

        Commands::Doctor {
            config,
            feeds,
            json,
        } => cmd_doctor(config.as_deref(), &feeds, json),

        Commands::Schema { schema_type } => cmd_schema(schema_type),
    }
}

struct RunOptions {
    config: Option<PathBuf>,
    feeds: Vec<String>,
    cycle: bool,
    no_temporal: bool,
    utc_offset_hours: i32,
    ticks: Option<usize>,
    output_format: OutputFormat,
    save_window: Option<PathBuf>,
}

async fn cmd_run(options: RunOptions) -> Result<(), VibeCliError> {
    let config = match &options.config {
        Some(path) => OrchestratorConfig::from_json(&fs::read_to_string(path)?)?,
        None => OrchestratorConfig::default(),
    };

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let engine = Arc::new(SignalOrchestrator::new(config.clone(), clock.clone())?);

    if !options.no_temporal {
        let offset = utc_offset(options.utc_offset_hours)?;
        engine.register_collector(Arc::new(TemporalCollector::new(clock.clone(), offset)));
    }

    let mut replays: Vec<Arc<ReplayCollector>> = Vec::new();
    for feed in &options.feeds {
        let (name, path) = parse_feed_arg(feed)?;
        let readings = ReplayCollector::parse_ndjson(&fs::read_to_string(path)?)?;
        let collector = if options.cycle {
            ReplayCollector::cycling(name, readings)
        } else {
            ReplayCollector::new(name, readings)
        };
        let collector = Arc::new(collector);
        engine.register_collector(collector.clone());
        replays.push(collector);
    }

    if engine.collector_names().is_empty() {
        return Err(VibeCliError::NoCollectors);
    }

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<VibeEngineState>();
    engine.add_listener(move |state| {
        tx.send(state.clone())?;
        Ok(())
    });

    engine.start()?;

    let encoder = StateEncoder::new();
    let mut stdout = io::stdout();
    let mut emitted = 0usize;
    let feeds_drained = || !replays.is_empty() && replays.iter().all(|r| r.is_drained());

    loop {
        tokio::select! {
            received = rx.recv() => {
                let Some(state) = received else { break };
                let envelope = encoder.encode(&state, clock.now());
                let line = match options.output_format {
                    OutputFormat::Ndjson => serde_json::to_string(&envelope)?,
                    OutputFormat::JsonPretty => serde_json::to_string_pretty(&envelope)?,
                };
                writeln!(stdout, "{}", line)?;
                stdout.flush()?;

                emitted += 1;
                if options.ticks.is_some_and(|limit| emitted >= limit) {
                    break;
                }
            }
            _ = tokio::time::sleep(config.interval() * 2) => {}
        }

        // Remaining feeds drained and nothing else contributes
        if feeds_drained() && (options.no_temporal || options.ticks.is_none()) {
            break;
        }
    }

    engine.stop().await;

    if let Some(path) = &options.save_window {
        fs::write(path, engine.export_window()?)?;
    }

    Ok(())
}

fn cmd_score(
    input: &Path,
    input_format: InputFormat,
    at: Option<&str>,
    recent_window_secs: i64,
    output_format: OutputFormat,
) -> Result<(), VibeCliError> {
    let input_data = read_input(input)?;

    let config = OrchestratorConfig {
        recent_window_secs,
        ..OrchestratorConfig::default()
    };
    config.validate()?;

    let window = match input_format {
        InputFormat::Window => {
            let window = SnapshotWindow::from_json(&input_data)?;
            window.validate()?;
            window
        }
        InputFormat::Ndjson => {
            let snapshots = parse_snapshot_ndjson(&input_data)?;
            let mut window = SnapshotWindow::new(snapshots.len().max(1));
            for snapshot in snapshots {
                window.push(snapshot);
            }
            window
        }
    };

    let now = match at {
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map_err(|e| VibeCliError::ParseError(format!("Invalid --at timestamp: {}", e)))?
            .with_timezone(&Utc),
        None => window
            .latest()
            .map(|s| s.timestamp)
            .ok_or(VibeCliError::NoSnapshots)?,
    };

    let point = derive_vibe_point(&window, now, config.recent_window());
    let envelope = StateEncoder::new().encode_point(&point);

    let output = match output_format {
        OutputFormat::Ndjson => serde_json::to_string(&envelope)?,
        OutputFormat::JsonPretty => serde_json::to_string_pretty(&envelope)?,
    };
    println!("{}", output);

    Ok(())
}

fn cmd_doctor(config: Option<&Path>, feeds: &[String], json: bool) -> Result<(), VibeCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "vibe_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Vibe version {}", VIBE_VERSION),
    });

    if let Some(config_path) = config {
        let check = match fs::read_to_string(config_path) {
            Ok(content) => match OrchestratorConfig::from_json(&content) {
                Ok(cfg) => DoctorCheck {
                    name: "config".to_string(),
                    status: CheckStatus::Ok,
                    message: format!(
                        "Config valid ({}ms interval, {} snapshot window, {:?} collection)",
                        cfg.interval_ms, cfg.window_capacity, cfg.collection_mode
                    ),
                },
                Err(e) => DoctorCheck {
                    name: "config".to_string(),
                    status: CheckStatus::Error,
                    message: e.to_string(),
                },
            },
            Err(e) => DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Error,
                message: format!("Cannot read config file: {}", e),
            },
        };
        checks.push(check);
    }

    for feed in feeds {
        let check = match parse_feed_arg(feed) {
            Ok((name, path)) => match fs::read_to_string(path) {
                Ok(content) => match ReplayCollector::parse_ndjson(&content) {
                    Ok(readings) if readings.is_empty() => DoctorCheck {
                        name: format!("feed:{}", name),
                        status: CheckStatus::Warning,
                        message: "Feed is empty".to_string(),
                    },
                    Ok(readings) => DoctorCheck {
                        name: format!("feed:{}", name),
                        status: CheckStatus::Ok,
                        message: format!(
                            "{} readings ({} with data)",
                            readings.len(),
                            readings.iter().filter(|r| r.signal.is_some()).count()
                        ),
                    },
                    Err(e) => DoctorCheck {
                        name: format!("feed:{}", name),
                        status: CheckStatus::Error,
                        message: e.to_string(),
                    },
                },
                Err(e) => DoctorCheck {
                    name: format!("feed:{}", name),
                    status: CheckStatus::Error,
                    message: format!("Cannot read feed file: {}", e),
                },
            },
            Err(e) => DoctorCheck {
                name: "feed".to_string(),
                status: CheckStatus::Error,
                message: CliError::from(e).message,
            },
        };
        checks.push(check);
    }

    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (interactive mode)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (score - ready)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: VIBE_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Vibe Doctor Report");
        println!("==================");
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
        Err(VibeCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

fn cmd_schema(schema_type: SchemaType) -> Result<(), VibeCliError> {
    match schema_type {
        SchemaType::Input => {
            println!("Replay feed: NDJSON, one reading per line");
            println!();
            println!("- available: bool (default true)");
            println!("- quality: number 0-1 (default 1.0)");
            println!("- signal: tagged payload, omitted when there is nothing to report");
            println!("    {{\"type\": \"location\", \"urban_density\", \"venue\": {{ id, name, confidence }}}}");
            println!("    {{\"type\": \"movement\", \"activity\": stationary|walking|running|transit|unknown}}");
            println!("    {{\"type\": \"temporal\", \"hour\", \"is_weekend\"}}");
            println!("    {{\"type\": \"behavioral\", \"pattern\": {{ kind: social_night|adventure|exploration|routine, confidence }}}}");
            println!("- error: string, makes collection fail for that tick");
            println!("- delay_ms: integer, simulated collection latency");
        }
        SchemaType::Output => {
            println!("Output Schema: {}", floq_vibe::encoder::STATE_SCHEMA_VERSION);
            println!();
            println!("- schema_version, producer: {{ name, version, instance_id }}");
            println!("- encoded_at_utc, freshness_sec");
            println!("- state:");
            println!("  - current_vibe: {{ t, energy, confidence, sources }}");
            println!("  - recent_snapshots: [{{ id, timestamp, sources, quality, availability }}]");
            println!("  - signal_health: {{ <collector>: quality }}");
            println!("  - last_update");
        }
    }

    Ok(())
}

// Helper functions

fn read_input(input: &Path) -> Result<String, VibeCliError> {
    if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn utc_offset(hours: i32) -> Result<FixedOffset, VibeCliError> {
    hours
        .checked_mul(3600)
        .and_then(FixedOffset::east_opt)
        .ok_or(VibeCliError::InvalidOffset(hours))
}

fn parse_feed_arg(arg: &str) -> Result<(&str, &Path), VibeCliError> {
    match arg.split_once('=') {
        Some((name, path)) if !name.is_empty() && !path.is_empty() => Ok((name, Path::new(path))),
        _ => Err(VibeCliError::InvalidFeedArg(arg.to_string())),
    }
}

fn parse_snapshot_ndjson(ndjson: &str) -> Result<Vec<SignalSnapshot>, VibeCliError> {
    let mut snapshots = Vec::new();
    for (line_num, line) in ndjson.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let snapshot: SignalSnapshot = serde_json::from_str(trimmed).map_err(|e| {
            VibeCliError::ParseError(format!("Failed to parse line {}: {}", line_num + 1, e))
        })?;
        snapshot.validate().map_err(|e| {
            VibeCliError::ParseError(format!("Invalid snapshot on line {}: {}", line_num + 1, e))
        })?;
        snapshots.push(snapshot);
    }
    Ok(snapshots)
}

// Error types

#[derive(Debug)]
enum VibeCliError {
    Io(io::Error),
    Engine(floq_vibe::VibeError),
    Json(serde_json::Error),
    InvalidFeedArg(String),
    InvalidOffset(i32),
    NoCollectors,
    NoSnapshots,
    DoctorFailed,
    ParseError(String),
}

impl From<io::Error> for VibeCliError {
    fn from(e: io::Error) -> Self {
        VibeCliError::Io(e)
    }
}

impl From<floq_vibe::VibeError> for VibeCliError {
    fn from(e: floq_vibe::VibeError) -> Self {
        VibeCliError::Engine(e)
    }
}

impl From<serde_json::Error> for VibeCliError {
    fn from(e: serde_json::Error) -> Self {
        VibeCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<VibeCliError> for CliError {
    fn from(e: VibeCliError) -> Self {
        match e {
            VibeCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            VibeCliError::Engine(e) => CliError {
                code: "ENGINE_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Run 'vibe doctor' to check config and feeds".to_string()),
            },
            VibeCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            VibeCliError::InvalidFeedArg(arg) => CliError {
                code: "INVALID_FEED_ARG".to_string(),
                message: format!("Invalid feed argument '{}'", arg),
                hint: Some("Use --feed NAME=PATH".to_string()),
            },
            VibeCliError::InvalidOffset(hours) => CliError {
                code: "INVALID_OFFSET".to_string(),
                message: format!("UTC offset {} hours is out of range", hours),
                hint: Some("Use an offset between -23 and 23".to_string()),
            },
            VibeCliError::NoCollectors => CliError {
                code: "NO_COLLECTORS".to_string(),
                message: "No collectors registered".to_string(),
                hint: Some("Pass --feed or drop --no-temporal".to_string()),
            },
            VibeCliError::NoSnapshots => CliError {
                code: "NO_SNAPSHOTS".to_string(),
                message: "No snapshots found in input".to_string(),
                hint: Some("Ensure input file is not empty or pass --at".to_string()),
            },
            VibeCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
            VibeCliError::ParseError(msg) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: msg,
                hint: Some("Check input format".to_string()),
            },
        }
    }
}

// Report types

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
