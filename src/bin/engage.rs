//! Engage CLI - Command-line interface for the routine engagement engine
//!
//! Commands:
//! - evaluate: Score session metrics as a practice summary or test result
//! - simulate: Run a synthetic camera stream through a real capture session
//! - insight: Compare the two most recent practice sessions
//! - doctor: Diagnose configuration and storage files

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use routine_engage::clock::ManualClock;
use routine_engage::config::EngageConfig;
use routine_engage::flow::{ScreenFlow, SessionMode};
use routine_engage::history::SessionHistory;
use routine_engage::pipeline::{parse_metrics, EngagementProcessor};
use routine_engage::sampler::RgbaFrameSource;
use routine_engage::scheduler::ManualScheduler;
use routine_engage::scoring::compare_engagement_insight;
use routine_engage::store::{MemoryStore, ResultStore};
use routine_engage::types::SessionTag;
use routine_engage::{EngageError, ENGINE_VERSION, PRODUCER_NAME};

/// Engage - Camera-based engagement scoring for routine practice
#[derive(Parser)]
#[command(name = "engage")]
#[command(version = ENGINE_VERSION)]
#[command(about = "Score practice and test sessions from camera motion", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score session metrics (practice summary or test result)
    Evaluate {
        /// Metrics JSON file (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Which results screen to produce
        #[arg(long, default_value = "practice")]
        mode: Mode,

        /// Engine configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Store snapshot to load and update with the scored session
        #[arg(long)]
        store: Option<PathBuf>,

        /// User the session belongs to
        #[arg(long, default_value = "local")]
        user: String,

        /// Activity label stored with the session
        #[arg(long, default_value = "Practice")]
        activity: String,

        /// Routine the session belongs to
        #[arg(long)]
        routine: Option<String>,

        /// Output format
        #[arg(long, default_value = "json-pretty")]
        output_format: OutputFormat,
    },

    /// Run a synthetic frame stream through a capture session
    Simulate {
        /// Which results screen to produce
        #[arg(long, default_value = "practice")]
        mode: Mode,

        /// Session length in seconds
        #[arg(long, default_value = "30")]
        duration_sec: f64,

        /// Display refresh rate driving the frame callbacks
        #[arg(long, default_value = "60")]
        fps: u32,

        /// Native frame width in pixels
        #[arg(long, default_value = "320")]
        width: u32,

        /// Native frame height in pixels
        #[arg(long, default_value = "240")]
        height: u32,

        /// Seconds of still frames before any movement
        #[arg(long, default_value = "0")]
        still_sec: f64,

        /// Change the scene every N display frames (0 keeps it still)
        #[arg(long, default_value = "12")]
        motion_every: u32,

        /// Engine configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output format
        #[arg(long, default_value = "json-pretty")]
        output_format: OutputFormat,
    },

    /// Compare the two most recent practice sessions of a user
    Insight {
        /// Store snapshot to read sessions from
        #[arg(long, conflicts_with = "history")]
        store: Option<PathBuf>,

        /// Practice history file to read sessions from
        #[arg(long)]
        history: Option<PathBuf>,

        /// User to look up in the store
        #[arg(long, default_value = "local")]
        user: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose configuration and storage files
    Doctor {
        /// Check a configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Check a store snapshot
        #[arg(long)]
        store: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    /// Practice summary with tip and insight
    Practice,
    /// Test result with final score and tier
    Test,
}

impl From<Mode> for SessionMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Practice => SessionMode::Practice,
            Mode::Test => SessionMode::Test,
        }
    }
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Single-line JSON
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string()));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), EngageCliError> {
    match cli.command {
        Commands::Evaluate {
            input,
            mode,
            config,
            store,
            user,
            activity,
            routine,
            output_format,
        } => {
            let mut tag = SessionTag::new(user, activity);
            if let Some(routine) = routine {
                tag = tag.with_routine(routine);
            }
            cmd_evaluate(
                &input,
                mode,
                config.as_deref(),
                store.as_deref(),
                &tag,
                &output_format,
            )
        }
        Commands::Simulate {
            mode,
            duration_sec,
            fps,
            width,
            height,
            still_sec,
            motion_every,
            config,
            output_format,
        } => {
            let stream = SyntheticStream {
                duration_sec,
                fps,
                width,
                height,
                still_sec,
                motion_every,
            };
            cmd_simulate(mode, &stream, config.as_deref(), &output_format)
        }
        Commands::Insight {
            store,
            history,
            user,
            json,
        } => cmd_insight(store.as_deref(), history.as_deref(), &user, json),
        Commands::Doctor { config, store, json } => {
            cmd_doctor(config.as_deref(), store.as_deref(), json)
        }
    }
}

fn cmd_evaluate(
    input: &Path,
    mode: Mode,
    config: Option<&Path>,
    store: Option<&Path>,
    tag: &SessionTag,
    output_format: &OutputFormat,
) -> Result<(), EngageCliError> {
    let config = load_config(config)?;

    let input_data = if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        fs::read_to_string(input)?
    };
    let metrics = parse_metrics(&input_data)?;

    let snapshot = match store {
        Some(path) if path.exists() => MemoryStore::from_json(&fs::read_to_string(path)?)?,
        _ => MemoryStore::new(),
    };
    let mut processor = EngagementProcessor::with_store(snapshot).with_scoring(config.scoring);

    let output = match mode {
        Mode::Practice => format_output(&processor.complete_practice(tag, metrics), output_format)?,
        Mode::Test => format_output(&processor.complete_test(tag, metrics), output_format)?,
    };

    if let (Some(path), Some(snapshot)) = (store, processor.store()) {
        fs::write(path, snapshot.to_json()?)?;
        debug!(path = %path.display(), "store snapshot written");
    }

    println!("{}", output);
    Ok(())
}

/// Shape of the generated camera stream
struct SyntheticStream {
    duration_sec: f64,
    fps: u32,
    width: u32,
    height: u32,
    still_sec: f64,
    motion_every: u32,
}

impl SyntheticStream {
    /// Scene brightness for display frame `index`
    fn brightness(&self, index: u64, elapsed_ms: i64) -> u8 {
        if self.motion_every == 0 || (elapsed_ms as f64) < self.still_sec * 1000.0 {
            return 0;
        }
        if (index / self.motion_every as u64) % 2 == 0 {
            0
        } else {
            255
        }
    }
}

fn cmd_simulate(
    mode: Mode,
    stream: &SyntheticStream,
    config: Option<&Path>,
    output_format: &OutputFormat,
) -> Result<(), EngageCliError> {
    if stream.fps == 0 || stream.width == 0 || stream.height == 0 {
        return Err(EngageCliError::InvalidArgument(
            "fps, width and height must be positive".to_string(),
        ));
    }
    if !(stream.duration_sec >= 0.0) {
        return Err(EngageCliError::InvalidArgument(
            "duration must be non-negative".to_string(),
        ));
    }
    let config = load_config(config)?;

    let clock = ManualClock::new(0);
    let frames = ManualScheduler::new();
    let mut flow = ScreenFlow::with_config(mode.into(), clock.clone(), frames.clone(), config);
    let mut source = RgbaFrameSource::new();
    let frame_len = (stream.width as usize)
        .checked_mul(stream.height as usize)
        .and_then(|pixels| pixels.checked_mul(4))
        .ok_or_else(|| EngageCliError::InvalidArgument("frame dimensions are too large".to_string()))?;
    let mut pixels = vec![0u8; frame_len];

    let frame_ms = 1000.0 / stream.fps as f64;
    let total_frames = (stream.duration_sec * stream.fps as f64).round() as u64;

    flow.begin_recording()?;
    for index in 1..=total_frames {
        let now = (index as f64 * frame_ms).round() as i64;
        clock.set(now);
        pixels.fill(stream.brightness(index, now));
        source.push_frame(stream.width, stream.height, &pixels)?;
        if let Some(id) = frames.next_frame() {
            flow.on_frame(id, &source);
        }
    }
    let sampled = flow.session().frames_sampled();
    let outcome = flow.finish()?;
    info!(display_frames = total_frames, sampled, "simulation finished");

    println!("{}", format_output(outcome, output_format)?);
    Ok(())
}

fn cmd_insight(
    store: Option<&Path>,
    history: Option<&Path>,
    user: &str,
    json: bool,
) -> Result<(), EngageCliError> {
    let recent = match (store, history) {
        (Some(path), _) => MemoryStore::from_json(&fs::read_to_string(path)?)?.recent_practice(user, 2),
        (None, Some(path)) => SessionHistory::from_json(&fs::read_to_string(path)?)?.last(2),
        (None, None) => {
            return Err(EngageCliError::InvalidArgument(
                "pass --store or --history".to_string(),
            ))
        }
    };

    let last = recent.first().map(|s| s.engagement_score);
    let previous = recent.get(1).map(|s| s.engagement_score);
    let message = compare_engagement_insight(last, previous);

    if json {
        let report = InsightReport {
            last,
            previous,
            insight: message.to_string(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", message);
    }
    Ok(())
}

fn cmd_doctor(config: Option<&Path>, store: Option<&Path>, json: bool) -> Result<(), EngageCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "engine_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Engine version {}", ENGINE_VERSION),
    });

    if let Some(config_path) = config {
        checks.push(match fs::read_to_string(config_path) {
            Ok(content) => match EngageConfig::from_json(&content) {
                Ok(config) => DoctorCheck {
                    name: "config".to_string(),
                    status: CheckStatus::Ok,
                    message: format!(
                        "Sampling every {} ms at {}x scale",
                        config.sampler.sample_interval_ms, config.sampler.downscale
                    ),
                },
                Err(e) => DoctorCheck {
                    name: "config".to_string(),
                    status: CheckStatus::Error,
                    message: format!("Invalid config: {}", e),
                },
            },
            Err(e) => DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Error,
                message: format!("Cannot read config file: {}", e),
            },
        });
    } else {
        checks.push(DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Ok,
            message: "Using built-in defaults".to_string(),
        });
    }

    if let Some(store_path) = store {
        if store_path.exists() {
            checks.push(match fs::read_to_string(store_path) {
                Ok(content) => match MemoryStore::from_json(&content) {
                    Ok(snapshot) => DoctorCheck {
                        name: "store".to_string(),
                        status: CheckStatus::Ok,
                        message: format!(
                            "{} practice and {} test records",
                            snapshot.practice_records().count(),
                            snapshot.test_records().count()
                        ),
                    },
                    Err(e) => DoctorCheck {
                        name: "store".to_string(),
                        status: CheckStatus::Error,
                        message: format!("Invalid store snapshot: {}", e),
                    },
                },
                Err(e) => DoctorCheck {
                    name: "store".to_string(),
                    status: CheckStatus::Error,
                    message: format!("Cannot read store file: {}", e),
                },
            });
        } else {
            checks.push(DoctorCheck {
                name: "store".to_string(),
                status: CheckStatus::Warning,
                message: "Store file does not exist yet".to_string(),
            });
        }
    }

    // Metrics can be piped into `evaluate --input -`
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
            message: "stdin is a pipe (metrics can be read with --input -)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: ENGINE_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Engage Doctor Report");
        println!("====================");
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

    let has_errors = report.checks.iter().any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(EngageCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

// Helper functions

fn load_config(path: Option<&Path>) -> Result<EngageConfig, EngageCliError> {
    match path {
        Some(path) => Ok(EngageConfig::from_json(&fs::read_to_string(path)?)?),
        None => Ok(EngageConfig::default()),
    }
}

fn format_output<T: Serialize + ?Sized>(value: &T, format: &OutputFormat) -> Result<String, EngageCliError> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string(value)?),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(value)?),
    }
}

// Error types

#[derive(Debug)]
enum EngageCliError {
    Io(io::Error),
    Engine(EngageError),
    Json(serde_json::Error),
    InvalidArgument(String),
    DoctorFailed,
}

impl From<io::Error> for EngageCliError {
    fn from(e: io::Error) -> Self {
        EngageCliError::Io(e)
    }
}

impl From<EngageError> for EngageCliError {
    fn from(e: EngageError) -> Self {
        EngageCliError::Engine(e)
    }
}

impl From<serde_json::Error> for EngageCliError {
    fn from(e: serde_json::Error) -> Self {
        EngageCliError::Json(e)
    }
}

#[derive(Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<EngageCliError> for CliError {
    fn from(e: EngageCliError) -> Self {
        match e {
            EngageCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            EngageCliError::Engine(EngageError::Config(msg)) => CliError {
                code: "CONFIG_ERROR".to_string(),
                message: msg,
                hint: Some("Run 'engage doctor --config <file>' for details".to_string()),
            },
            EngageCliError::Engine(e) => CliError {
                code: "ENGINE_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Scores must be 0-100 and times non-negative".to_string()),
            },
            EngageCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            EngageCliError::InvalidArgument(msg) => CliError {
                code: "INVALID_ARGUMENT".to_string(),
                message: msg,
                hint: Some("Run 'engage help' for usage".to_string()),
            },
            EngageCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(Serialize)]
struct InsightReport {
    last: Option<u32>,
    previous: Option<u32>,
    insight: String,
}

#[derive(Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
