//! calib-jobs CLI: check job payloads and inspect persisted runs.

use std::{
    fs,
    path::{Path, PathBuf},
    process::ExitCode,
};

use calib_jobs::{
    init_from_env, init_with_level, retrieve_run, CalibrationError, FsStore, JobDescriptor,
    RunStore, StorageSettings,
};
use clap::{Parser, Subcommand, ValueEnum};
use log::LevelFilter;

#[derive(Debug, Parser)]
#[command(name = "calib-jobs")]
#[command(about = "Checkerboard calibration job payloads and stored runs")]
#[command(version)]
struct Cli {
    /// Log verbosity written to stderr. Defaults to `CALIB_JOBS_LOG`, then `warn`.
    #[arg(long, value_enum, global = true)]
    log_level: Option<LogLevel>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Validate a job payload and print its normalized metadata.
    Validate {
        /// Path to the JSON job payload.
        payload: PathBuf,
    },

    /// Print the stored result (and metadata) of a run.
    Show {
        run_id: String,

        /// Object store root. Defaults to the bucket under a `file://`
        /// `R2_ENDPOINT_URL` from the environment or `.env`.
        #[arg(long)]
        store: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

/// Process exit status for a failed command.
#[derive(Debug)]
struct Failure {
    code: u8,
    message: String,
}

impl Failure {
    fn general(err: impl std::fmt::Display) -> Self {
        Self {
            code: 1,
            message: err.to_string(),
        }
    }
}

impl From<CalibrationError> for Failure {
    fn from(err: CalibrationError) -> Self {
        let code = match &err {
            CalibrationError::Validation(_) => 2,
            CalibrationError::NotFound { .. } => 3,
            _ => 1,
        };
        Self {
            code,
            message: err.to_string(),
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let installed = match cli.log_level {
        Some(level) => init_with_level(level.into()),
        None => init_from_env(LevelFilter::Warn),
    };
    if let Err(err) = installed {
        eprintln!("warning: logger already set: {err}");
    }

    let outcome = match cli.command {
        Commands::Validate { payload } => run_validate(&payload),
        Commands::Show { run_id, store } => run_show(&run_id, store),
    };

    match outcome {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(failure) => {
            eprintln!("error: {}", failure.message);
            ExitCode::from(failure.code)
        }
    }
}

fn run_validate(path: &Path) -> Result<String, Failure> {
    let raw = fs::read_to_string(path)
        .map_err(|err| Failure::general(format!("{}: {err}", path.display())))?;
    let job = JobDescriptor::from_json(&raw).map_err(CalibrationError::from)?;
    log::info!(
        "payload `{}` is valid: {} images, board {}",
        path.display(),
        job.images().len(),
        job.board()
    );

    let normalized = serde_json::json!({
        "metadata": job.metadata(),
        "images": job.images(),
    });
    serde_json::to_string_pretty(&normalized).map_err(Failure::general)
}

fn run_show(run_id: &str, root: Option<PathBuf>) -> Result<String, Failure> {
    let objects = match root {
        Some(root) => FsStore::new(root),
        None => {
            dotenvy::dotenv().ok();
            let settings = StorageSettings::from_env().map_err(Failure::general)?;
            log::debug!("storage settings: {settings:?}");
            FsStore::from_settings(&settings).map_err(Failure::general)?
        }
    };
    log::debug!("reading runs under {}", objects.root().display());

    let stored = retrieve_run(&RunStore::new(objects), run_id)?;
    serde_json::to_string_pretty(&stored).map_err(Failure::general)
}
