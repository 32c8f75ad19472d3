//! Process-wide logging setup.
//!
//! Library code only talks to the `log` facade. Binaries install either the
//! stderr logger below (`init_with_level`, `init_from_env`) or, with the
//! `tracing` feature, a `tracing-subscriber` pipeline (`init_tracing`) that
//! also receives `log` records.

use std::io::Write;
use std::str::FromStr;
use std::sync::OnceLock;
use std::time::Instant;

use log::{LevelFilter, Log, Metadata, Record};

#[cfg(feature = "tracing")]
use tracing_subscriber::fmt::format::FmtSpan;
#[cfg(feature = "tracing")]
use tracing_subscriber::util::SubscriberInitExt;
#[cfg(feature = "tracing")]
use tracing_subscriber::{fmt, EnvFilter};

/// Environment variable read by [`init_from_env`].
pub const LOG_ENV: &str = "CALIB_JOBS_LOG";

/// Writes `[elapsed LEVEL module] message` lines to stderr.
struct JobLogger {
    level: LevelFilter,
    started: Instant,
}

impl JobLogger {
    /// `calib_jobs::runner` -> `runner`; foreign targets are kept whole.
    fn short_target(target: &str) -> &str {
        match target.split_once("::") {
            Some((krate, rest)) if krate.starts_with("calib_jobs") => rest,
            _ => target,
        }
    }
}

impl Log for JobLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format!(
            "[{:8.3}s {:>5} {}] {}\n",
            self.started.elapsed().as_secs_f64(),
            record.level(),
            Self::short_target(record.target()),
            record.args()
        );
        // Single write: lines from concurrent jobs must not interleave.
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

static LOGGER: OnceLock<JobLogger> = OnceLock::new();

/// Install the stderr logger with the provided level filter.
///
/// Only the first call installs the logger; later calls return `Ok(())`
/// without changing the level.
pub fn init_with_level(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    if LOGGER.get().is_none() {
        let logger = LOGGER.get_or_init(|| JobLogger {
            level,
            started: Instant::now(),
        });
        log::set_logger(logger)?;
        log::set_max_level(level);
    }
    Ok(())
}

/// Level named by `CALIB_JOBS_LOG` (`off`, `error` .. `trace`), or `fallback`
/// when unset or unparsable.
pub fn level_from_env(fallback: LevelFilter) -> LevelFilter {
    std::env::var(LOG_ENV)
        .ok()
        .and_then(|raw| LevelFilter::from_str(raw.trim()).ok())
        .unwrap_or(fallback)
}

/// [`init_with_level`] at the level from [`level_from_env`].
pub fn init_from_env(fallback: LevelFilter) -> Result<(), log::SetLoggerError> {
    init_with_level(level_from_env(fallback))
}

/// Install a `tracing` subscriber filtered by `RUST_LOG` (default `info`).
///
/// Span close events are emitted so instrumented job stages report their
/// duration. `json` switches to flattened JSON lines for log shippers.
#[cfg(feature = "tracing")]
pub fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(true);
    let _ = if json {
        builder.json().flatten_event(true).finish().try_init()
    } else {
        builder
            .with_timer(fmt::time::Uptime::default())
            .finish()
            .try_init()
    };
}
