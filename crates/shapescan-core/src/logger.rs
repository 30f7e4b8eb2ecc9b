//! Process-wide log sinks.
//!
//! Stages only talk to the `log` facade. Binaries pick a sink once at
//! startup: [`init_with_level`] prints `[elapsed LEVEL stage] message` to
//! stderr, [`init_tracing`] (feature `tracing`) installs a
//! `tracing-subscriber` formatter filtered by `RUST_LOG`.
//!
//! Both sinks apply the requested level to the pipeline crates only;
//! records from dependencies (image decoders, thread pools, HTTP stack) are
//! kept at `warn` or quieter.

use std::fmt::Arguments;
use std::io::Write;
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use log::{Level, LevelFilter, Log, Metadata, Record};

#[cfg(feature = "tracing")]
use tracing_subscriber::fmt::format::FmtSpan;
#[cfg(feature = "tracing")]
use tracing_subscriber::util::SubscriberInitExt;
#[cfg(feature = "tracing")]
use tracing_subscriber::{fmt, EnvFilter};

/// Crates whose records follow the requested level.
pub const PIPELINE_CRATES: [&str; 6] = [
    "shapescan",
    "shapescan_core",
    "shapescan_fiducial",
    "shapescan_segment",
    "shapescan_vector",
    "shapescan_server",
];

/// Whether `target` belongs to one of [`PIPELINE_CRATES`].
pub fn is_pipeline_target(target: &str) -> bool {
    let krate = target.split("::").next().unwrap_or(target);
    PIPELINE_CRATES.contains(&krate)
}

/// Level actually applied to `target` when `level` was requested.
fn effective_level(level: LevelFilter, target: &str) -> LevelFilter {
    if is_pipeline_target(target) {
        level
    } else {
        level.min(LevelFilter::Warn)
    }
}

/// `EnvFilter` directive equivalent to the stderr logger's filtering.
pub fn default_directive(level: LevelFilter) -> String {
    let own = level.to_string().to_lowercase();
    let rest = level.min(LevelFilter::Warn).to_string().to_lowercase();
    let mut directive = rest;
    for krate in PIPELINE_CRATES {
        directive.push_str(&format!(",{krate}={own}"));
    }
    directive
}

/// Record target without the crate prefix the pipeline crates share:
/// `shapescan_fiducial::detect` becomes `fiducial::detect`.
fn stage_name(target: &str) -> &str {
    if let Some(rest) = target.strip_prefix("shapescan_") {
        rest
    } else if let Some(rest) = target.strip_prefix("shapescan::") {
        rest
    } else {
        target
    }
}

/// One stderr line, newline included.
fn format_line(elapsed: Duration, level: Level, target: &str, args: &Arguments) -> String {
    format!(
        "[{:8.3}s {:>5} {}] {}\n",
        elapsed.as_secs_f64(),
        level,
        stage_name(target),
        args
    )
}

struct StderrLogger {
    level: LevelFilter,
    started: Instant,
}

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= effective_level(self.level, metadata.target())
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format_line(
            self.started.elapsed(),
            record.level(),
            record.target(),
            record.args(),
        );
        // one write per record so lines from parallel stages stay whole
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

static LOGGER: OnceLock<StderrLogger> = OnceLock::new();

/// Install the stderr logger with the provided level filter.
///
/// Only the first call installs; later calls are no-ops.
pub fn init_with_level(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    if LOGGER.get().is_none() {
        let logger = LOGGER.get_or_init(|| StderrLogger {
            level,
            started: Instant::now(),
        });
        log::set_logger(logger)?;
        log::set_max_level(level);
    }
    Ok(())
}

/// Install a `tracing` subscriber. `RUST_LOG` wins over `default_directive`,
/// usually built by [`default_directive`].
#[cfg(feature = "tracing")]
pub fn init_tracing(json: bool, default_directive: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    let base = fmt()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::CLOSE);
    let _ = if json {
        base.json().flatten_event(true).finish().try_init()
    } else {
        base.with_timer(fmt::time::Uptime::default())
            .finish()
            .try_init()
    };
}
