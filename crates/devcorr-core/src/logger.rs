//! Stderr logging for the engine crates and the CLI.
//!
//! Library code only talks to the `log` facade. Binaries install either the
//! plain stderr backend ([`init_with_level`]) or, with the `tracing` feature,
//! a `tracing-subscriber` pipeline ([`init_tracing`]).

use std::fmt::Arguments;
use std::io::Write;
use std::sync::OnceLock;
use std::time::Instant;

use log::{Level, LevelFilter, Log, Metadata, Record};

#[cfg(feature = "tracing")]
use tracing_subscriber::fmt::format::FmtSpan;
#[cfg(feature = "tracing")]
use tracing_subscriber::util::SubscriberInitExt;
#[cfg(feature = "tracing")]
use tracing_subscriber::{fmt, EnvFilter};

/// Records from outside the `devcorr` crates are capped at this level.
const FOREIGN_LEVEL: LevelFilter = LevelFilter::Warn;

fn is_engine_target(target: &str) -> bool {
    target.starts_with("devcorr")
}

/// `devcorr_rows::simulate` -> `rows::simulate`.
fn short_target(target: &str) -> &str {
    target
        .strip_prefix("devcorr_")
        .or_else(|| target.strip_prefix("devcorr::"))
        .unwrap_or(target)
}

fn format_line(elapsed: f64, level: Level, target: &str, args: &Arguments<'_>) -> String {
    format!("{elapsed:>8.3}s {level:<5} {}: {args}", short_target(target))
}

struct EngineLogger {
    level: LevelFilter,
    started: Instant,
}

impl Log for EngineLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        let cap = if is_engine_target(metadata.target()) {
            self.level
        } else {
            self.level.min(FOREIGN_LEVEL)
        };
        metadata.level() <= cap
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format_line(
            self.started.elapsed().as_secs_f64(),
            record.level(),
            record.target(),
            record.args(),
        );
        let _ = writeln!(std::io::stderr().lock(), "{line}");
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

static LOGGER: OnceLock<EngineLogger> = OnceLock::new();

/// Install the stderr logger; `level` applies to the engine crates, other
/// targets never go below `warn`.
///
/// Later calls keep the first logger.
pub fn init_with_level(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    if LOGGER.get().is_some() {
        return Ok(());
    }
    let logger = LOGGER.get_or_init(|| EngineLogger {
        level,
        started: Instant::now(),
    });
    log::set_logger(logger)?;
    log::set_max_level(level);
    Ok(())
}

/// Install a `tracing` subscriber filtered by `RUST_LOG` (default `info`).
///
/// Span close events carry the timing of instrumented engine calls.
#[cfg(feature = "tracing")]
pub fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(std::io::stderr);
    let _ = if json {
        builder.json().flatten_event(true).finish().try_init()
    } else {
        builder
            .with_timer(fmt::time::Uptime::default())
            .finish()
            .try_init()
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_targets_are_shortened() {
        assert_eq!(short_target("devcorr_rows::simulate"), "rows::simulate");
        assert_eq!(short_target("devcorr::io"), "io");
        assert_eq!(short_target("hyper::client"), "hyper::client");
    }

    #[test]
    fn line_layout() {
        let line = format_line(
            1.5,
            Level::Warn,
            "devcorr_optimize::optimizer",
            &format_args!("layer {} rejected", "carbon"),
        );
        assert_eq!(line, "   1.500s WARN  optimize::optimizer: layer carbon rejected");
    }

    #[test]
    fn foreign_targets_are_capped() {
        let logger = EngineLogger {
            level: LevelFilter::Debug,
            started: Instant::now(),
        };
        let meta = |level, target| Metadata::builder().level(level).target(target).build();
        assert!(logger.enabled(&meta(Level::Debug, "devcorr_rows::tilt")));
        assert!(!logger.enabled(&meta(Level::Info, "criterion")));
        assert!(logger.enabled(&meta(Level::Warn, "criterion")));
        assert!(!logger.enabled(&meta(Level::Trace, "devcorr_rows::tilt")));
    }
}
