// src/logging.rs

//! Logging for `testwatch` via `tracing` + `tracing-subscriber`.
//!
//! Level resolution order:
//! 1. `--log-level` CLI flag
//! 2. `TESTWATCH_LOG` environment variable, full `EnvFilter` syntax, so
//!    `TESTWATCH_LOG=info,testwatch::watchdog=trace` works
//! 3. default `info`
//!
//! Everything goes to stderr. Stdout is reserved for run summaries and
//! the captured output of failing tests.

use anyhow::Result;
use tracing_subscriber::{fmt, EnvFilter};

use crate::cli::LogLevel;

/// Install the global subscriber. Call once at startup.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let filter = match cli_level {
        Some(level) => EnvFilter::new(directive(level)),
        None => {
            EnvFilter::try_from_env("TESTWATCH_LOG").unwrap_or_else(|_| EnvFilter::new("info"))
        }
    };

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}

fn directive(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    }
}
