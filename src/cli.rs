// src/cli.rs

//! Command line interface definitions using `clap`.

use clap::{Parser, ValueEnum};

/// Continuously run your project's tests while you edit.
#[derive(Parser, Debug, Clone)]
#[command(name = "testwatch", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short, long, default_value = "Testwatch.toml")]
    pub config: String,

    /// Run the test suite once and exit instead of watching for changes.
    #[arg(long)]
    pub once: bool,

    /// Log level (overrides TESTWATCH_LOG).
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Print the resolved configuration and selected test set, then exit.
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Parse CLI arguments from `std::env::args`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
