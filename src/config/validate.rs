// src/config/validate.rs

//! Resolution from the raw TOML model into the runtime [`Config`].
//!
//! Resolution is where defaults, deprecated aliases and cross-section
//! plumbing meet:
//!
//! - filter patterns are compiled (and rejected early when invalid),
//! - duration strings become `Duration`s,
//! - deprecated `[test]` console options are folded into `[console]`,
//!   each with its own fallback rule,
//! - the `[launch]` section picks up `arg_line` and `wait_time` from
//!   `[test]` to form a complete launch spec.

use std::path::PathBuf;
use std::time::Duration;

use regex::Regex;
use tracing::warn;

use crate::config::model::{RawConfigFile, RunnerSection, TestSection, WatchSection};
use crate::errors::{Result, TestwatchError};
use crate::exec::launch::LaunchSpec;
use crate::filter::TestFilter;
use crate::types::{RunMode, TestType};

/// Fully resolved runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub mode: RunMode,
    pub display_test_output: bool,
    pub filter: TestFilter,
    pub test_type: TestType,
    pub only_application_module: bool,
    pub hang_timeout: Duration,
    pub wait_time: Duration,
    pub console: ConsoleConfig,
    pub runner: RunnerConfig,
    pub launch: Option<LaunchSpec>,
    pub watch: WatchConfig,
    pub inventory_path: PathBuf,
}

/// Resolved `[console]` options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsoleConfig {
    pub enabled: bool,
    pub colors: bool,
    pub input: bool,
    pub basic: bool,
}

/// Resolved test runner commands, one per test kind.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub unit_command: String,
    pub framework_command: String,
}

/// Resolved `[watch]` options.
#[derive(Debug, Clone)]
pub struct WatchConfig {
    pub paths: Vec<String>,
    pub exclude: Vec<String>,
    pub use_hash: bool,
}

impl TryFrom<RawConfigFile> for Config {
    type Error = TestwatchError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        let filter = TestFilter::from_parts(
            raw.test.include_tags.clone(),
            raw.test.exclude_tags.clone(),
            raw.test.include_pattern.as_deref(),
            raw.test.exclude_pattern.as_deref(),
            raw.test.include_module_pattern.as_deref(),
            raw.test.exclude_module_pattern.as_deref(),
        )?;

        let hang_timeout =
            parse_config_duration("hang_detection_timeout", &raw.test.hang_detection_timeout)?;
        let wait_time = parse_config_duration("wait_time", &raw.test.wait_time)?;

        let console = resolve_console(&raw);
        let runner = resolve_runner(&raw.runner)?;
        let launch = raw
            .launch
            .as_ref()
            .map(|section| {
                let ready_pattern = Regex::new(&section.ready_pattern).map_err(|err| {
                    TestwatchError::ConfigError(format!(
                        "[launch].ready_pattern is not a valid regex: {err}"
                    ))
                })?;
                if section.target.trim().is_empty() {
                    return Err(TestwatchError::ConfigError(
                        "[launch].target must not be empty".to_string(),
                    ));
                }
                Ok(LaunchSpec {
                    artifact: section.artifact,
                    target: section.target.clone(),
                    arg_line: raw.test.arg_line.clone(),
                    wait_time,
                    ready_pattern,
                })
            })
            .transpose()?;

        Ok(Config {
            mode: raw.test.continuous_testing,
            display_test_output: raw.test.display_test_output,
            filter,
            test_type: raw.test.test_type,
            only_application_module: raw.test.only_application_module,
            hang_timeout,
            wait_time,
            console,
            runner,
            launch,
            watch: resolve_watch(&raw.watch),
            inventory_path: PathBuf::from(&raw.discovery.inventory),
        })
    }
}

fn resolve_watch(watch: &WatchSection) -> WatchConfig {
    WatchConfig {
        paths: watch.paths.clone(),
        exclude: watch.exclude.clone(),
        use_hash: watch.use_hash,
    }
}

fn resolve_runner(runner: &RunnerSection) -> Result<RunnerConfig> {
    let unit = runner
        .unit_command
        .clone()
        .or_else(|| runner.framework_command.clone());
    let framework = runner
        .framework_command
        .clone()
        .or_else(|| runner.unit_command.clone());

    match (unit, framework) {
        (Some(unit), Some(framework))
            if !unit.trim().is_empty() && !framework.trim().is_empty() =>
        {
            Ok(RunnerConfig {
                unit_command: unit,
                framework_command: framework,
            })
        }
        _ => Err(TestwatchError::ConfigError(
            "[runner] must set unit_command or framework_command".to_string(),
        )),
    }
}

/// Fold the deprecated `[test]` console options into `[console]`.
///
/// Each option resolves independently: the `[console]` value wins when set,
/// otherwise the deprecated alias applies (with inversion where the old name
/// was a `disable_*` flag), otherwise the default.
fn resolve_console(raw: &RawConfigFile) -> ConsoleConfig {
    ConsoleConfig {
        enabled: resolve_console_enabled(raw.console.enabled, &raw.test),
        colors: resolve_console_colors(raw.console.colors, &raw.test),
        input: resolve_console_input(raw.console.input, &raw.test),
        basic: resolve_console_basic(raw.console.basic, &raw.test),
    }
}

fn resolve_console_enabled(primary: Option<bool>, test: &TestSection) -> bool {
    if let Some(value) = primary {
        return value;
    }
    if let Some(value) = test.console {
        warn!("[test].console is deprecated; use [console].enabled instead");
        return value;
    }
    true
}

fn resolve_console_colors(primary: Option<bool>, test: &TestSection) -> bool {
    if let Some(value) = primary {
        return value;
    }
    if let Some(disabled) = test.disable_color {
        warn!("[test].disable_color is deprecated; use [console].colors instead");
        return !disabled;
    }
    true
}

fn resolve_console_input(primary: Option<bool>, test: &TestSection) -> bool {
    if let Some(value) = primary {
        return value;
    }
    if let Some(disabled) = test.disable_console_input {
        warn!("[test].disable_console_input is deprecated; use [console].input instead");
        return !disabled;
    }
    true
}

fn resolve_console_basic(primary: Option<bool>, test: &TestSection) -> bool {
    if let Some(value) = primary {
        return value;
    }
    if let Some(value) = test.basic_console {
        warn!("[test].basic_console is deprecated; use [console].basic instead");
        return value;
    }
    false
}

fn parse_config_duration(key: &str, value: &str) -> Result<Duration> {
    parse_duration(value)
        .map_err(|err| TestwatchError::ConfigError(format!("[test].{key}: {err}")))
}

/// Parse durations like `"500ms"`, `"3s"`, `"2m"` or `"1h"`.
pub fn parse_duration(s: &str) -> std::result::Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration".to_string());
    }

    let split = s
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(|| format!("duration '{s}' is missing a unit (ms, s, m, h)"))?;
    let (digits, unit) = s.split_at(split);
    let value: u64 = digits
        .parse()
        .map_err(|_| format!("invalid duration value '{digits}'"))?;

    match unit.trim() {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        "m" => Ok(Duration::from_secs(value * 60)),
        "h" => Ok(Duration::from_secs(value * 3600)),
        other => Err(format!("unknown duration unit '{other}' (expected ms, s, m or h)")),
    }
}
