// src/config/model.rs

//! Raw configuration model mirroring the TOML file layout.
//!
//! Everything here is exactly what `serde` deserializes; defaults are applied
//! through `#[serde(default)]` so a minimal config file stays minimal. The
//! resolved, runtime-facing [`Config`](crate::config::Config) is produced by
//! `TryFrom<RawConfigFile>` in `validate.rs`.

use serde::Deserialize;

use crate::types::{ArtifactKind, RunMode, TestType};

/// Top-level raw configuration file.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    #[serde(default)]
    pub test: TestSection,

    #[serde(default)]
    pub console: ConsoleSection,

    #[serde(default)]
    pub runner: RunnerSection,

    /// Optional; when absent, framework tests run against the live dev
    /// application instead of a packaged artifact.
    #[serde(default)]
    pub launch: Option<LaunchSection>,

    #[serde(default)]
    pub watch: WatchSection,

    #[serde(default)]
    pub discovery: DiscoverySection,
}

/// `[test]` section: run gating, filtering and timeouts.
#[derive(Debug, Clone, Deserialize)]
pub struct TestSection {
    /// Initial run mode for the session.
    #[serde(default)]
    pub continuous_testing: RunMode,

    /// Stream test process output as it happens instead of only keeping it
    /// for failing tests.
    #[serde(default)]
    pub display_test_output: bool,

    /// Tags a test must carry to be selected. When set, wins over
    /// `exclude_tags`.
    #[serde(default)]
    pub include_tags: Option<Vec<String>>,

    /// Tags that deselect a test when no include list is set.
    #[serde(default = "default_exclude_tags")]
    pub exclude_tags: Option<Vec<String>>,

    /// Class-name pattern a test must match to be selected. When set, wins
    /// over `exclude_pattern`.
    #[serde(default)]
    pub include_pattern: Option<String>,

    /// Class-name pattern that deselects tests when no include pattern is
    /// set. Defaults to the conventional integration-test naming scheme.
    #[serde(default = "default_exclude_pattern")]
    pub exclude_pattern: Option<String>,

    /// Module-coordinate pattern a test's module must match.
    #[serde(default)]
    pub include_module_pattern: Option<String>,

    /// Module-coordinate pattern that deselects modules when no include
    /// module pattern is set.
    #[serde(default)]
    pub exclude_module_pattern: Option<String>,

    /// Which test kinds to run.
    #[serde(default, rename = "type")]
    pub test_type: TestType,

    /// Restrict runs to tests of the application module itself, ignoring
    /// its dependency modules.
    #[serde(default)]
    pub only_application_module: bool,

    /// Quiet period after which the hang watchdog dumps diagnostics.
    #[serde(default = "default_hang_detection_timeout")]
    pub hang_detection_timeout: String,

    /// How long a launched artifact may take to report readiness.
    #[serde(default = "default_wait_time")]
    pub wait_time: String,

    /// Extra arguments inserted right after the artifact launch command.
    #[serde(default)]
    pub arg_line: Vec<String>,

    /// Deprecated alias for `[console] enabled`.
    #[serde(default)]
    pub console: Option<bool>,

    /// Deprecated alias for `[console] basic`.
    #[serde(default)]
    pub basic_console: Option<bool>,

    /// Deprecated, inverted alias for `[console] colors`.
    #[serde(default)]
    pub disable_color: Option<bool>,

    /// Deprecated, inverted alias for `[console] input`.
    #[serde(default)]
    pub disable_console_input: Option<bool>,
}

impl Default for TestSection {
    fn default() -> Self {
        TestSection {
            continuous_testing: RunMode::default(),
            display_test_output: false,
            include_tags: None,
            exclude_tags: default_exclude_tags(),
            include_pattern: None,
            exclude_pattern: default_exclude_pattern(),
            include_module_pattern: None,
            exclude_module_pattern: None,
            test_type: TestType::default(),
            only_application_module: false,
            hang_detection_timeout: default_hang_detection_timeout(),
            wait_time: default_wait_time(),
            arg_line: Vec::new(),
            console: None,
            basic_console: None,
            disable_color: None,
            disable_console_input: None,
        }
    }
}

fn default_exclude_tags() -> Option<Vec<String>> {
    Some(vec!["slow".to_string()])
}

fn default_exclude_pattern() -> Option<String> {
    Some(r".*\.IT[^.]+|.*IT|.*ITCase".to_string())
}

fn default_hang_detection_timeout() -> String {
    "10m".to_string()
}

fn default_wait_time() -> String {
    "1m".to_string()
}

/// `[console]` section: interactive summary output.
///
/// Every field is optional so the deprecated `[test]` aliases can fill the
/// gaps during resolution.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ConsoleSection {
    pub enabled: Option<bool>,
    pub colors: Option<bool>,
    pub input: Option<bool>,
    pub basic: Option<bool>,
}

/// `[runner]` section: commands used to execute a single test class.
///
/// The string `{class}` is replaced with the fully qualified class name.
/// When only one command is configured it is used for both kinds.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RunnerSection {
    pub unit_command: Option<String>,
    pub framework_command: Option<String>,
}

/// `[launch]` section: packaged artifact to boot before framework tests.
#[derive(Debug, Clone, Deserialize)]
pub struct LaunchSection {
    /// Artifact form.
    pub artifact: ArtifactKind,

    /// Jar path, image name or executable path depending on `artifact`.
    pub target: String,

    /// Regex matched against artifact stdout lines to detect readiness.
    pub ready_pattern: String,
}

/// `[watch]` section: which files feed change triggers.
#[derive(Debug, Clone, Deserialize)]
pub struct WatchSection {
    #[serde(default = "default_watch_paths")]
    pub paths: Vec<String>,

    #[serde(default = "default_watch_exclude")]
    pub exclude: Vec<String>,

    /// Hash file contents and suppress triggers for no-op writes.
    #[serde(default)]
    pub use_hash: bool,
}

impl Default for WatchSection {
    fn default() -> Self {
        WatchSection {
            paths: default_watch_paths(),
            exclude: default_watch_exclude(),
            use_hash: false,
        }
    }
}

fn default_watch_paths() -> Vec<String> {
    vec!["**/*".to_string()]
}

fn default_watch_exclude() -> Vec<String> {
    vec![
        ".git/**".to_string(),
        "target/**".to_string(),
        "build/**".to_string(),
    ]
}

/// `[discovery]` section: where the discovery side publishes the inventory.
#[derive(Debug, Clone, Deserialize)]
pub struct DiscoverySection {
    #[serde(default = "default_inventory")]
    pub inventory: String,
}

impl Default for DiscoverySection {
    fn default() -> Self {
        DiscoverySection {
            inventory: default_inventory(),
        }
    }
}

fn default_inventory() -> String {
    "testwatch-inventory.toml".to_string()
}
