// tests/config_loading.rs

use std::io::Write;
use std::time::Duration;

use testwatch::config::{load_and_validate, parse_duration, Config, RawConfigFile};
use testwatch::errors::TestwatchError;
use testwatch::types::{ArtifactKind, RunMode, TestType};
use testwatch_test_utils::builders::TestIdentityBuilder;
use testwatch_test_utils::init_tracing;

/// Smallest config that resolves: everything defaulted except the runner.
const MINIMAL: &str = r#"
[runner]
unit_command = "mvn test -Dtest={class}"
"#;

fn resolve(source: &str) -> Result<Config, TestwatchError> {
    let raw: RawConfigFile = toml::from_str(source).expect("test TOML must parse");
    Config::try_from(raw)
}

#[test]
fn minimal_config_resolves_with_documented_defaults() {
    init_tracing();
    let config = resolve(MINIMAL).expect("minimal config must resolve");

    assert_eq!(config.mode, RunMode::Paused);
    assert!(!config.display_test_output);
    assert_eq!(config.test_type, TestType::All);
    assert!(!config.only_application_module);
    assert_eq!(config.hang_timeout, Duration::from_secs(600));
    assert_eq!(config.wait_time, Duration::from_secs(60));
    assert!(config.launch.is_none());

    assert!(config.console.enabled);
    assert!(config.console.colors);
    assert!(config.console.input);
    assert!(!config.console.basic);

    assert_eq!(config.watch.paths, vec!["**/*"]);
    assert_eq!(config.watch.exclude, vec![".git/**", "target/**", "build/**"]);
    assert!(!config.watch.use_hash);
    assert_eq!(
        config.inventory_path.to_string_lossy(),
        "testwatch-inventory.toml"
    );

    // One configured command drives both test kinds.
    assert_eq!(config.runner.unit_command, "mvn test -Dtest={class}");
    assert_eq!(config.runner.framework_command, "mvn test -Dtest={class}");
}

#[test]
fn default_filter_excludes_slow_and_integration_classes() {
    let config = resolve(MINIMAL).expect("minimal config must resolve");

    let slow = TestIdentityBuilder::new("com.acme.app.MigrationTest")
        .tag("slow")
        .build();
    let it_class = TestIdentityBuilder::new("com.acme.app.OrderIT").build();
    let plain = TestIdentityBuilder::new("com.acme.app.OrderTest").build();

    assert!(!config.filter.should_run(&slow));
    assert!(!config.filter.should_run(&it_class));
    assert!(config.filter.should_run(&plain));
}

#[test]
fn empty_exclude_overrides_turn_the_defaults_off() {
    let config = resolve(
        r#"
[test]
exclude_tags = []
exclude_pattern = ""

[runner]
unit_command = "run {class}"
"#,
    )
    .expect("config must resolve");

    let slow = TestIdentityBuilder::new("com.acme.app.OrderIT")
        .tag("slow")
        .build();
    assert!(config.filter.should_run(&slow));
}

#[test]
fn missing_runner_commands_are_rejected() {
    let err = resolve("").expect_err("no runner command configured");
    assert!(matches!(
        err,
        TestwatchError::ConfigError(message) if message.contains("[runner]")
    ));
}

#[test]
fn blank_runner_command_is_rejected() {
    let err = resolve(
        r#"
[runner]
unit_command = "   "
"#,
    )
    .expect_err("blank command is not a command");
    assert!(matches!(err, TestwatchError::ConfigError(_)));
}

#[test]
fn framework_command_backfills_unit_command() {
    let config = resolve(
        r#"
[runner]
framework_command = "mvn verify -Dit.test={class}"
"#,
    )
    .expect("config must resolve");
    assert_eq!(config.runner.unit_command, "mvn verify -Dit.test={class}");
    assert_eq!(config.runner.framework_command, "mvn verify -Dit.test={class}");
}

#[test]
fn distinct_runner_commands_stay_distinct() {
    let config = resolve(
        r#"
[runner]
unit_command = "gradle test --tests {class}"
framework_command = "gradle integrationTest --tests {class}"
"#,
    )
    .expect("config must resolve");
    assert_eq!(config.runner.unit_command, "gradle test --tests {class}");
    assert_eq!(
        config.runner.framework_command,
        "gradle integrationTest --tests {class}"
    );
}

#[test]
fn mode_and_type_parse_from_lowercase_strings() {
    let config = resolve(
        r#"
[test]
continuous_testing = "enabled"
type = "framework"

[runner]
unit_command = "run {class}"
"#,
    )
    .expect("config must resolve");
    assert_eq!(config.mode, RunMode::Enabled);
    assert_eq!(config.test_type, TestType::Framework);
}

#[test]
fn unknown_mode_string_fails_at_parse_time() {
    let result: Result<RawConfigFile, _> = toml::from_str(
        r#"
[test]
continuous_testing = "sometimes"
"#,
    );
    assert!(result.is_err());
}

#[test]
fn deprecated_console_aliases_apply_with_inversion() {
    init_tracing();
    let config = resolve(
        r#"
[test]
console = false
basic_console = true
disable_color = true
disable_console_input = true

[runner]
unit_command = "run {class}"
"#,
    )
    .expect("config must resolve");

    assert!(!config.console.enabled);
    assert!(config.console.basic);
    // disable_* flags invert into the new names.
    assert!(!config.console.colors);
    assert!(!config.console.input);
}

#[test]
fn console_section_wins_over_deprecated_aliases() {
    let config = resolve(
        r#"
[test]
disable_color = true
console = false

[console]
colors = true
enabled = true

[runner]
unit_command = "run {class}"
"#,
    )
    .expect("config must resolve");

    assert!(config.console.enabled);
    assert!(config.console.colors);
}

#[test]
fn durations_parse_with_units() {
    assert_eq!(parse_duration("500ms"), Ok(Duration::from_millis(500)));
    assert_eq!(parse_duration("3s"), Ok(Duration::from_secs(3)));
    assert_eq!(parse_duration("2m"), Ok(Duration::from_secs(120)));
    assert_eq!(parse_duration("1h"), Ok(Duration::from_secs(3600)));
    assert_eq!(parse_duration(" 10s "), Ok(Duration::from_secs(10)));

    assert!(parse_duration("").is_err());
    assert!(parse_duration("10").is_err());
    assert!(parse_duration("5x").is_err());
    assert!(parse_duration("fast").is_err());
}

#[test]
fn invalid_hang_timeout_is_rejected() {
    let err = resolve(
        r#"
[test]
hang_detection_timeout = "soonish"

[runner]
unit_command = "run {class}"
"#,
    )
    .expect_err("bad duration must be rejected");
    assert!(matches!(
        err,
        TestwatchError::ConfigError(message) if message.contains("hang_detection_timeout")
    ));
}

#[test]
fn invalid_filter_pattern_is_rejected() {
    let err = resolve(
        r#"
[test]
exclude_pattern = "(unclosed"

[runner]
unit_command = "run {class}"
"#,
    )
    .expect_err("bad regex must be rejected");
    assert!(matches!(err, TestwatchError::PatternError { .. }));
}

#[test]
fn launch_section_resolves_arg_line_and_wait_from_the_test_section() {
    let config = resolve(
        r#"
[test]
wait_time = "5s"
arg_line = ["-Xmx1g", "-Dapp.profile=test"]

[runner]
unit_command = "run {class}"

[launch]
artifact = "jar"
target = "target/app-runner.jar"
ready_pattern = "started in"
"#,
    )
    .expect("config must resolve");

    let launch = config.launch.expect("launch spec resolved");
    assert_eq!(launch.artifact, ArtifactKind::Jar);
    assert_eq!(launch.target, "target/app-runner.jar");
    assert_eq!(launch.arg_line, vec!["-Xmx1g", "-Dapp.profile=test"]);
    assert_eq!(launch.wait_time, Duration::from_secs(5));
    assert_eq!(launch.ready_pattern.as_str(), "started in");
    // The same wait budget is exposed on the top-level config.
    assert_eq!(config.wait_time, Duration::from_secs(5));
}

#[test]
fn launch_requires_a_nonempty_target() {
    let err = resolve(
        r#"
[runner]
unit_command = "run {class}"

[launch]
artifact = "container"
target = "  "
ready_pattern = "ready"
"#,
    )
    .expect_err("empty target must be rejected");
    assert!(matches!(
        err,
        TestwatchError::ConfigError(message) if message.contains("target")
    ));
}

#[test]
fn invalid_ready_pattern_is_rejected() {
    let err = resolve(
        r#"
[runner]
unit_command = "run {class}"

[launch]
artifact = "native"
target = "target/app-runner"
ready_pattern = "(unclosed"
"#,
    )
    .expect_err("bad readiness regex must be rejected");
    assert!(matches!(
        err,
        TestwatchError::ConfigError(message) if message.contains("ready_pattern")
    ));
}

#[test]
fn load_and_validate_reads_a_file() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("Testwatch.toml");
    let mut file = std::fs::File::create(&path)?;
    write!(
        file,
        r#"
[test]
continuous_testing = "enabled"

[runner]
unit_command = "run {{class}}"
"#
    )?;

    let config = load_and_validate(&path)?;
    assert_eq!(config.mode, RunMode::Enabled);
    Ok(())
}

#[test]
fn missing_config_file_is_an_io_error() {
    let err = load_and_validate("/does/not/exist/Testwatch.toml")
        .expect_err("missing file must error");
    assert!(matches!(err, TestwatchError::IoError(_)));
}
