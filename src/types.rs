// src/types.rs

//! Small shared vocabulary types used across config, engine and executors.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Gate deciding which test runs the engine is willing to start.
///
/// - `Paused`: tracked state stays live but no run starts automatically;
///   explicit run-now requests still go through (default behaviour).
/// - `Enabled`: source changes trigger runs automatically.
/// - `Disabled`: nothing runs for the rest of the session. Entering this
///   mode is one-way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    Paused,
    Enabled,
    Disabled,
}

impl Default for RunMode {
    fn default() -> Self {
        RunMode::Paused
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunMode::Paused => write!(f, "paused"),
            RunMode::Enabled => write!(f, "enabled"),
            RunMode::Disabled => write!(f, "disabled"),
        }
    }
}

impl FromStr for RunMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "paused" => Ok(RunMode::Paused),
            "enabled" => Ok(RunMode::Enabled),
            "disabled" => Ok(RunMode::Disabled),
            other => Err(format!(
                "invalid continuous_testing mode: {other} (expected \"paused\", \"enabled\" or \"disabled\")"
            )),
        }
    }
}

/// Which kinds of tests a run selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestType {
    /// Plain unit tests only.
    Unit,
    /// Tests that need the application framework running.
    Framework,
    /// Both, unit tests first.
    All,
}

impl Default for TestType {
    fn default() -> Self {
        TestType::All
    }
}

impl fmt::Display for TestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestType::Unit => write!(f, "unit"),
            TestType::Framework => write!(f, "framework"),
            TestType::All => write!(f, "all"),
        }
    }
}

impl FromStr for TestType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "unit" => Ok(TestType::Unit),
            "framework" => Ok(TestType::Framework),
            "all" => Ok(TestType::All),
            other => Err(format!(
                "invalid test type: {other} (expected \"unit\", \"framework\" or \"all\")"
            )),
        }
    }
}

/// Packaged artifact form launched for integration-style test runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    /// Runnable jar, launched through `java -jar`.
    Jar,
    /// Container image, launched through `docker run`.
    Container,
    /// Native executable, launched directly.
    Native,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactKind::Jar => write!(f, "jar"),
            ArtifactKind::Container => write!(f, "container"),
            ArtifactKind::Native => write!(f, "native"),
        }
    }
}

impl FromStr for ArtifactKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "jar" => Ok(ArtifactKind::Jar),
            "container" => Ok(ArtifactKind::Container),
            "native" => Ok(ArtifactKind::Native),
            other => Err(format!(
                "invalid artifact kind: {other} (expected \"jar\", \"container\" or \"native\")"
            )),
        }
    }
}
