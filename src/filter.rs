// src/filter.rs

//! Test selection policy.
//!
//! A [`TestFilter`] holds up to three independent axes of rules:
//!
//! - tags (include / exclude lists),
//! - class-name patterns (include / exclude regexes),
//! - module-coordinate patterns (include / exclude regexes).
//!
//! Within an axis, a configured include rule *replaces* the exclude rule
//! rather than intersecting with it. Across axes, a test must pass every
//! axis. An unset axis matches everything; empty lists and empty pattern
//! strings count as unset.
//!
//! Patterns are compiled anchored, so `exclude_pattern = ".*IT"` deselects
//! `OrderIT` but not `OrderITCaseHelper`.

use std::collections::BTreeSet;

use regex::Regex;

use crate::errors::{Result, TestwatchError};
use crate::inventory::TestIdentity;

/// Tags excluded when the user configures nothing.
pub const DEFAULT_EXCLUDE_TAGS: &[&str] = &["slow"];

/// Class-name exclude applied when the user configures nothing. Matches the
/// conventional integration-test naming scheme.
pub const DEFAULT_EXCLUDE_PATTERN: &str = r".*\.IT[^.]+|.*IT|.*ITCase";

#[derive(Debug, Clone, Default)]
pub struct TestFilter {
    include_tags: Option<BTreeSet<String>>,
    exclude_tags: Option<BTreeSet<String>>,
    include_pattern: Option<Regex>,
    exclude_pattern: Option<Regex>,
    include_module_pattern: Option<Regex>,
    exclude_module_pattern: Option<Regex>,
}

impl TestFilter {
    /// Filter with no rules at all; selects every test.
    pub fn unfiltered() -> Self {
        TestFilter::default()
    }

    /// Build a filter from raw config values.
    ///
    /// Empty lists and blank pattern strings normalize to "unset" so that a
    /// user writing `exclude_tags = []` switches that rule off entirely.
    pub fn from_parts(
        include_tags: Option<Vec<String>>,
        exclude_tags: Option<Vec<String>>,
        include_pattern: Option<&str>,
        exclude_pattern: Option<&str>,
        include_module_pattern: Option<&str>,
        exclude_module_pattern: Option<&str>,
    ) -> Result<Self> {
        Ok(TestFilter {
            include_tags: normalize_tags(include_tags),
            exclude_tags: normalize_tags(exclude_tags),
            include_pattern: compile_opt(include_pattern)?,
            exclude_pattern: compile_opt(exclude_pattern)?,
            include_module_pattern: compile_opt(include_module_pattern)?,
            exclude_module_pattern: compile_opt(exclude_module_pattern)?,
        })
    }

    /// Decide whether `test` belongs in a run.
    pub fn should_run(&self, test: &TestIdentity) -> bool {
        self.tags_allow(&test.tags)
            && self.class_allows(&test.class_name)
            && self.module_allows(&test.module.to_string())
    }

    fn tags_allow(&self, tags: &BTreeSet<String>) -> bool {
        if let Some(include) = &self.include_tags {
            return tags.iter().any(|tag| include.contains(tag));
        }
        if let Some(exclude) = &self.exclude_tags {
            return !tags.iter().any(|tag| exclude.contains(tag));
        }
        true
    }

    fn class_allows(&self, class_name: &str) -> bool {
        pattern_axis(
            self.include_pattern.as_ref(),
            self.exclude_pattern.as_ref(),
            class_name,
        )
    }

    fn module_allows(&self, coordinate: &str) -> bool {
        pattern_axis(
            self.include_module_pattern.as_ref(),
            self.exclude_module_pattern.as_ref(),
            coordinate,
        )
    }
}

fn pattern_axis(include: Option<&Regex>, exclude: Option<&Regex>, value: &str) -> bool {
    if let Some(include) = include {
        return include.is_match(value);
    }
    if let Some(exclude) = exclude {
        return !exclude.is_match(value);
    }
    true
}

fn normalize_tags(tags: Option<Vec<String>>) -> Option<BTreeSet<String>> {
    let tags = tags?;
    let set: BTreeSet<String> = tags
        .into_iter()
        .map(|tag| tag.trim().to_string())
        .filter(|tag| !tag.is_empty())
        .collect();
    if set.is_empty() { None } else { Some(set) }
}

fn compile_opt(pattern: Option<&str>) -> Result<Option<Regex>> {
    match pattern {
        Some(p) if !p.trim().is_empty() => compile_anchored(p).map(Some),
        _ => Ok(None),
    }
}

/// Compile `pattern` so it must match the whole candidate string.
fn compile_anchored(pattern: &str) -> Result<Regex> {
    Regex::new(&format!("^(?:{pattern})$")).map_err(|source| TestwatchError::PatternError {
        pattern: pattern.to_string(),
        source,
    })
}
