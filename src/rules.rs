//! Ordered include/exclude rule matching for directory and file names.

use regex::{Regex, RegexBuilder};
use tracing::debug;

use crate::error::Error;

/// Outcome of matching a path against a rule set.
///
/// A path that matches no include pattern is `Skip`, not `Exclude`; exclude
/// patterns are only consulted once an include pattern has matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathStatus {
    Include,
    Exclude,
    Skip,
}

/// One axis of ordered patterns (either directories or files).
///
/// Patterns are case-insensitive and anchored at the start of the candidate
/// string, so `2020` matches `2020-01 trip/...` but not `trip 2020`.
#[derive(Debug, Clone)]
pub struct RuleSet {
    include: Vec<Regex>,
    exclude: Vec<Regex>,
}

impl RuleSet {
    pub fn compile(include: &[String], exclude: &[String]) -> Result<Self, Error> {
        Ok(Self {
            include: compile_all(include)?,
            exclude: compile_all(exclude)?,
        })
    }

    /// Classify `path` against the ordered patterns.
    ///
    /// The first matching include pattern decides; excludes are then checked
    /// in order and the first hit turns the result into `Exclude`.
    pub fn classify(&self, path: &str) -> PathStatus {
        for inc in &self.include {
            if inc.is_match(path) {
                for exc in &self.exclude {
                    if exc.is_match(path) {
                        debug!(status = "exclude", path, pattern = exc.as_str());
                        return PathStatus::Exclude;
                    }
                }
                debug!(status = "include", path, pattern = inc.as_str());
                return PathStatus::Include;
            }
        }
        debug!(status = "skip", path);
        PathStatus::Skip
    }
}

/// The two rule axes applied during a scan: relative directory paths and
/// bare file names.
#[derive(Debug, Clone)]
pub struct PathRules {
    pub dirs: RuleSet,
    pub files: RuleSet,
}

fn compile_all(patterns: &[String]) -> Result<Vec<Regex>, Error> {
    patterns
        .iter()
        .map(|pattern| {
            RegexBuilder::new(&format!("^(?:{pattern})"))
                .case_insensitive(true)
                .build()
                .map_err(|source| Error::Pattern {
                    pattern: pattern.clone(),
                    source,
                })
        })
        .collect()
}
