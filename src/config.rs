use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use serde::Deserialize;

use crate::error::Error;
use crate::rules::{PathRules, RuleSet};

/// Default rule patterns, matching the documented behavior: every directory
/// is eligible, only common image extensions qualify, and well-known
/// duplicate-file markers are rejected.
pub const DEFAULT_INCLUDE_DIRS: &[&str] = &[r".*"];
pub const DEFAULT_EXCLUDE_DIRS: &[&str] = &[];
pub const DEFAULT_INCLUDE_FILES: &[&str] = &[r".*\.(jpg|png|jpeg)$"];
pub const DEFAULT_EXCLUDE_FILES: &[&str] = &[r".*- ?Copy\.", r".*\(\d+\)\.", r".*-\d+\."];

/// How a slide is mapped onto the display surface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FitMode {
    /// Letterbox: the whole image is visible.
    #[default]
    Fit,
    /// Cover: the image fills the surface and may be cropped.
    Fill,
}

/// Per-axis rule pattern overrides.
///
/// An axis that is present replaces the corresponding default list wholesale;
/// an absent axis keeps its default. This mirrors merging a partial mapping
/// over the default configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct RulePatterns {
    pub include_dirs: Option<Vec<String>>,
    pub exclude_dirs: Option<Vec<String>>,
    pub include_files: Option<Vec<String>>,
    pub exclude_files: Option<Vec<String>>,
}

impl RulePatterns {
    fn axis(override_list: Option<&Vec<String>>, defaults: &[&str]) -> Vec<String> {
        match override_list {
            Some(list) => list.clone(),
            None => defaults.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Merge these overrides with the defaults and compile the result.
    pub fn compile(&self) -> Result<PathRules, Error> {
        let dirs = RuleSet::compile(
            &Self::axis(self.include_dirs.as_ref(), DEFAULT_INCLUDE_DIRS),
            &Self::axis(self.exclude_dirs.as_ref(), DEFAULT_EXCLUDE_DIRS),
        )?;
        let files = RuleSet::compile(
            &Self::axis(self.include_files.as_ref(), DEFAULT_INCLUDE_FILES),
            &Self::axis(self.exclude_files.as_ref(), DEFAULT_EXCLUDE_FILES),
        )?;
        Ok(PathRules { dirs, files })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Configuration {
    /// Root of the picture library tree.
    pub library_root: PathBuf,

    /// Shuffle the flat entry sequence after each scan.
    #[serde(default = "Configuration::default_shuffle")]
    pub shuffle: bool,

    /// Number of slide slots in the carousel ring.
    #[serde(default = "Configuration::default_ring_size")]
    pub ring_size: usize,

    /// Number of background decode worker threads.
    #[serde(default = "Configuration::default_decode_workers")]
    pub decode_workers: usize,

    /// Time each slide stays on screen before the next transition starts.
    #[serde(default = "Configuration::default_slide_delay", with = "humantime_serde")]
    pub slide_delay: Duration,

    /// Duration of the crossfade between slides.
    #[serde(default = "Configuration::default_fade_duration", with = "humantime_serde")]
    pub fade_duration: Duration,

    /// Display tick rate; also sets the fade granularity.
    #[serde(default = "Configuration::default_frames_per_second")]
    pub frames_per_second: u32,

    #[serde(default)]
    pub fit: FitMode,

    /// Full passes through the catalog before rescanning and reshuffling.
    #[serde(default = "Configuration::default_reshuffle_after_passes")]
    pub reshuffle_after_passes: u32,

    #[serde(default)]
    pub rules: RulePatterns,
}

impl Configuration {
    fn default_shuffle() -> bool {
        true
    }

    fn default_ring_size() -> usize {
        8
    }

    fn default_decode_workers() -> usize {
        1
    }

    fn default_slide_delay() -> Duration {
        Duration::from_secs(10)
    }

    fn default_fade_duration() -> Duration {
        Duration::from_secs(3)
    }

    fn default_frames_per_second() -> u32 {
        20
    }

    fn default_reshuffle_after_passes() -> u32 {
        5
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.ring_size >= 2,
            "ring-size must be at least 2, got {}",
            self.ring_size
        );
        ensure!(self.decode_workers >= 1, "decode-workers must be at least 1");
        ensure!(
            self.frames_per_second >= 1,
            "frames-per-second must be at least 1"
        );
        ensure!(
            self.reshuffle_after_passes >= 1,
            "reshuffle-after-passes must be at least 1"
        );
        self.rules.compile().context("compiling rule patterns")?;
        Ok(())
    }

    /// Interval between display ticks derived from the frame rate.
    pub fn tick(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.frames_per_second))
    }
}

pub fn from_yaml_file(path: &Path) -> Result<Configuration, Error> {
    let text = std::fs::read_to_string(path)?;
    let cfg = serde_yaml::from_str(&text)?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::PathStatus;

    #[test]
    fn overrides_replace_only_their_axis() {
        let yaml = r#"
include-dirs: ["2020"]
"#;
        let patterns: RulePatterns = serde_yaml::from_str(yaml).unwrap();
        let rules = patterns.compile().unwrap();
        assert_eq!(rules.dirs.classify("2019 trip"), PathStatus::Skip);
        assert_eq!(rules.dirs.classify("2020 trip"), PathStatus::Include);
        // File axis keeps its defaults, including the duplicate markers.
        assert_eq!(rules.files.classify("a.jpg"), PathStatus::Include);
        assert_eq!(rules.files.classify("a - Copy.jpg"), PathStatus::Exclude);
    }

    #[test]
    fn empty_override_clears_an_axis() {
        let patterns = RulePatterns {
            exclude_files: Some(Vec::new()),
            ..RulePatterns::default()
        };
        let rules = patterns.compile().unwrap();
        assert_eq!(rules.files.classify("a - Copy.jpg"), PathStatus::Include);
    }
}
