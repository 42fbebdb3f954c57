use std::path::PathBuf;
use std::time::Duration;

use picframe::config::{Configuration, FitMode};
use picframe::rules::PathStatus;

#[test]
fn parse_minimal_kebab_case_config() {
    let yaml = r#"
library-root: "/photos"
"#;
    let cfg: Configuration = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(cfg.library_root, PathBuf::from("/photos"));
    assert!(cfg.shuffle);
    assert_eq!(cfg.ring_size, 8);
    assert_eq!(cfg.decode_workers, 1);
    assert_eq!(cfg.slide_delay, Duration::from_secs(10));
    assert_eq!(cfg.fade_duration, Duration::from_secs(3));
    assert_eq!(cfg.frames_per_second, 20);
    assert_eq!(cfg.fit, FitMode::Fit);
    assert_eq!(cfg.reshuffle_after_passes, 5);
    cfg.validate().unwrap();
}

#[test]
fn parse_humantime_durations() {
    let yaml = r#"
library-root: "/photos"
slide-delay: 1500ms
fade-duration: 2s
"#;
    let cfg: Configuration = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(cfg.slide_delay, Duration::from_millis(1500));
    assert_eq!(cfg.fade_duration, Duration::from_secs(2));
}

#[test]
fn parse_fit_mode_and_workers() {
    let yaml = r#"
library-root: "/photos"
fit: fill
decode-workers: 4
frames-per-second: 30
"#;
    let cfg: Configuration = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(cfg.fit, FitMode::Fill);
    assert_eq!(cfg.decode_workers, 4);
    assert!((cfg.tick().as_secs_f64() - 1.0 / 30.0).abs() < 1e-9);
}

#[test]
fn parse_rule_overrides() {
    let yaml = r#"
library-root: "/photos"
rules:
  include-files: ['.*\.png$']
  exclude-dirs: ['private']
"#;
    let cfg: Configuration = serde_yaml::from_str(yaml).unwrap();
    let rules = cfg.rules.compile().unwrap();
    assert_eq!(rules.files.classify("a.png"), PathStatus::Include);
    assert_eq!(rules.files.classify("a.jpg"), PathStatus::Skip);
    assert_eq!(rules.dirs.classify("private stuff"), PathStatus::Exclude);
    // Untouched axes keep their defaults.
    assert_eq!(rules.dirs.classify("2020"), PathStatus::Include);
}

#[test]
fn reject_unknown_fields() {
    let yaml = r#"
library-root: "/photos"
frame-rate: 20
"#;
    assert!(serde_yaml::from_str::<Configuration>(yaml).is_err());
}

#[test]
fn missing_library_root_is_an_error() {
    assert!(serde_yaml::from_str::<Configuration>("shuffle: false").is_err());
}

#[test]
fn validate_rejects_degenerate_settings() {
    let mut cfg: Configuration = serde_yaml::from_str("library-root: /p").unwrap();
    cfg.ring_size = 1;
    assert!(cfg.validate().is_err());

    let mut cfg: Configuration = serde_yaml::from_str("library-root: /p").unwrap();
    cfg.decode_workers = 0;
    assert!(cfg.validate().is_err());

    let mut cfg: Configuration = serde_yaml::from_str("library-root: /p").unwrap();
    cfg.frames_per_second = 0;
    assert!(cfg.validate().is_err());

    let mut cfg: Configuration = serde_yaml::from_str("library-root: /p").unwrap();
    cfg.reshuffle_after_passes = 0;
    assert!(cfg.validate().is_err());
}

#[test]
fn validate_rejects_bad_rule_pattern() {
    let yaml = r#"
library-root: "/photos"
rules:
  include-files: ['(unclosed']
"#;
    let cfg: Configuration = serde_yaml::from_str(yaml).unwrap();
    assert!(cfg.validate().is_err());
}

#[test]
fn from_yaml_file_round_trip() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("config.yaml");
    std::fs::write(&path, "library-root: /photos\nslide-delay: 5s\n").unwrap();
    let cfg = picframe::config::from_yaml_file(&path).unwrap();
    assert_eq!(cfg.slide_delay, Duration::from_secs(5));

    let missing = tmp.path().join("nope.yaml");
    assert!(picframe::config::from_yaml_file(&missing).is_err());
}
