use std::path::PathBuf;

use thiserror::Error;

/// Library error type for picframe operations.
///
/// Per-file decode failures are not represented here; they are carried on the
/// decode request itself (see [`crate::decode::DecodeError`]) so a bad image
/// never unwinds past its worker.
#[derive(Debug, Error)]
pub enum Error {
    /// A rule pattern failed to compile.
    #[error("invalid rule pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// The library root is missing or unreadable; the scan produced nothing.
    #[error("cannot read library root {}: {source}", path.display())]
    ScanRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A scan is already running; only one may be in flight per library.
    #[error("a library scan is already in progress")]
    ScanInProgress,

    /// The scan completed but selected no images.
    #[error("no images selected")]
    EmptyCatalog,

    /// A carousel ring needs at least two slots to crossfade.
    #[error("carousel ring size {0} is too small (minimum 2)")]
    RingTooSmall(usize),

    /// Every load attempt for the first slide failed.
    #[error("no displayable image after {0} decode attempts")]
    Undisplayable(u32),

    /// Underlying IO error.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// YAML/serde configuration error.
    #[error(transparent)]
    Config(#[from] serde_yaml::Error),
}
