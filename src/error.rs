use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors that abort a whole `find` run.
///
/// Per-image decode failures are not represented here; they are recorded on
/// the affected [`ImageRecord`](crate::record::ImageRecord) and returned in
/// the `failed` list instead.
#[derive(Debug, Error)]
pub enum FinderError {
    /// The root or one of its subdirectories could not be traversed.
    #[error("cannot read directory {path:?}: {source}")]
    FileSystem {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{0:?} is not a directory")]
    NotADirectory(PathBuf),

    #[error("invalid filter pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error(transparent)]
    Histogram(#[from] HistogramError),

    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Why a single image could not be turned into a histogram.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("cannot open image: {0}")]
    Io(String),

    #[error("cannot decode image: {0}")]
    Image(String),
}

impl From<io::Error> for DecodeError {
    fn from(e: io::Error) -> Self {
        DecodeError::Io(e.to_string())
    }
}

impl From<image::ImageError> for DecodeError {
    fn from(e: image::ImageError) -> Self {
        match e {
            image::ImageError::IoError(io) => DecodeError::Io(io.to_string()),
            other => DecodeError::Image(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HistogramError {
    #[error("bin count must be between 1 and 256, got {0}")]
    InvalidBinCount(usize),

    #[error("channel {channel} has {actual} bins, expected {expected}")]
    ChannelLength {
        channel: &'static str,
        expected: usize,
        actual: usize,
    },
}
