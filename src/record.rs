use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::DecodeError;
use crate::histogram::Histogram;
use crate::scorer;

/// One scanned image.
///
/// Identity is the path alone: two records are the same image iff their
/// paths are equal, regardless of histogram or flag.
#[derive(Debug, Clone)]
pub struct ImageRecord {
    path: PathBuf,
    outcome: Result<Arc<Histogram>, DecodeError>,
    /// Whether this image is a removal candidate. Only meaningful once the
    /// record belongs to a [`Group`](crate::grouping::Group).
    pub marked_for_removal: bool,
}

impl ImageRecord {
    pub fn with_histogram(path: PathBuf, histogram: Arc<Histogram>) -> Self {
        Self {
            path,
            outcome: Ok(histogram),
            marked_for_removal: true,
        }
    }

    pub fn with_error(path: PathBuf, error: DecodeError) -> Self {
        Self {
            path,
            outcome: Err(error),
            marked_for_removal: true,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn histogram(&self) -> Option<&Histogram> {
        self.outcome.as_ref().ok().map(Arc::as_ref)
    }

    pub fn error(&self) -> Option<&DecodeError> {
        self.outcome.as_ref().err()
    }

    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }
}

impl PartialEq for ImageRecord {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl Eq for ImageRecord {}

impl Hash for ImageRecord {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.path.hash(state);
    }
}

/// Dissimilarity between two distinct images.
#[derive(Debug, Clone)]
pub struct PairScore {
    pub a: ImageRecord,
    pub b: ImageRecord,
    pub diff: u64,
}

impl PairScore {
    /// # Panics
    ///
    /// Panics if both records have the same path; an image is never paired
    /// with itself.
    pub fn new(a: ImageRecord, b: ImageRecord, diff: u64) -> Self {
        assert!(
            a.path != b.path,
            "cannot pair {:?} with itself",
            a.path
        );
        Self { a, b, diff }
    }

    /// See [`scorer::is_match`].
    pub fn is_below(&self, threshold: u64) -> bool {
        scorer::is_match(self.diff, threshold)
    }
}
