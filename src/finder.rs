//! The two-phase duplicate search: histogram every image in parallel, then
//! score every pair of histograms in parallel and group the close ones.

use std::path::{Path, PathBuf};
use std::time::Instant;

use rayon::prelude::*;
use rayon::ThreadPool;

use crate::cancel::CancelToken;
use crate::error::FinderError;
use crate::grouping::{self, Group};
use crate::histogram::{self, BinCount, Histogram, DEFAULT_BINS};
use crate::progress::{Phase, PhaseTracker, ProgressSink};
use crate::record::{ImageRecord, PairScore};
use crate::scanner::{self, FilterRules, ScanOptions, DEFAULT_EXTENSIONS};
use crate::scorer;

/// Pairs scoring below this are duplicates unless configured otherwise.
pub const DEFAULT_THRESHOLD: u64 = 10_000_000;

#[derive(Debug, Clone)]
pub struct FinderOptions {
    /// Pairs with a diff strictly below this are grouped.
    pub threshold: u64,
    /// Histogram bins per channel.
    pub bins: usize,
    /// Worker threads per phase; `None` uses one per CPU.
    pub parallel: Option<usize>,
    pub extensions: Vec<String>,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub skip_hidden: bool,
}

impl Default for FinderOptions {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            bins: DEFAULT_BINS,
            parallel: None,
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            include: Vec::new(),
            exclude: Vec::new(),
            skip_hidden: false,
        }
    }
}

/// Outcome of a completed or cancelled search.
#[derive(Debug, Clone, Default)]
pub struct FindResult {
    pub groups: Vec<Group>,
    /// Images that could not be decoded.
    pub failed: Vec<ImageRecord>,
}

impl FindResult {
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty() && self.failed.is_empty()
    }
}

pub struct DuplicateFinder {
    options: FinderOptions,
}

impl DuplicateFinder {
    pub fn new(options: FinderOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &FinderOptions {
        &self.options
    }

    /// Search `root` for near-duplicate images.
    ///
    /// Cancellation is not an error: if `cancel` fires at any point the
    /// result is empty, never partial.
    pub fn find(
        &self,
        root: &Path,
        progress: &dyn ProgressSink,
        cancel: &CancelToken,
    ) -> Result<FindResult, FinderError> {
        let bins = BinCount::new(self.options.bins)?;
        let scan_options = ScanOptions {
            extensions: self.options.extensions.clone(),
            filters: FilterRules::new(&self.options.include, &self.options.exclude)?,
            skip_hidden: self.options.skip_hidden,
        };

        let Some(paths) = scanner::scan(root, &scan_options, cancel)? else {
            return Ok(FindResult::default());
        };

        let Some((records, failed)) = self.extract_all(&paths, bins, progress, cancel)? else {
            log::info!("Search cancelled while creating histograms");
            return Ok(FindResult::default());
        };

        let Some(pairs) = self.score_all(&records, progress, cancel)? else {
            log::info!("Search cancelled while comparing files");
            return Ok(FindResult::default());
        };

        let groups = grouping::group_pairs(&pairs);
        log::info!(
            "Found {} duplicate groups, {} unreadable files",
            groups.len(),
            failed.len()
        );
        Ok(FindResult { groups, failed })
    }

    fn build_pool(&self) -> Result<ThreadPool, FinderError> {
        let num_threads = self.options.parallel.unwrap_or_else(num_cpus::get).max(1);
        log::debug!("Using {} worker threads", num_threads);
        Ok(rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build()?)
    }

    /// Phase 1. Returns the decoded records and the failures, both in path
    /// order, or `None` if cancelled.
    fn extract_all(
        &self,
        paths: &[PathBuf],
        bins: BinCount,
        progress: &dyn ProgressSink,
        cancel: &CancelToken,
    ) -> Result<Option<(Vec<ImageRecord>, Vec<ImageRecord>)>, FinderError> {
        let pool = self.build_pool()?;
        let started = Instant::now();
        let tracker = PhaseTracker::start(progress, Phase::Histograms, paths.len());

        let records: Option<Vec<ImageRecord>> = pool.install(|| {
            paths
                .par_iter()
                .map(|path| {
                    if cancel.is_cancelled() {
                        return None;
                    }
                    let record = histogram::extract(path, bins);
                    tracker.complete_one();
                    Some(record)
                })
                .collect()
        });

        let records = match records {
            Some(records) if !cancel.is_cancelled() => records,
            _ => return Ok(None),
        };

        let (ok, failed): (Vec<_>, Vec<_>) = records.into_iter().partition(ImageRecord::is_ok);
        log::info!(
            "Created {} histograms ({} failed) in {:.2?}",
            ok.len(),
            failed.len(),
            started.elapsed()
        );
        Ok(Some((ok, failed)))
    }

    /// Phase 2. Scores all unordered pairs and keeps those below the
    /// threshold, in pair order, or returns `None` if cancelled.
    fn score_all(
        &self,
        records: &[ImageRecord],
        progress: &dyn ProgressSink,
        cancel: &CancelToken,
    ) -> Result<Option<Vec<PairScore>>, FinderError> {
        let histograms: Vec<&Histogram> = records.iter().filter_map(ImageRecord::histogram).collect();
        debug_assert_eq!(histograms.len(), records.len());

        let n = histograms.len();
        let total = pair_count(n);
        let pool = self.build_pool()?;
        let started = Instant::now();
        let tracker = PhaseTracker::start(progress, Phase::Comparison, total);
        let threshold = self.options.threshold;

        // Only matches are stored; an `Err` stops the collect early.
        let matches: Result<Vec<(usize, usize, u64)>, Cancelled> = pool.install(|| {
            unordered_pairs(n)
                .filter_map(|(i, j)| {
                    if cancel.is_cancelled() {
                        return Some(Err(Cancelled));
                    }
                    let diff = scorer::diff(histograms[i], histograms[j]);
                    tracker.complete_one();
                    scorer::is_match(diff, threshold).then_some(Ok((i, j, diff)))
                })
                .collect()
        });

        let matches = match matches {
            Ok(matches) if !cancel.is_cancelled() => matches,
            _ => return Ok(None),
        };

        let retained: Vec<PairScore> = matches
            .into_iter()
            .map(|(i, j, diff)| PairScore::new(records[i].clone(), records[j].clone(), diff))
            .collect();
        log::info!(
            "Compared {} pairs in {:.2?}, {} below threshold {}",
            total,
            started.elapsed(),
            retained.len(),
            threshold
        );
        Ok(Some(retained))
    }
}

struct Cancelled;

fn pair_count(n: usize) -> usize {
    n * n.saturating_sub(1) / 2
}

/// Every `(i, j)` with `i < j < n`. Collecting keeps lexicographic order.
fn unordered_pairs(n: usize) -> impl ParallelIterator<Item = (usize, usize)> {
    (0..n)
        .into_par_iter()
        .flat_map(move |i| (i + 1..n).into_par_iter().map(move |j| (i, j)))
}

/// Search `root` with default options and the given threshold.
pub fn find(
    root: &Path,
    threshold: u64,
    progress: &dyn ProgressSink,
    cancel: &CancelToken,
) -> Result<FindResult, FinderError> {
    DuplicateFinder::new(FinderOptions {
        threshold,
        ..FinderOptions::default()
    })
    .find(root, progress, cancel)
}
