use crate::histogram::{Channel, Histogram};
use crate::record::{ImageRecord, PairScore};

/// L1 distance between two histograms, summed over all channels.
///
/// # Panics
///
/// Panics if the histograms were built with different bin counts.
pub fn diff(a: &Histogram, b: &Histogram) -> u64 {
    assert_eq!(
        a.bins(),
        b.bins(),
        "histograms with different bin counts cannot be compared"
    );
    Channel::ALL
        .iter()
        .map(|&channel| {
            a.channel(channel)
                .iter()
                .zip(b.channel(channel))
                .map(|(x, y)| x.abs_diff(*y))
                .sum::<u64>()
        })
        .sum()
}

/// Whether a pair scoring `diff` counts as a duplicate. The bound is strict:
/// a pair scoring exactly `threshold` is not a match.
pub fn is_match(diff: u64, threshold: u64) -> bool {
    diff < threshold
}

/// Score two records.
///
/// # Panics
///
/// Panics if either record has no histogram. Only successfully extracted
/// records may be scored.
pub fn score_pair(a: &ImageRecord, b: &ImageRecord) -> PairScore {
    let (Some(hist_a), Some(hist_b)) = (a.histogram(), b.histogram()) else {
        panic!(
            "cannot score {:?} against {:?}: both records need a histogram",
            a.path(),
            b.path()
        );
    };
    PairScore::new(a.clone(), b.clone(), diff(hist_a, hist_b))
}
