use std::sync::{Mutex, PoisonError};

use crossbeam_channel::Sender;

/// The two parallel stages of a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Histograms,
    Comparison,
}

impl Phase {
    /// Label passed to the progress sink for this phase.
    pub fn label(self) -> &'static str {
        match self {
            Phase::Histograms => "Creating histograms...",
            Phase::Comparison => "Comparing files...",
        }
    }

    /// 1-based position of the phase, for "(1/2)" style displays.
    pub fn number(self) -> usize {
        match self {
            Phase::Histograms => 1,
            Phase::Comparison => 2,
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        [Phase::Histograms, Phase::Comparison]
            .into_iter()
            .find(|phase| phase.label() == label)
    }
}

/// Receives `(percent, label)` updates while a scan runs.
///
/// Implementations must tolerate any number of calls, including none, and a
/// reset to 0 whenever a new phase starts. Calls may arrive from worker
/// threads, but never concurrently.
pub trait ProgressSink: Sync {
    fn report(&self, percent: u8, label: &str);
}

impl<F> ProgressSink for F
where
    F: Fn(u8, &str) + Sync,
{
    fn report(&self, percent: u8, label: &str) {
        self(percent, label)
    }
}

/// Discards every update.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _percent: u8, _label: &str) {}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressUpdate {
    pub percent: u8,
    pub label: String,
}

/// Forwards updates over a channel, for callers that render progress on
/// another thread.
///
/// An update equal to the previous one is dropped, so a phase sends at most
/// 101 messages however many items it has.
#[derive(Debug)]
pub struct ChannelProgress {
    tx: Sender<ProgressUpdate>,
    last: Mutex<Option<ProgressUpdate>>,
}

impl ChannelProgress {
    pub fn new(tx: Sender<ProgressUpdate>) -> Self {
        Self {
            tx,
            last: Mutex::new(None),
        }
    }
}

impl ProgressSink for ChannelProgress {
    fn report(&self, percent: u8, label: &str) {
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(prev) = last.as_ref() {
            if prev.percent == percent && prev.label == label {
                return;
            }
        }

        let update = ProgressUpdate {
            percent,
            label: label.to_string(),
        };
        if self.tx.send(update.clone()).is_err() {
            log::trace!("Progress receiver dropped, update discarded");
        }
        *last = Some(update);
    }
}

/// Completion counter for one phase.
///
/// The counter and the sink call share one lock, so the sink sees
/// percentages in non-decreasing order even though tasks finish in any order.
pub(crate) struct PhaseTracker<'a> {
    sink: &'a dyn ProgressSink,
    phase: Phase,
    total: usize,
    completed: Mutex<usize>,
}

impl<'a> PhaseTracker<'a> {
    pub(crate) fn start(sink: &'a dyn ProgressSink, phase: Phase, total: usize) -> Self {
        sink.report(0, phase.label());
        Self {
            sink,
            phase,
            total,
            completed: Mutex::new(0),
        }
    }

    pub(crate) fn complete_one(&self) {
        let mut completed = self
            .completed
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *completed += 1;
        self.sink
            .report(percent(*completed, self.total), self.phase.label());
    }

    #[cfg(test)]
    pub(crate) fn completed(&self) -> usize {
        *self
            .completed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

fn percent(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    let completed = completed.min(total) as u128;
    (completed * 100 / total as u128) as u8
}
