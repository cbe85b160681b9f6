//! Progress events emitted during a run, and a tally for displaying them.
//!
//! Units send events over an unbounded channel so the engine never waits on
//! the consumer. Events from different descriptors interleave arbitrarily;
//! for one descriptor they arrive in state-machine order.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc::UnboundedSender;

use super::report::FailureKind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressKind {
    CheckStarted,
    Skipped,
    FetchStarted,
    /// Bytes written since the previous event for this descriptor.
    FetchProgress(u64),
    /// Terminal: total bytes published.
    Succeeded(u64),
    /// Terminal: failure kind and message.
    Failed(FailureKind, String),
}

impl ProgressKind {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProgressKind::Skipped | ProgressKind::Succeeded(_) | ProgressKind::Failed(..)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    /// Position of the descriptor in the run's input.
    pub index: usize,
    pub target_name: Arc<str>,
    pub kind: ProgressKind,
}

/// Sends events for one descriptor. Cheap to clone; a missing or closed
/// channel is ignored.
#[derive(Debug, Clone)]
pub(crate) struct ProgressEmitter {
    tx: Option<UnboundedSender<ProgressEvent>>,
    index: usize,
    target_name: Arc<str>,
}

impl ProgressEmitter {
    pub(crate) fn new(
        tx: Option<UnboundedSender<ProgressEvent>>,
        index: usize,
        target_name: &str,
    ) -> Self {
        Self {
            tx,
            index,
            target_name: Arc::from(target_name),
        }
    }

    pub(crate) fn emit(&self, kind: ProgressKind) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(ProgressEvent {
                index: self.index,
                target_name: Arc::clone(&self.target_name),
                kind,
            });
        }
    }
}

/// Running totals folded from progress events (CLI-friendly).
#[derive(Debug, Clone)]
pub struct ProgressTally {
    /// Number of descriptors in the run.
    pub files_total: usize,
    /// Sum of known expected sizes (for percentage and ETA).
    pub bytes_expected: u64,
    pub bytes_done: u64,
    pub skipped: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Fetches started and not yet terminal.
    pub fetching: usize,
    in_flight: HashSet<usize>,
    started: Instant,
}

impl ProgressTally {
    pub fn new(files_total: usize, bytes_expected: u64) -> Self {
        Self {
            files_total,
            bytes_expected,
            bytes_done: 0,
            skipped: 0,
            succeeded: 0,
            failed: 0,
            fetching: 0,
            in_flight: HashSet::new(),
            started: Instant::now(),
        }
    }

    pub fn apply(&mut self, event: &ProgressEvent) {
        match &event.kind {
            ProgressKind::CheckStarted => {}
            ProgressKind::FetchStarted => {
                self.in_flight.insert(event.index);
            }
            ProgressKind::FetchProgress(n) => self.bytes_done += n,
            ProgressKind::Skipped => self.skipped += 1,
            ProgressKind::Succeeded(_) => {
                self.succeeded += 1;
                self.in_flight.remove(&event.index);
            }
            ProgressKind::Failed(..) => {
                self.failed += 1;
                // Only units that got a slot were counted as fetching.
                self.in_flight.remove(&event.index);
            }
        }
        self.fetching = self.in_flight.len();
    }

    /// Descriptors that reached a terminal state.
    pub fn files_done(&self) -> usize {
        self.skipped + self.succeeded + self.failed
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    /// Download rate in bytes per second (0 if elapsed is 0).
    pub fn bytes_per_sec(&self) -> f64 {
        let elapsed = self.elapsed_secs();
        if elapsed <= 0.0 {
            return 0.0;
        }
        self.bytes_done as f64 / elapsed
    }

    /// Fraction of files finished in [0.0, 1.0].
    pub fn fraction(&self) -> f64 {
        if self.files_total == 0 {
            return 1.0;
        }
        (self.files_done() as f64 / self.files_total as f64).min(1.0)
    }
}
