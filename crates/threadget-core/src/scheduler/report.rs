//! Per-descriptor outcomes and the aggregated run report.

use std::fmt;

/// Why a descriptor needed no fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// A complete file already exists under the target name.
    AlreadyPresent { size: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Target directory entry could not be inspected or written.
    Filesystem,
    /// Not retryable: HTTP 4xx, malformed URL, storage error.
    Permanent,
    /// Transient errors until the attempt budget ran out.
    TransientExhausted,
    Cancelled,
    /// Task panicked or the engine hit an unexpected state.
    Internal,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::Filesystem => "filesystem",
            FailureKind::Permanent => "permanent",
            FailureKind::TransientExhausted => "retries exhausted",
            FailureKind::Cancelled => "cancelled",
            FailureKind::Internal => "internal",
        };
        f.write_str(s)
    }
}

/// Terminal state of one descriptor. Produced exactly once per descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    Skipped(SkipReason),
    Succeeded {
        bytes_written: u64,
        attempts: u32,
    },
    Failed {
        kind: FailureKind,
        message: String,
        attempts: u32,
    },
}

impl DownloadOutcome {
    pub(crate) fn failed(kind: FailureKind, message: impl Into<String>, attempts: u32) -> Self {
        DownloadOutcome::Failed {
            kind,
            message: message.into(),
            attempts,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, DownloadOutcome::Failed { .. })
    }
}

/// A failure with enough context to act on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedDownload {
    pub index: usize,
    pub target_name: String,
    pub source_url: String,
    pub kind: FailureKind,
    pub message: String,
    pub attempts: u32,
}

impl fmt::Display for FailedDownload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}): {} after {} attempt(s): {}",
            self.target_name, self.source_url, self.kind, self.attempts, self.message
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportEntry {
    pub target_name: String,
    pub outcome: DownloadOutcome,
}

/// Aggregate result of a run. `attempted == skipped + succeeded + failed`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub attempted: usize,
    pub skipped: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Bytes published by successful fetches (skipped files not counted).
    pub bytes_written: u64,
    /// In the order the failures were recorded.
    pub failures: Vec<FailedDownload>,
    /// One per descriptor, in input order.
    pub entries: Vec<ReportEntry>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    /// One-line summary, e.g. `12 files: 10 downloaded, 1 skipped, 1 failed (3.2 MiB)`.
    pub fn summary_line(&self) -> String {
        format!(
            "{} files: {} downloaded, {} skipped, {} failed ({})",
            self.attempted,
            self.succeeded,
            self.skipped,
            self.failed,
            format_bytes(self.bytes_written)
        )
    }
}

/// Human-readable byte count (binary units).
pub fn format_bytes(n: u64) -> String {
    const UNITS: [&str; 4] = ["KiB", "MiB", "GiB", "TiB"];
    if n < 1024 {
        return format!("{} B", n);
    }
    let mut value = n as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}

/// Collects outcomes as they arrive. Each slot is filled at most once.
#[derive(Debug)]
pub struct RunReportBuilder {
    slots: Vec<Option<DownloadOutcome>>,
    names: Vec<String>,
    urls: Vec<String>,
    failures: Vec<FailedDownload>,
}

impl RunReportBuilder {
    /// `targets` holds `(target_name, source_url)` per descriptor in input order.
    pub fn new(targets: Vec<(String, String)>) -> Self {
        let (names, urls): (Vec<_>, Vec<_>) = targets.into_iter().unzip();
        Self {
            slots: vec![None; names.len()],
            names,
            urls,
            failures: Vec::new(),
        }
    }

    /// Records the outcome for `index`. Returns false (and ignores it) when
    /// the index is out of range or already has an outcome.
    pub fn record(&mut self, index: usize, outcome: DownloadOutcome) -> bool {
        let Some(slot) = self.slots.get_mut(index) else {
            return false;
        };
        if slot.is_some() {
            return false;
        }
        if let DownloadOutcome::Failed {
            kind,
            message,
            attempts,
        } = &outcome
        {
            self.failures.push(FailedDownload {
                index,
                target_name: self.names[index].clone(),
                source_url: self.urls[index].clone(),
                kind: *kind,
                message: message.clone(),
                attempts: *attempts,
            });
        }
        *slot = Some(outcome);
        true
    }

    /// Indices still without an outcome.
    pub fn missing(&self) -> Vec<usize> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_none())
            .map(|(i, _)| i)
            .collect()
    }

    /// Builds the report. Any slot still empty is reported as an internal failure.
    pub fn finish(mut self) -> RunReport {
        for index in self.missing() {
            self.record(
                index,
                DownloadOutcome::failed(FailureKind::Internal, "no outcome recorded", 0),
            );
        }
        let mut report = RunReport {
            attempted: self.slots.len(),
            failures: self.failures,
            ..RunReport::default()
        };
        for (target_name, outcome) in self.names.into_iter().zip(self.slots) {
            let outcome = outcome.unwrap_or_else(|| {
                DownloadOutcome::failed(FailureKind::Internal, "no outcome recorded", 0)
            });
            match &outcome {
                DownloadOutcome::Skipped(_) => report.skipped += 1,
                DownloadOutcome::Succeeded { bytes_written, .. } => {
                    report.succeeded += 1;
                    report.bytes_written += bytes_written;
                }
                DownloadOutcome::Failed { .. } => report.failed += 1,
            }
            report.entries.push(ReportEntry {
                target_name,
                outcome,
            });
        }
        report
    }
}
