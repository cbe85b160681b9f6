//! Download scheduler.
//!
//! Coordinates one run over a thread's descriptors:
//! existence check → limiter admission → retried fetch → report.
//! A shared `FetchLimiter` bounds in-flight transfers across the whole run.

mod limiter;
mod parallel;
mod progress;
mod report;
mod unit;

pub use limiter::{FetchLimiter, FetchSlot};
pub use parallel::{run, run_downloads, RunError, RunOptions};
pub use progress::{ProgressEvent, ProgressKind, ProgressTally};
pub use report::{
    format_bytes, DownloadOutcome, FailedDownload, FailureKind, ReportEntry, RunReport,
    RunReportBuilder, SkipReason,
};
