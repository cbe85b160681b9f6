//! Run all descriptors of a thread concurrently and collect a report.
//!
//! Every descriptor gets its own task; the limiter (not the task count) bounds
//! how many transfers are in flight. The join loop records each outcome as it
//! arrives, emits the terminal progress event, and after a cancel waits at most
//! the grace period before abandoning whatever is left. Abandoned units may
//! still have a curl attempt on the blocking pool; the run waits for those to
//! observe the cancel and drop their temp files before it reports.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinSet;
use tokio::time::Instant;

use super::limiter::FetchLimiter;
use super::progress::{ProgressEmitter, ProgressEvent, ProgressKind};
use super::report::{DownloadOutcome, FailureKind, RunReport, RunReportBuilder};
use super::unit::{run_unit, UnitContext};
use crate::config::ThreadgetConfig;
use crate::control::{AttemptTracker, CancelToken};
use crate::descriptor::Descriptor;
use crate::downloader::HttpOptions;
use crate::retry::RetryPolicy;
use crate::storage;
use crate::url_model::assign_unique_names;

/// Per-run knobs, usually taken from the config file.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub http: HttpOptions,
    pub retry: RetryPolicy,
    /// How long to wait for in-flight units after a cancel before aborting them.
    pub cancel_grace: Duration,
    /// Check existing files against the thread's MD5 before skipping them.
    pub verify_md5: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            http: HttpOptions::default(),
            retry: RetryPolicy::default(),
            cancel_grace: Duration::from_secs(5),
            verify_md5: false,
        }
    }
}

impl RunOptions {
    pub fn from_config(cfg: &ThreadgetConfig) -> Self {
        Self {
            http: cfg.http_options(),
            retry: cfg.retry_policy(),
            cancel_grace: cfg.cancel_grace(),
            verify_md5: cfg.verify_md5,
        }
    }
}

/// Fatal run error; per-file problems are reported as outcomes instead.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("target directory {}: {source}", .path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

fn fs_error(path: &Path) -> impl FnOnce(io::Error) -> RunError + '_ {
    move |source| RunError::Filesystem {
        path: path.to_path_buf(),
        source,
    }
}

/// Creates `dir` if needed and checks that it is a writable directory.
pub(crate) async fn prepare_target_dir(dir: &Path) -> Result<(), RunError> {
    tokio::fs::create_dir_all(dir).await.map_err(fs_error(dir))?;
    let meta = tokio::fs::metadata(dir).await.map_err(fs_error(dir))?;
    if !meta.is_dir() {
        return Err(fs_error(dir)(io::Error::new(
            io::ErrorKind::Other,
            "not a directory",
        )));
    }
    // Removed again when dropped.
    tempfile::Builder::new()
        .prefix(".threadget-write-check")
        .tempfile_in(dir)
        .map_err(fs_error(dir))?;
    Ok(())
}

/// Downloads `descriptors` into `target_dir`.
///
/// Target names are made unique first (see [`assign_unique_names`]); the
/// report's entries carry the resolved names in input order. Returns `Err`
/// only when the target directory is unusable. Empty input returns an empty
/// report without touching the filesystem.
pub async fn run_downloads(
    descriptors: Vec<Descriptor>,
    target_dir: &Path,
    opts: &RunOptions,
    limiter: Arc<FetchLimiter>,
    progress_tx: Option<UnboundedSender<ProgressEvent>>,
    cancel: &CancelToken,
) -> Result<RunReport, RunError> {
    if descriptors.is_empty() {
        return Ok(RunReport::default());
    }
    prepare_target_dir(target_dir).await?;

    let descriptors = assign_unique_names(descriptors);
    tracing::info!(
        files = descriptors.len(),
        concurrency = limiter.capacity(),
        dir = %target_dir.display(),
        "starting run"
    );

    let mut report = RunReportBuilder::new(
        descriptors
            .iter()
            .map(|d| (d.target_name().to_string(), d.source_url().to_string()))
            .collect(),
    );
    let emitters: Vec<ProgressEmitter> = descriptors
        .iter()
        .enumerate()
        .map(|(i, d)| ProgressEmitter::new(progress_tx.clone(), i, d.target_name()))
        .collect();
    let names: Vec<String> = descriptors
        .iter()
        .map(|d| d.target_name().to_string())
        .collect();
    let ctx = Arc::new(UnitContext {
        target_dir: target_dir.to_path_buf(),
        http: opts.http.clone(),
        retry: opts.retry,
        verify_md5: opts.verify_md5,
        limiter,
        cancel: cancel.clone(),
        tracker: AttemptTracker::new(),
    });

    let mut tasks = JoinSet::new();
    for (index, descriptor) in descriptors.into_iter().enumerate() {
        let ctx = Arc::clone(&ctx);
        let progress = emitters[index].clone();
        tasks.spawn(async move { (index, run_unit(descriptor, ctx, progress).await) });
    }

    let mut grace_deadline: Option<Instant> = None;
    let mut aborted = false;
    loop {
        tokio::select! {
            biased;
            joined = tasks.join_next() => match joined {
                None => break,
                Some(Ok((index, outcome))) => {
                    record(&mut report, &emitters[index], index, outcome);
                }
                Some(Err(e)) if e.is_cancelled() => {}
                Some(Err(e)) => {
                    tracing::error!(error = %e, "download task panicked");
                }
            },
            _ = cancel.cancelled(), if grace_deadline.is_none() => {
                tracing::info!(
                    grace_ms = opts.cancel_grace.as_millis() as u64,
                    "cancel requested, waiting for in-flight downloads"
                );
                grace_deadline = Some(Instant::now() + opts.cancel_grace);
            }
            _ = tokio::time::sleep_until(grace_deadline.unwrap_or_else(Instant::now)),
                if grace_deadline.is_some() && !aborted =>
            {
                tracing::warn!(remaining = tasks.len(), "grace period over, abandoning downloads");
                tasks.abort_all();
                aborted = true;
            }
        }
    }

    if aborted {
        settle_abandoned(&ctx.tracker, target_dir, &names, &report.missing()).await;
    }

    for index in report.missing() {
        let outcome = if cancel.is_cancelled() {
            DownloadOutcome::failed(FailureKind::Cancelled, "abandoned after cancel", 0)
        } else {
            DownloadOutcome::failed(FailureKind::Internal, "download task panicked", 0)
        };
        record(&mut report, &emitters[index], index, outcome);
    }

    let report = report.finish();
    tracing::info!(
        attempted = report.attempted,
        succeeded = report.succeeded,
        skipped = report.skipped,
        failed = report.failed,
        bytes = report.bytes_written,
        "run finished"
    );
    Ok(report)
}

/// Upper bound on waiting for abandoned blocking attempts. curl checks the
/// cancel flag from its progress callback at least once a second.
const SETTLE_LIMIT: Duration = Duration::from_secs(10);

/// Waits for abandoned attempts to return, then removes any temp file an
/// abandoned unit still left behind.
async fn settle_abandoned(
    tracker: &AttemptTracker,
    target_dir: &Path,
    names: &[String],
    missing: &[usize],
) {
    let live = tracker.live();
    if live > 0 {
        tracing::debug!(live, "waiting for abandoned fetch attempts");
        if tokio::time::timeout(SETTLE_LIMIT, tracker.idle()).await.is_err() {
            tracing::warn!(live = tracker.live(), "fetch attempts still running after cancel");
        }
    }
    for &index in missing {
        let temp = storage::temp_path(&target_dir.join(&names[index]));
        match tokio::fs::remove_file(&temp).await {
            Ok(()) => tracing::debug!(path = %temp.display(), "removed abandoned temp file"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(path = %temp.display(), error = %e, "failed to remove temp file"),
        }
    }
}

/// Records `outcome` and emits the matching terminal event.
fn record(
    report: &mut RunReportBuilder,
    emitter: &ProgressEmitter,
    index: usize,
    outcome: DownloadOutcome,
) {
    let event = match &outcome {
        DownloadOutcome::Skipped(_) => ProgressKind::Skipped,
        DownloadOutcome::Succeeded { bytes_written, .. } => ProgressKind::Succeeded(*bytes_written),
        DownloadOutcome::Failed { kind, message, .. } => {
            tracing::warn!(index, kind = %kind, error = %message, "download failed");
            ProgressKind::Failed(*kind, message.clone())
        }
    };
    if report.record(index, outcome) {
        emitter.emit(event);
    }
}

/// Convenience entry point: default options, a fresh limiter of
/// `concurrency` slots and a cancel token nobody fires.
pub async fn run(
    descriptors: Vec<Descriptor>,
    target_dir: &Path,
    concurrency: usize,
    progress_tx: Option<UnboundedSender<ProgressEvent>>,
) -> Result<RunReport, RunError> {
    run_downloads(
        descriptors,
        target_dir,
        &RunOptions::default(),
        Arc::new(FetchLimiter::new(concurrency)),
        progress_tx,
        &CancelToken::new(),
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_input_touches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("never-created");
        let report = run(Vec::new(), &target, 4, None).await.unwrap();
        assert_eq!(report.attempted, 0);
        assert!(report.is_success());
        assert!(!target.exists());
    }

    #[tokio::test]
    async fn file_as_target_dir_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("plain");
        std::fs::write(&file, b"x").unwrap();
        let d = Descriptor::new("http://127.0.0.1:9/a.jpg", "a.jpg", 1, None).unwrap();
        let err = run(vec![d], &file, 2, None).await.unwrap_err();
        assert!(matches!(err, RunError::Filesystem { .. }));
    }

    #[tokio::test]
    async fn prepare_creates_nested_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        prepare_target_dir(&nested).await.unwrap();
        assert!(nested.is_dir());
        assert_eq!(std::fs::read_dir(&nested).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn all_present_files_skip() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.jpg"), b"aa").unwrap();
        std::fs::write(dir.path().join("b.jpg"), b"bbb").unwrap();
        let ds = vec![
            Descriptor::new("http://127.0.0.1:9/a.jpg", "a.jpg", 1, Some(2)).unwrap(),
            Descriptor::new("http://127.0.0.1:9/b.jpg", "b.jpg", 1, None).unwrap(),
        ];
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let report = run(ds, dir.path(), 2, Some(tx)).await.unwrap();
        assert_eq!(report.skipped, 2);
        assert_eq!(report.bytes_written, 0);
        let mut skipped = 0;
        while let Ok(ev) = rx.try_recv() {
            if ev.kind == ProgressKind::Skipped {
                skipped += 1;
            }
        }
        assert_eq!(skipped, 2);
    }
}
