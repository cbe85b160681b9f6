//! One descriptor's path through the engine:
//! `Checking -> Skipped | Admitted -> Fetching -> Succeeded | Failed`.

use std::path::PathBuf;
use std::sync::Arc;

use super::limiter::FetchLimiter;
use super::progress::{ProgressEmitter, ProgressKind};
use super::report::{DownloadOutcome, FailureKind, SkipReason};
use crate::control::{AttemptTracker, CancelToken};
use crate::descriptor::Descriptor;
use crate::downloader::{fetch_with_retry, HttpOptions};
use crate::existence::{self, Presence};
use crate::retry::{classify, ErrorKind, FetchError, RetryPolicy};

/// Everything a unit shares with its siblings.
#[derive(Debug)]
pub(crate) struct UnitContext {
    pub target_dir: PathBuf,
    pub http: HttpOptions,
    pub retry: RetryPolicy,
    pub verify_md5: bool,
    pub limiter: Arc<FetchLimiter>,
    pub cancel: CancelToken,
    pub tracker: AttemptTracker,
}

/// Drives `descriptor` to its outcome. Emits the non-terminal progress
/// events; the terminal one is left to the caller.
pub(crate) async fn run_unit(
    descriptor: Descriptor,
    ctx: Arc<UnitContext>,
    progress: ProgressEmitter,
) -> DownloadOutcome {
    let name = descriptor.target_name();
    if ctx.cancel.is_cancelled() {
        return DownloadOutcome::failed(FailureKind::Cancelled, "cancelled before start", 0);
    }

    progress.emit(ProgressKind::CheckStarted);
    match existence::check(&descriptor, &ctx.target_dir, ctx.verify_md5).await {
        Ok(Presence::Present { size }) => {
            tracing::debug!(file = %name, size, "already present, skipping");
            return DownloadOutcome::Skipped(SkipReason::AlreadyPresent { size });
        }
        Ok(Presence::Absent) => {}
        Err(e) => {
            return DownloadOutcome::failed(
                FailureKind::Filesystem,
                format!("check {}: {}", name, e),
                0,
            );
        }
    }

    let slot = tokio::select! {
        biased;
        _ = ctx.cancel.cancelled() => {
            return DownloadOutcome::failed(FailureKind::Cancelled, "cancelled while queued", 0);
        }
        slot = ctx.limiter.acquire() => slot,
    };

    tracing::debug!(file = %name, in_flight = ctx.limiter.in_flight(), "fetch admitted");
    progress.emit(ProgressKind::FetchStarted);
    let on_bytes = {
        let progress = progress.clone();
        move |n: u64| progress.emit(ProgressKind::FetchProgress(n))
    };
    let attempted = fetch_with_retry(
        &descriptor,
        &ctx.target_dir,
        &ctx.http,
        &ctx.retry,
        &ctx.cancel,
        &ctx.tracker,
        on_bytes,
    )
    .await;
    drop(slot);

    match attempted.result {
        Ok(bytes_written) => DownloadOutcome::Succeeded {
            bytes_written,
            attempts: attempted.attempts,
        },
        Err(e) => DownloadOutcome::failed(failure_kind(&e), e.to_string(), attempted.attempts),
    }
}

/// Maps the final error of a retried fetch to a report kind.
fn failure_kind(err: &FetchError) -> FailureKind {
    if let FetchError::Internal(_) = err {
        return FailureKind::Internal;
    }
    match classify(err) {
        ErrorKind::Cancelled => FailureKind::Cancelled,
        kind if kind.is_transient() => FailureKind::TransientExhausted,
        _ => FailureKind::Permanent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn ctx(dir: &std::path::Path, cancel: CancelToken) -> Arc<UnitContext> {
        Arc::new(UnitContext {
            target_dir: dir.to_path_buf(),
            http: HttpOptions {
                connect_timeout: Duration::from_secs(2),
                ..HttpOptions::default()
            },
            retry: RetryPolicy {
                max_attempts: 1,
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(1),
            },
            verify_md5: false,
            limiter: Arc::new(FetchLimiter::new(1)),
            cancel,
            tracker: AttemptTracker::new(),
        })
    }

    #[test]
    fn failure_kinds() {
        assert_eq!(failure_kind(&FetchError::Http(404)), FailureKind::Permanent);
        assert_eq!(failure_kind(&FetchError::Http(503)), FailureKind::TransientExhausted);
        assert_eq!(
            failure_kind(&FetchError::PartialTransfer {
                expected: 2,
                received: 1
            }),
            FailureKind::TransientExhausted
        );
        assert_eq!(failure_kind(&FetchError::Cancelled), FailureKind::Cancelled);
        assert_eq!(
            failure_kind(&FetchError::Internal("boom".into())),
            FailureKind::Internal
        );
        assert_eq!(
            failure_kind(&FetchError::Storage(std::io::Error::from_raw_os_error(28))),
            FailureKind::Permanent
        );
    }

    #[tokio::test]
    async fn present_file_is_skipped_without_a_slot() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.jpg"), b"abc").unwrap();
        let d = Descriptor::new("http://127.0.0.1:9/a.jpg", "a.jpg", 1, Some(3)).unwrap();
        let ctx = ctx(dir.path(), CancelToken::new());
        let out = run_unit(d, Arc::clone(&ctx), ProgressEmitter::new(None, 0, "a.jpg")).await;
        assert_eq!(out, DownloadOutcome::Skipped(SkipReason::AlreadyPresent { size: 3 }));
        assert_eq!(ctx.limiter.high_water(), 0);
    }

    #[tokio::test]
    async fn cancelled_token_short_circuits() {
        let dir = tempfile::tempdir().unwrap();
        let cancel = CancelToken::new();
        cancel.cancel();
        let d = Descriptor::new("http://127.0.0.1:9/a.jpg", "a.jpg", 1, None).unwrap();
        let out = run_unit(d, ctx(dir.path(), cancel), ProgressEmitter::new(None, 0, "a.jpg")).await;
        assert!(matches!(
            out,
            DownloadOutcome::Failed {
                kind: FailureKind::Cancelled,
                attempts: 0,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn malformed_url_fails_permanently() {
        let dir = tempfile::tempdir().unwrap();
        let d = Descriptor::new("not a url", "a.jpg", 1, None).unwrap();
        let out = run_unit(d, ctx(dir.path(), CancelToken::new()), ProgressEmitter::new(None, 0, "a.jpg")).await;
        assert!(matches!(
            out,
            DownloadOutcome::Failed {
                kind: FailureKind::Permanent,
                attempts: 1,
                ..
            }
        ));
        assert!(!dir.path().join("a.jpg.part").exists());
    }

    #[tokio::test]
    async fn waiting_for_slot_observes_cancel() {
        let dir = tempfile::tempdir().unwrap();
        let cancel = CancelToken::new();
        let ctx = ctx(dir.path(), cancel.clone());
        let held = ctx.limiter.acquire().await;
        let d = Descriptor::new("http://127.0.0.1:9/a.jpg", "a.jpg", 1, None).unwrap();
        let unit = tokio::spawn(run_unit(d, Arc::clone(&ctx), ProgressEmitter::new(None, 0, "a.jpg")));
        tokio::time::sleep(Duration::from_millis(30)).await;
        cancel.cancel();
        let out = tokio::time::timeout(Duration::from_secs(2), unit)
            .await
            .expect("unit finishes promptly")
            .unwrap();
        assert!(matches!(
            out,
            DownloadOutcome::Failed {
                kind: FailureKind::Cancelled,
                ..
            }
        ));
        drop(held);
    }
}
