//! Retried fetch: `fetch_to_target` on the blocking pool under a retry policy.

use std::path::Path;

use super::{fetch_to_target, HttpOptions};
use crate::control::{AttemptTracker, CancelToken};
use crate::descriptor::Descriptor;
use crate::retry::{run_with_retry, Attempted, FetchError, RetryPolicy};

/// Fetches `descriptor` with up to `policy.max_attempts` attempts.
///
/// Each attempt runs on tokio's blocking pool. `on_bytes` receives the size of
/// every chunk written, across all attempts. A panicked attempt becomes
/// `FetchError::Internal` and is not retried. Every attempt holds a guard of
/// `tracker` until its blocking body returns, even when this future is
/// dropped first.
pub async fn fetch_with_retry<P>(
    descriptor: &Descriptor,
    target_dir: &Path,
    opts: &HttpOptions,
    policy: &RetryPolicy,
    cancel: &CancelToken,
    tracker: &AttemptTracker,
    on_bytes: P,
) -> Attempted<u64>
where
    P: Fn(u64) + Clone + Send + 'static,
{
    run_with_retry(policy, cancel, |attempt| {
        let descriptor = descriptor.clone();
        let target_dir = target_dir.to_path_buf();
        let opts = opts.clone();
        let cancel = cancel.clone();
        let on_bytes = on_bytes.clone();
        let guard = tracker.enter();
        async move {
            tracing::debug!(file = %descriptor.target_name(), attempt, "fetch attempt");
            let joined = tokio::task::spawn_blocking(move || {
                let _guard = guard;
                let mut report = |n: u64| on_bytes(n);
                fetch_to_target(&descriptor, &target_dir, &opts, &cancel, &mut report)
            })
            .await;
            match joined {
                Ok(result) => result,
                Err(e) => Err(FetchError::Internal(format!("fetch task failed: {}", e))),
            }
        }
    })
    .await
}
