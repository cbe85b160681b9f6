//! Retry loop: run an async attempt until success or the policy says stop.

use std::future::Future;

use super::classify;
use super::error::FetchError;
use super::policy::{RetryDecision, RetryPolicy};
use crate::control::CancelToken;

/// Final result of a retried operation plus how many attempts were made.
#[derive(Debug)]
pub struct Attempted<T> {
    pub result: Result<T, FetchError>,
    pub attempts: u32,
}

/// Runs `attempt` (called with the 1-based attempt number) until it succeeds
/// or the retry policy says to stop. Backoff sleeps end early with
/// `FetchError::Cancelled` when `cancel` fires; the attempt count then only
/// includes attempts that actually started.
pub async fn run_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancelToken,
    mut attempt: F,
) -> Attempted<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let mut n = 1u32;
    loop {
        let err = match attempt(n).await {
            Ok(v) => {
                if n > 1 {
                    tracing::debug!(attempts = n, "succeeded after retry");
                }
                return Attempted {
                    result: Ok(v),
                    attempts: n,
                };
            }
            Err(e) => e,
        };
        let kind = classify::classify(&err);
        match policy.decide(n, kind) {
            RetryDecision::NoRetry => {
                return Attempted {
                    result: Err(err),
                    attempts: n,
                }
            }
            RetryDecision::RetryAfter(delay) => {
                tracing::warn!(
                    attempt = n,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "transient failure, retrying"
                );
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = cancel.cancelled() => {
                        return Attempted {
                            result: Err(FetchError::Cancelled),
                            attempts: n,
                        };
                    }
                }
                n += 1;
            }
        }
    }
}
