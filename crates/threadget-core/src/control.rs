//! Run-wide cancellation.
//!
//! One `CancelToken` is shared by every unit of a run. Blocking code (curl
//! callbacks) polls `is_cancelled`; async code awaits `cancelled` inside a
//! `select!` at its suspension points (slot wait, backoff, join).
//!
//! `AttemptTracker` counts fetch attempts still running on the blocking pool.
//! Aborting a tokio task does not stop its `spawn_blocking` work, so a run
//! waits on the tracker before it reports.

use std::sync::Arc;
use tokio::sync::watch;

/// Cloneable cancel signal. Once cancelled it stays cancelled.
#[derive(Debug, Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Request cancellation (e.g. on Ctrl-C). Idempotent.
    pub fn cancel(&self) {
        if !self.tx.send_replace(true) {
            tracing::info!("run cancellation requested");
        }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once `cancel` has been called (immediately if it already was).
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        if rx.wait_for(|cancelled| *cancelled).await.is_err() {
            // The sender lives as long as `self`, so this never resolves early.
            std::future::pending::<()>().await;
        }
    }
}

/// Counts live blocking attempts of a run.
#[derive(Debug, Clone)]
pub struct AttemptTracker {
    live: Arc<watch::Sender<usize>>,
}

impl Default for AttemptTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl AttemptTracker {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self { live: Arc::new(tx) }
    }

    /// Registers one attempt. Move the guard into the blocking closure so it
    /// is released only when the attempt has really returned.
    pub fn enter(&self) -> AttemptGuard {
        self.live.send_modify(|n| *n += 1);
        AttemptGuard {
            live: Arc::clone(&self.live),
        }
    }

    pub fn live(&self) -> usize {
        *self.live.borrow()
    }

    /// Resolves once no attempt is running.
    pub async fn idle(&self) {
        let mut rx = self.live.subscribe();
        if rx.wait_for(|n| *n == 0).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Releases its attempt on drop.
#[derive(Debug)]
pub struct AttemptGuard {
    live: Arc<watch::Sender<usize>>,
}

impl Drop for AttemptGuard {
    fn drop(&mut self) {
        self.live.send_modify(|n| *n = n.saturating_sub(1));
    }
}
