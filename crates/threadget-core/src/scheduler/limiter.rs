//! Concurrency limiter for in-flight fetches.
//!
//! A counting semaphore admits at most `capacity` fetches at once; waiters
//! are served in FIFO order so no descriptor is starved. The in-flight count
//! and its high-water mark are kept in atomics for instrumentation.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

#[derive(Debug)]
pub struct FetchLimiter {
    semaphore: Arc<Semaphore>,
    capacity: usize,
    in_flight: AtomicUsize,
    high_water: AtomicUsize,
}

impl FetchLimiter {
    /// Create a limiter admitting `capacity` fetches at once (at least 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
            in_flight: AtomicUsize::new(0),
            high_water: AtomicUsize::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of slots currently held.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Most slots ever held at the same time.
    pub fn high_water(&self) -> usize {
        self.high_water.load(Ordering::Acquire)
    }

    /// Wait for a free slot. The slot is released when the returned guard drops.
    pub async fn acquire(self: &Arc<Self>) -> FetchSlot {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .expect("limiter semaphore is never closed");
        let now = self.in_flight.fetch_add(1, Ordering::AcqRel) + 1;
        self.high_water.fetch_max(now, Ordering::AcqRel);
        FetchSlot {
            limiter: Arc::clone(self),
            _permit: permit,
        }
    }
}

/// Releases its slot when dropped.
#[derive(Debug)]
pub struct FetchSlot {
    limiter: Arc<FetchLimiter>,
    _permit: OwnedSemaphorePermit,
}

impl Drop for FetchSlot {
    fn drop(&mut self) {
        // Runs before `_permit` is dropped, so the count never exceeds capacity.
        self.limiter.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn capacity_is_at_least_one() {
        assert_eq!(FetchLimiter::new(0).capacity(), 1);
        assert_eq!(FetchLimiter::new(12).capacity(), 12);
    }

    #[tokio::test]
    async fn acquire_and_release() {
        let limiter = Arc::new(FetchLimiter::new(2));
        let a = limiter.acquire().await;
        let b = limiter.acquire().await;
        assert_eq!(limiter.in_flight(), 2);
        assert!(
            tokio::time::timeout(Duration::from_millis(30), limiter.acquire())
                .await
                .is_err(),
            "third acquire must wait while both slots are held"
        );
        drop(a);
        let c = tokio::time::timeout(Duration::from_millis(200), limiter.acquire())
            .await
            .expect("slot freed");
        drop(b);
        drop(c);
        assert_eq!(limiter.in_flight(), 0);
        assert_eq!(limiter.high_water(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn high_water_never_exceeds_capacity() {
        let limiter = Arc::new(FetchLimiter::new(3));
        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..40 {
            let limiter = Arc::clone(&limiter);
            tasks.spawn(async move {
                let _slot = limiter.acquire().await;
                assert!(limiter.in_flight() <= 3);
                tokio::time::sleep(Duration::from_millis(2)).await;
            });
        }
        while let Some(res) = tasks.join_next().await {
            res.unwrap();
        }
        assert!(limiter.high_water() <= 3);
        assert!(limiter.high_water() >= 1);
        assert_eq!(limiter.in_flight(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn waiters_are_admitted_in_arrival_order() {
        let limiter = Arc::new(FetchLimiter::new(1));
        let held = limiter.acquire().await;
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut waiters = Vec::new();
        for i in 0..3 {
            let limiter = Arc::clone(&limiter);
            let order = Arc::clone(&order);
            waiters.push(tokio::spawn(async move {
                let _slot: FetchSlot = limiter.acquire().await;
                order.lock().unwrap().push(i);
            }));
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        drop(held);
        for w in waiters {
            w.await.unwrap();
        }
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
        assert_eq!(limiter.in_flight(), 0);
    }
}
