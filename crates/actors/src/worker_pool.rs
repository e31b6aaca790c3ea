//! The bounded worker pool the realtime train collector dispatches
//! per-server cycles onto (spec §4.7, §5, §9 "Per-server parallelism").
//!
//! Unlike the actor mailbox (an unbounded-intent queue with backpressure
//! via a bounded channel), this pool uses *synchronous handoff*: a
//! submission either finds a free worker immediately or is rejected outright.
//! Rejections never buffer -- the caller must count its own latch down, or a
//! burst of rejections would stall whoever is waiting on it (spec §7
//! "Worker-pool rejection").

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;

/// Counts down as dispatched tasks (successful or rejected) complete. A
/// `wait` caller uses this to know when one collection cycle's fan-out has
/// fully drained (spec §4.7 "Latch-wait timeout 20s").
#[derive(Clone)]
pub struct CycleLatch {
    remaining: Arc<tokio::sync::Semaphore>,
    total: usize,
}

impl CycleLatch {
    pub fn new(total: usize) -> Self {
        Self {
            remaining: Arc::new(Semaphore::new(0)),
            total,
        }
    }

    fn count_down(&self) {
        self.remaining.add_permits(1);
    }

    /// Waits for every dispatched task to finish, up to `timeout`. Spec
    /// §4.7: exceeding it logs but does not fail the run.
    pub async fn wait(&self, timeout: std::time::Duration) {
        let wait = async {
            for _ in 0..self.total {
                let _ = self.remaining.acquire().await;
            }
        };
        if tokio::time::timeout(timeout, wait).await.is_err() {
            tracing::warn!(total = self.total, "worker pool cycle latch timed out");
        }
    }
}

/// A bounded pool with synchronous handoff (spec §9): no internal queueing,
/// `try_acquire_owned` either grants a slot immediately or the submission is
/// rejected on the spot.
pub struct WorkerPool {
    semaphore: Arc<Semaphore>,
}

impl WorkerPool {
    /// `capacity` should sit in 15-30 per spec §4.7/§5.
    pub fn new(capacity: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
        }
    }

    /// Submits `task` for immediate execution. If the pool is saturated the
    /// submission is rejected and `latch` is counted down right away so the
    /// cycle never stalls waiting on a task that was never dispatched (spec
    /// §7 "Worker-pool rejection").
    pub fn submit<F, Fut>(&self, latch: CycleLatch, task: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let semaphore = self.semaphore.clone();
        match semaphore.try_acquire_owned() {
            Ok(permit) => {
                tokio::spawn(async move {
                    task().await;
                    drop(permit);
                    latch.count_down();
                });
            }
            Err(_) => {
                tracing::warn!("worker pool saturated, rejecting submission");
                latch.count_down();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn rejected_submissions_still_count_down_the_latch() {
        let pool = WorkerPool::new(1);
        let ran = Arc::new(AtomicUsize::new(0));
        let latch = CycleLatch::new(3);

        let blocker_ran = ran.clone();
        pool.submit(latch.clone(), move || async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            blocker_ran.fetch_add(1, Ordering::SeqCst);
        });
        // the pool has capacity 1, so these two are rejected immediately.
        pool.submit(latch.clone(), {
            let ran = ran.clone();
            move || async move {
                ran.fetch_add(1, Ordering::SeqCst);
            }
        });
        pool.submit(latch.clone(), {
            let ran = ran.clone();
            move || async move {
                ran.fetch_add(1, Ordering::SeqCst);
            }
        });

        latch.wait(Duration::from_secs(1)).await;
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }
}
