//! # Read throttle for secondary readers.
//!
//! Bounds how many **secondary** workers may be inside a receive call at once.
//! The primary reader never waits here: it gets [`ThrottleGuard::Bypass`], since
//! it is the one keeping the pool responsive to new work.
//!
//! ```text
//! permits = max(max_read_parallelism - 1, 1)     (the primary is the "-1")
//!
//! primary   ──► enter(true)  ──► Bypass            (no permit)
//! secondary ──► enter(false) ──► Permit(owned)     (waits, cancellable)
//!                                  └─ dropped after the read → permit returned
//! ```

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::error::WorkerError;

/// Scoped release handle returned by [`Throttle`].
///
/// Dropping it returns the permit, whatever the exit path.
#[derive(Debug)]
pub enum ThrottleGuard {
    /// No permit held (primary reader).
    Bypass,
    /// One permit held until drop.
    Permit(OwnedSemaphorePermit),
}

impl ThrottleGuard {
    /// True if this guard holds a permit.
    pub fn is_permit(&self) -> bool {
        matches!(self, ThrottleGuard::Permit(_))
    }
}

/// Counting-permit limiter for concurrent secondary reads.
#[derive(Clone, Debug)]
pub struct Throttle {
    sem: Arc<Semaphore>,
    permits: usize,
}

impl Throttle {
    /// Creates a throttle for the given total read parallelism.
    pub fn new(max_read_parallelism: usize) -> Self {
        let permits = max_read_parallelism.saturating_sub(1).max(1);
        Self {
            sem: Arc::new(Semaphore::new(permits)),
            permits,
        }
    }

    /// Total number of permits.
    pub fn permits(&self) -> usize {
        self.permits
    }

    /// Permits currently free.
    pub fn available(&self) -> usize {
        self.sem.available_permits()
    }

    /// Acquires a permit, or bypasses the throttle for the primary reader.
    ///
    /// Fails with [`WorkerError::Canceled`] if `token` fires first.
    pub async fn enter(
        &self,
        is_primary: bool,
        token: &CancellationToken,
    ) -> Result<ThrottleGuard, WorkerError> {
        if is_primary {
            return Ok(ThrottleGuard::Bypass);
        }
        if token.is_cancelled() {
            return Err(WorkerError::Canceled);
        }
        tokio::select! {
            biased;
            _ = token.cancelled() => Err(WorkerError::Canceled),
            res = self.sem.clone().acquire_owned() => match res {
                Ok(permit) => Ok(ThrottleGuard::Permit(permit)),
                Err(_closed) => Err(WorkerError::Canceled),
            },
        }
    }

    /// Blocking variant of [`enter`](Self::enter) for synchronous callers.
    ///
    /// Parks the calling thread. Must not be called from inside an async task.
    pub fn enter_blocking(
        &self,
        is_primary: bool,
        token: &CancellationToken,
    ) -> Result<ThrottleGuard, WorkerError> {
        futures::executor::block_on(self.enter(is_primary, token))
    }

    /// Takes a permit only if one is free right now.
    pub fn try_enter(&self, is_primary: bool) -> Option<ThrottleGuard> {
        if is_primary {
            return Some(ThrottleGuard::Bypass);
        }
        self.sem
            .clone()
            .try_acquire_owned()
            .ok()
            .map(ThrottleGuard::Permit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_permits_exclude_primary() {
        assert_eq!(Throttle::new(4).permits(), 3);
        assert_eq!(Throttle::new(2).permits(), 1);
        assert_eq!(Throttle::new(1).permits(), 1);
        assert_eq!(Throttle::new(0).permits(), 1);
    }

    #[tokio::test]
    async fn test_primary_bypasses_exhausted_throttle() {
        let t = Throttle::new(2);
        let token = CancellationToken::new();
        let _held = t.enter(false, &token).await.expect("permit");
        assert_eq!(t.available(), 0);

        let guard = t.enter(true, &token).await.expect("bypass");
        assert!(!guard.is_permit());
    }

    #[tokio::test]
    async fn test_guard_drop_returns_permit() {
        let t = Throttle::new(3);
        let token = CancellationToken::new();
        {
            let a = t.enter(false, &token).await.expect("permit");
            let b = t.enter(false, &token).await.expect("permit");
            assert!(a.is_permit() && b.is_permit());
            assert_eq!(t.available(), 0);
            assert!(t.try_enter(false).is_none());
        }
        assert_eq!(t.available(), 2);
    }

    #[tokio::test]
    async fn test_waiting_enter_is_cancellable() {
        let t = Throttle::new(2);
        let token = CancellationToken::new();
        let _held = t.enter(false, &token).await.expect("permit");

        let waiter = {
            let t = t.clone();
            let token = token.clone();
            tokio::spawn(async move { t.enter(false, &token).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        token.cancel();

        let res = waiter.await.expect("join");
        assert!(matches!(res, Err(WorkerError::Canceled)));
    }

    #[test]
    fn test_enter_blocking_from_plain_threads() {
        let t = Throttle::new(2);
        let token = CancellationToken::new();
        let first = t.enter_blocking(false, &token).expect("permit");

        let handle = {
            let t = t.clone();
            let token = token.clone();
            std::thread::spawn(move || t.enter_blocking(false, &token).map(|g| g.is_permit()))
        };
        std::thread::sleep(Duration::from_millis(20));
        drop(first);

        assert_eq!(handle.join().expect("thread"), Ok(true));
    }
}
