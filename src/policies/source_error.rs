//! # Shared handling of message-source failures.
//!
//! All readers of one source share a single [`SourceErrorPolicy`]. Each read
//! failure is counted; the count resets after a quiet period without failures.
//! The policy decides how loudly to log the failure and how long the failing
//! worker waits before it terminates, so an unreachable source does not turn
//! into a hot respawn loop.
//!
//! ```text
//! read fails ──► record() ──► failures += 1 (or reset to 1 after quiet_period)
//!                    ├─► log if failures <= log_first or failures % log_every == 0
//!                    └─► delay = backoff.delay(failures)
//!            ──► sleep(delay) (cancellable) ──► error terminates the worker
//! ```

use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use crate::error::WorkerError;
use crate::policies::backoff::BackoffPolicy;

/// Outcome of recording one failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FailureVerdict {
    /// Consecutive failures including this one.
    pub failures: u32,
    /// How long the failing worker should wait.
    pub delay: Duration,
    /// Whether this failure should be logged.
    pub loud: bool,
}

#[derive(Debug, Default)]
struct FailureWindow {
    failures: u32,
    last: Option<Instant>,
}

/// Failure counter and delay policy shared by the readers of one source.
#[derive(Debug)]
pub struct SourceErrorPolicy {
    backoff: BackoffPolicy,
    quiet_period: Duration,
    log_first: u32,
    log_every: u32,
    window: Mutex<FailureWindow>,
}

impl Default for SourceErrorPolicy {
    /// Default backoff, 3 minute quiet period, log the first 5 then every 30th failure.
    fn default() -> Self {
        Self::new(BackoffPolicy::default())
    }
}

impl SourceErrorPolicy {
    pub fn new(backoff: BackoffPolicy) -> Self {
        Self {
            backoff,
            quiet_period: Duration::from_secs(3 * 60),
            log_first: 5,
            log_every: 30,
            window: Mutex::new(FailureWindow::default()),
        }
    }

    /// Overrides the period after which the failure count resets.
    pub fn with_quiet_period(mut self, period: Duration) -> Self {
        self.quiet_period = period;
        self
    }

    /// Records one failure and returns what to do about it.
    pub fn record(&self) -> FailureVerdict {
        let now = Instant::now();
        let failures = {
            let mut w = self.window.lock();
            let stale = w
                .last
                .is_some_and(|last| now.duration_since(last) > self.quiet_period);
            w.failures = if stale { 1 } else { w.failures.saturating_add(1) };
            w.last = Some(now);
            w.failures
        };

        let loud = failures <= self.log_first
            || (self.log_every > 0 && failures % self.log_every == 0);
        FailureVerdict {
            failures,
            delay: self.backoff.delay(failures),
            loud,
        }
    }

    /// Records the failure, logs it if due, and waits out the delay.
    ///
    /// Returns the verdict, or `Err(Canceled)` if `token` fires while waiting.
    pub async fn handle(
        &self,
        err: &WorkerError,
        token: &CancellationToken,
    ) -> Result<FailureVerdict, WorkerError> {
        let verdict = self.record();
        if verdict.loud {
            tracing::error!(
                failures = verdict.failures,
                delay_ms = u64::try_from(verdict.delay.as_millis()).unwrap_or(u64::MAX),
                error = %err,
                "message source unavailable"
            );
        }

        if !verdict.delay.is_zero() {
            tokio::select! {
                _ = time::sleep(verdict.delay) => {}
                _ = token.cancelled() => return Err(WorkerError::Canceled),
            }
        }
        Ok(verdict)
    }

    /// Current consecutive failure count.
    pub fn failures(&self) -> u32 {
        self.window.lock().failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policies::JitterPolicy;

    fn policy() -> SourceErrorPolicy {
        SourceErrorPolicy::new(BackoffPolicy {
            step: Duration::from_millis(10),
            max: Duration::from_secs(1),
            cycle: 30,
            jitter: JitterPolicy::None,
        })
        .with_quiet_period(Duration::from_secs(60))
    }

    #[tokio::test(start_paused = true)]
    async fn test_consecutive_failures_grow_delay() {
        let p = policy();
        assert_eq!(p.record().delay, Duration::from_millis(10));
        assert_eq!(p.record().delay, Duration::from_millis(20));
        assert_eq!(p.failures(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_quiet_period_resets_count() {
        let p = policy();
        p.record();
        p.record();
        time::advance(Duration::from_secs(61)).await;
        assert_eq!(p.record().failures, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_logging_is_throttled() {
        let p = policy();
        let loud: Vec<bool> = (0..31).map(|_| p.record().loud).collect();
        assert!(loud[..5].iter().all(|l| *l));
        assert!(loud[5..29].iter().all(|l| !*l));
        assert!(loud[29]);
        assert!(!loud[30]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_handle_waits_then_returns() {
        let p = policy();
        let token = CancellationToken::new();
        let started = Instant::now();
        let verdict = p
            .handle(&WorkerError::source_failed("down"), &token)
            .await
            .expect("not cancelled");
        assert_eq!(verdict.failures, 1);
        assert!(started.elapsed() >= Duration::from_millis(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_handle_is_cancellable() {
        let p = SourceErrorPolicy::new(BackoffPolicy {
            step: Duration::from_secs(60),
            max: Duration::from_secs(60),
            cycle: 0,
            jitter: JitterPolicy::None,
        });
        let token = CancellationToken::new();
        token.cancel();
        let res = p.handle(&WorkerError::source_failed("down"), &token).await;
        assert_eq!(res, Err(WorkerError::Canceled));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unbounded_delay_is_still_reported() {
        let p = SourceErrorPolicy::new(BackoffPolicy {
            step: Duration::MAX,
            max: Duration::MAX,
            cycle: 0,
            jitter: JitterPolicy::None,
        });
        let token = CancellationToken::new();
        token.cancel();
        let res = p.handle(&WorkerError::source_failed("down"), &token).await;
        assert_eq!(res, Err(WorkerError::Canceled));
        assert_eq!(p.record().delay, Duration::MAX);
    }
}
