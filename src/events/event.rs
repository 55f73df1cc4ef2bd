//! # Runtime events emitted by the coordinator and its workers.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Lifecycle events**: coordinator start/stop and drain outcome
//! - **Pool events**: worker admission, retirement, failure, resize, pause
//! - **Message events**: rollbacks, processing failures, source errors
//! - **Subscriber events**: overflow and panics inside subscriber workers
//!
//! The [`Event`] struct carries additional metadata such as timestamps, worker id,
//! reasons, pool capacity and delays.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use queuevisor::{Event, EventKind, WorkerId};
//!
//! let ev = Event::new(EventKind::WorkerFailed)
//!     .with_worker(WorkerId::new(3))
//!     .with_reason("dispatch failed: boom")
//!     .with_running(2);
//!
//! assert_eq!(ev.kind, EventKind::WorkerFailed);
//! assert_eq!(ev.worker, Some(WorkerId::new(3)));
//! assert_eq!(ev.reason.as_deref(), Some("dispatch failed: boom"));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use crate::workers::WorkerId;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets:
    /// - `reason`: `subscriber=<name> panic=<message>`
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets:
    /// - `reason`: `subscriber=<name> reason=<full|closed>`
    SubscriberOverflow,

    // === Coordinator lifecycle ===
    /// Coordinator started a new Start/Stop cycle.
    ///
    /// Sets:
    /// - `capacity`: configured pool capacity at start
    CoordinatorStarted,

    /// Stop was requested; cancellation has been signalled to all workers.
    ///
    /// Sets:
    /// - `running`: workers registered when stop began
    StopRequested,

    /// Every registered worker exited before the hard-stop timeout.
    AllStoppedWithin,

    /// Hard-stop timeout elapsed; remaining workers were abandoned.
    ///
    /// Sets:
    /// - `running`: number of stragglers
    /// - `reason`: straggler ids
    /// - `timeout_ms`: configured stop timeout
    StopTimeoutExceeded,

    // === Pool events ===
    /// A worker was admitted and spawned.
    ///
    /// Sets:
    /// - `worker`: new worker id
    /// - `running`: registered workers after admission
    WorkerAdmitted,

    /// A worker left its loop normally (retired or cancelled).
    ///
    /// Sets:
    /// - `worker`: worker id
    /// - `running`: registered workers after removal
    WorkerRetired,

    /// A worker terminated with an error.
    ///
    /// Sets:
    /// - `worker`: worker id
    /// - `reason`: error message
    /// - `running`: registered workers after removal
    WorkerFailed,

    /// A worker panicked; it was removed like any other exit.
    ///
    /// Sets:
    /// - `worker`: worker id
    /// - `reason`: panic message
    WorkerPanicked,

    /// Pool capacity changed at runtime.
    ///
    /// Sets:
    /// - `capacity`: new capacity
    /// - `running`: registered workers at the time of the change
    CapacityChanged,

    /// Pause flag toggled.
    ///
    /// Sets:
    /// - `reason`: `paused` or `resumed`
    PauseChanged,

    /// An external activation relaunched a listener on an idle pool.
    ///
    /// Published after `WorkerAdmitted` of the relaunched worker.
    QueueActivated,

    // === Message events ===
    /// Dispatcher asked for the unit of work to be rolled back.
    ///
    /// Sets:
    /// - `worker`: worker id
    MessageRolledBack,

    /// Dispatcher raised an error; the worker is about to terminate.
    ///
    /// Sets:
    /// - `worker`: worker id
    /// - `reason`: error message
    MessageFailed,

    /// Message source failed to read.
    ///
    /// Sets:
    /// - `worker`: worker id
    /// - `reason`: error message
    /// - `attempt`: consecutive failure count
    /// - `delay_ms`: pause applied before the worker terminates
    SourceError,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Worker the event refers to, if any.
    pub worker: Option<WorkerId>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
    /// Pool capacity.
    pub capacity: Option<usize>,
    /// Registered workers.
    pub running: Option<usize>,
    /// Consecutive failure count.
    pub attempt: Option<u32>,
    /// Delay in milliseconds (compact).
    pub delay_ms: Option<u32>,
    /// Timeout in milliseconds (compact).
    pub timeout_ms: Option<u32>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            worker: None,
            reason: None,
            capacity: None,
            running: None,
            attempt: None,
            delay_ms: None,
            timeout_ms: None,
        }
    }

    /// Attaches a worker id.
    #[inline]
    pub fn with_worker(mut self, id: WorkerId) -> Self {
        self.worker = Some(id);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    #[inline]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    #[inline]
    pub fn with_running(mut self, running: usize) -> Self {
        self.running = Some(running);
        self
    }

    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches a delay (stored as milliseconds, saturating).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        self.delay_ms = Some(compact_ms(d));
        self
    }

    /// Attaches a timeout (stored as milliseconds, saturating).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        self.timeout_ms = Some(compact_ms(d));
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_reason(format!("subscriber={subscriber} panic={info}"))
    }
}

fn compact_ms(d: Duration) -> u32 {
    d.as_millis().min(u128::from(u32::MAX)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seq_is_monotonic() {
        let a = Event::new(EventKind::WorkerAdmitted);
        let b = Event::new(EventKind::WorkerRetired);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn test_delay_saturates_at_u32() {
        let ev = Event::new(EventKind::SourceError).with_delay(Duration::from_secs(u64::MAX / 4));
        assert_eq!(ev.delay_ms, Some(u32::MAX));
    }

    #[test]
    fn test_subscriber_overflow_reason() {
        let ev = Event::subscriber_overflow("audit", "full");
        assert_eq!(ev.kind, EventKind::SubscriberOverflow);
        assert_eq!(ev.reason.as_deref(), Some("subscriber=audit reason=full"));
    }
}
