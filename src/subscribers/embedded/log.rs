//! # LogWriter: events rendered through `tracing`
//!
//! A minimal subscriber that turns incoming [`Event`]s into `tracing` records.
//! Worker failures and degraded stops log at `warn`, the rest at `info`/`debug`.
//!
//! ## Example output (fmt subscriber)
//! ```text
//! INFO  queuevisor: [started] capacity=4
//! DEBUG queuevisor: [admitted] worker=worker-2 running=2
//! WARN  queuevisor: [failed] worker=worker-1 reason="dispatch failed: boom" running=1
//! INFO  queuevisor: [resized] capacity=8 running=1
//! WARN  queuevisor: [stop-timeout] stragglers="worker-3" timeout_ms=30000
//! ```

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

fn worker(e: &Event) -> String {
    e.worker.map_or_else(|| "-".to_string(), |w| w.to_string())
}

fn reason(e: &Event) -> &str {
    e.reason.as_deref().unwrap_or("")
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        match e.kind {
            EventKind::CoordinatorStarted => {
                info!(target: "queuevisor", "[started] capacity={:?}", e.capacity);
            }
            EventKind::StopRequested => {
                info!(target: "queuevisor", "[stop-requested] running={:?}", e.running);
            }
            EventKind::AllStoppedWithin => {
                info!(target: "queuevisor", "[all-stopped]");
            }
            EventKind::StopTimeoutExceeded => {
                warn!(
                    target: "queuevisor",
                    "[stop-timeout] stragglers={:?} timeout_ms={:?}",
                    reason(e),
                    e.timeout_ms
                );
            }
            EventKind::WorkerAdmitted => {
                debug!(target: "queuevisor", "[admitted] worker={} running={:?}", worker(e), e.running);
            }
            EventKind::WorkerRetired => {
                debug!(target: "queuevisor", "[retired] worker={} running={:?}", worker(e), e.running);
            }
            EventKind::WorkerFailed => {
                warn!(
                    target: "queuevisor",
                    "[failed] worker={} reason={:?} running={:?}",
                    worker(e),
                    reason(e),
                    e.running
                );
            }
            EventKind::WorkerPanicked => {
                warn!(target: "queuevisor", "[panicked] worker={} panic={:?}", worker(e), reason(e));
            }
            EventKind::CapacityChanged => {
                info!(target: "queuevisor", "[resized] capacity={:?} running={:?}", e.capacity, e.running);
            }
            EventKind::PauseChanged => {
                info!(target: "queuevisor", "[{}]", reason(e));
            }
            EventKind::QueueActivated => {
                debug!(target: "queuevisor", "[activated]");
            }
            EventKind::MessageRolledBack => {
                debug!(target: "queuevisor", "[rolled-back] worker={}", worker(e));
            }
            EventKind::MessageFailed => {
                debug!(target: "queuevisor", "[message-failed] worker={} reason={:?}", worker(e), reason(e));
            }
            EventKind::SourceError => {
                warn!(
                    target: "queuevisor",
                    "[source-error] worker={} attempt={:?} delay_ms={:?} reason={:?}",
                    worker(e),
                    e.attempt,
                    e.delay_ms,
                    reason(e)
                );
            }
            EventKind::SubscriberOverflow => {
                warn!(target: "queuevisor", "[subscriber-overflow] {}", reason(e));
            }
            EventKind::SubscriberPanicked => {
                warn!(target: "queuevisor", "[subscriber-panicked] {}", reason(e));
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
