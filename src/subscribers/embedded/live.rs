//! # LiveWorkers: track currently registered workers
//!
//! Maintains the set of **live** worker ids by listening to admission and exit
//! events. Hosts can show it in status pages; tests use it to observe the pool
//! from the outside.
//!
//! ## Internal scheme
//! ```text
//! on_event(ev):
//!   ├─ WorkerAdmitted                               => insert(id)
//!   ├─ WorkerRetired | WorkerFailed | WorkerPanicked => remove(id), failures += (not Retired)
//!   ├─ CoordinatorStarted                           => clear()
//!   └─ otherwise: ignore
//!
//! snapshot() -> Vec<WorkerId>  (sorted copy of the current set)
//! ```
//!
//! Events are delivered asynchronously, so the set lags the registry slightly.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;
use crate::workers::WorkerId;

/// Tracks the set of currently registered worker ids.
pub struct LiveWorkers {
    inner: RwLock<BTreeSet<WorkerId>>,
    failures: AtomicU64,
    capacity: usize,
}

impl LiveWorkers {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(BTreeSet::new()),
            failures: AtomicU64::new(0),
            capacity: 2048,
        }
    }

    /// Configure the queue capacity for this subscriber.
    #[must_use]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    /// Sorted ids of live workers.
    #[must_use]
    pub fn snapshot(&self) -> Vec<WorkerId> {
        self.inner.read().iter().copied().collect()
    }

    /// Workers that exited with an error or a panic.
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}

impl Default for LiveWorkers {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Subscribe for LiveWorkers {
    async fn on_event(&self, ev: &Event) {
        match ev.kind {
            EventKind::CoordinatorStarted => self.inner.write().clear(),
            EventKind::WorkerAdmitted => {
                if let Some(id) = ev.worker {
                    self.inner.write().insert(id);
                }
            }
            EventKind::WorkerRetired | EventKind::WorkerFailed | EventKind::WorkerPanicked => {
                if ev.kind != EventKind::WorkerRetired {
                    self.failures.fetch_add(1, Ordering::Relaxed);
                }
                if let Some(id) = ev.worker {
                    self.inner.write().remove(&id);
                }
            }
            _ => {}
        }
    }

    fn name(&self) -> &'static str {
        "live-workers"
    }

    fn queue_capacity(&self) -> usize {
        self.capacity
    }
}
