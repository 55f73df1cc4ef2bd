//! # Coordinator: elastic worker pool with primary election.
//!
//! The [`Coordinator`] owns the admission budget, the worker registry, the
//! primary designation and the read throttle. Workers are built through the
//! injected [`WorkerFactory`] and talk back through a [`CoordinatorHandle`].
//!
//! ## Lifecycle
//! ```text
//! build ──► start(token) ──► ... ──► stop() ──► start(token) ──► ...
//!             │                        │
//!             │                        ├─ cancel cycle token, clear pause
//!             │                        ├─ sleep stop_grace
//!             │                        ├─ wait for this cycle's workers (≤ stop_timeout)
//!             │                        └─ clear registry, zero budget ──► StopReport
//!             ├─ epoch += 1, child token of the caller's token
//!             ├─ id sequence, primary and budget (= capacity) reset
//!             └─ admit the first worker
//! ```
//!
//! ## Pool growth
//! ```text
//! primary reads a message ──► before_heavy_work: release primary, try_admit_one
//!                               └─► new worker claims the vacant primary on entry
//! dispatch done            ──► after_heavy_work: claim primary if still vacant
//! idle secondary           ──► is_safe_to_retire → true → exits, budget += 1
//! ```
//!
//! ## Rules
//! - `running_count() <= capacity()` except right after a capacity decrease,
//!   while excess workers drain (the budget is negative until then).
//! - At most one worker is primary; the designation only moves by CAS.
//! - Without queue activation the primary never retires while idle, so a
//!   started pool with capacity ≥ 1 always has a listener.
//! - Worker failures are logged and published, never returned to callers.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//! use queuevisor::{
//!     CoordinatorBuilder, CoordinatorConfig, DispatchFn, Disposition, MemoryQueue, Message,
//!     QueueWorkerFactory, WorkerError, WorkerId,
//! };
//!
//! #[tokio::main(flavor = "multi_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut cfg = CoordinatorConfig::with_capacity(4);
//!     cfg.stop_grace = Duration::ZERO;
//!
//!     let queue = Arc::new(MemoryQueue::new());
//!     let dispatcher = DispatchFn::new(|_msg: Message, _id: WorkerId, _t: CancellationToken| async {
//!         Ok::<_, WorkerError>(Disposition::Commit)
//!     });
//!     let factory = QueueWorkerFactory::new(Arc::clone(&queue), Arc::new(dispatcher));
//!
//!     let coordinator = CoordinatorBuilder::new(cfg, factory).build()?;
//!     coordinator.start(&CancellationToken::new());
//!     queue.push(Message::new("greeting", "hello"));
//!
//!     let report = coordinator.stop().await;
//!     assert!(report.drained);
//!     Ok(())
//! }
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::RwLock;
use tokio::runtime::Handle as RuntimeHandle;
use tokio::sync::broadcast;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::core::config::{CoordinatorConfig, MAX_CAPACITY};
use crate::core::handle::{CoordinatorHandle, QueueActivator, WeakActivator};
use crate::core::registry::Registry;
use crate::core::runner::{self, WorkerExit};
use crate::core::throttle::Throttle;
use crate::error::CoordinatorError;
use crate::events::{Bus, Event, EventKind};
use crate::workers::{WorkerFactory, WorkerId};

/// Outcome of [`Coordinator::stop`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StopReport {
    /// False if the coordinator was not started.
    pub stopped: bool,
    /// Every worker of the cycle exited before the hard-stop timeout.
    pub drained: bool,
    /// Workers still registered when the timeout fired (abandoned).
    pub stragglers: Vec<WorkerId>,
    /// Time spent inside `stop`.
    pub elapsed: Duration,
}

/// One Start/Stop cycle.
#[derive(Clone)]
struct Cycle {
    epoch: u64,
    token: CancellationToken,
}

/// Shared coordinator state; owned by [`Coordinator`] and every handle.
pub(crate) struct Inner {
    cfg: CoordinatorConfig,
    factory: Arc<dyn WorkerFactory>,
    bus: Bus,
    runtime: RuntimeHandle,
    registry: Registry,
    throttle: Throttle,
    capacity: AtomicUsize,
    started: AtomicBool,
    paused: AtomicBool,
    /// Primary worker id; 0 when vacant.
    primary: AtomicU64,
    cycle: RwLock<Cycle>,
    /// Cancelled on drop; ends the subscriber listener.
    closed: CancellationToken,
}

impl Inner {
    pub(crate) fn new(
        cfg: CoordinatorConfig,
        factory: Arc<dyn WorkerFactory>,
        bus: Bus,
        runtime: RuntimeHandle,
        registry: Registry,
    ) -> Self {
        let throttle = Throttle::new(cfg.max_read_parallelism);
        let capacity = AtomicUsize::new(cfg.capacity);
        let cancelled = CancellationToken::new();
        cancelled.cancel();
        Self {
            cfg,
            factory,
            bus,
            runtime,
            registry,
            throttle,
            capacity,
            started: AtomicBool::new(false),
            paused: AtomicBool::new(false),
            primary: AtomicU64::new(0),
            cycle: RwLock::new(Cycle {
                epoch: 0,
                token: cancelled,
            }),
            closed: CancellationToken::new(),
        }
    }

    pub(crate) fn config(&self) -> &CoordinatorConfig {
        &self.cfg
    }

    pub(crate) fn throttle(&self) -> &Throttle {
        &self.throttle
    }

    pub(crate) fn closed(&self) -> CancellationToken {
        self.closed.clone()
    }

    pub(crate) fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    pub(crate) fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    pub(crate) fn running_count(&self) -> usize {
        self.registry.len()
    }

    pub(crate) fn cycle_token(&self) -> CancellationToken {
        self.cycle.read().token.clone()
    }

    fn epoch(&self) -> u64 {
        self.cycle.read().epoch
    }

    pub(crate) fn publish(&self, event: Event) {
        self.bus.publish(event);
    }

    pub(crate) fn primary(&self) -> Option<WorkerId> {
        match self.primary.load(Ordering::Acquire) {
            0 => None,
            id => Some(WorkerId::new(id)),
        }
    }

    pub(crate) fn is_primary(&self, id: WorkerId) -> bool {
        self.primary.load(Ordering::Acquire) == id.get()
    }

    /// CAS 0 → id.
    pub(crate) fn claim_primary(&self, id: WorkerId) -> bool {
        self.primary
            .compare_exchange(0, id.get(), Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// CAS id → 0.
    pub(crate) fn release_primary(&self, id: WorkerId) -> bool {
        self.primary
            .compare_exchange(id.get(), 0, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn is_safe_to_retire(&self, id: WorkerId, did_work: bool) -> bool {
        if self.registry.budget() < 0 {
            return true;
        }
        if did_work {
            return false;
        }
        !self.is_primary(id) || self.cfg.queue_activation
    }

    fn set_paused(&self, paused: bool) {
        if self.paused.swap(paused, Ordering::AcqRel) != paused {
            debug!(paused, "pause flag changed");
            self.publish(
                Event::new(EventKind::PauseChanged)
                    .with_reason(if paused { "paused" } else { "resumed" }),
            );
        }
    }

    /// Admits one worker if the coordinator is started and budget is left.
    pub(crate) fn try_admit_one(self: &Arc<Self>) -> bool {
        if !self.is_started() || !self.registry.try_reserve() {
            return false;
        }
        let Cycle { epoch, token } = self.cycle.read().clone();
        let id = self.registry.next_id();
        self.registry.insert_pending(id, epoch);

        let handle = CoordinatorHandle::new(Arc::clone(self));
        let worker = match self.factory.create_worker(id, handle.clone()) {
            Ok(worker) => worker,
            Err(e) => {
                self.registry.remove(id, epoch);
                error!(worker = %id, error = %e, label = e.as_label(), "worker factory failed");
                self.publish(
                    Event::new(EventKind::WorkerFailed)
                        .with_worker(id)
                        .with_reason(e.to_string())
                        .with_running(self.running_count()),
                );
                return false;
            }
        };

        self.registry.mark_running(id, epoch);
        let running = self.running_count();
        debug!(worker = %id, running, "worker admitted");
        self.publish(
            Event::new(EventKind::WorkerAdmitted)
                .with_worker(id)
                .with_running(running),
        );

        let inner = Arc::clone(self);
        self.runtime.spawn(async move {
            let exit = runner::run_worker(worker, handle, token).await;
            inner.exit_worker(id, epoch, exit);
        });
        true
    }

    /// Deregisters a worker that left its loop.
    fn exit_worker(&self, id: WorkerId, epoch: u64, exit: WorkerExit) {
        if self.epoch() == epoch {
            self.release_primary(id);
        }
        self.registry.remove(id, epoch);
        let running = self.running_count();

        match exit {
            WorkerExit::Retired => {
                debug!(worker = %id, running, "worker retired");
                self.publish(
                    Event::new(EventKind::WorkerRetired)
                        .with_worker(id)
                        .with_running(running),
                );
            }
            WorkerExit::Failed(e) => {
                error!(worker = %id, error = %e, label = e.as_label(), "worker terminated");
                self.publish(
                    Event::new(EventKind::WorkerFailed)
                        .with_worker(id)
                        .with_reason(e.to_string())
                        .with_running(running),
                );
            }
            WorkerExit::Panicked(msg) => {
                error!(worker = %id, panic = %msg, "worker panicked");
                self.publish(
                    Event::new(EventKind::WorkerPanicked)
                        .with_worker(id)
                        .with_reason(msg)
                        .with_running(running),
                );
            }
        }
    }

    pub(crate) fn activate_queue(self: &Arc<Self>) -> bool {
        if !self.cfg.queue_activation || !self.is_started() || !self.registry.is_empty() {
            return false;
        }
        let admitted = self.try_admit_one();
        if admitted {
            debug!("queue activated");
            self.publish(Event::new(EventKind::QueueActivated));
        }
        admitted
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.closed.cancel();
        self.cycle.get_mut().token.cancel();
    }
}

/// Elastic worker pool over a [`WorkerFactory`].
///
/// Built with [`CoordinatorBuilder`](crate::CoordinatorBuilder); cheap to clone.
#[derive(Clone)]
pub struct Coordinator {
    inner: Arc<Inner>,
}

impl Coordinator {
    pub(crate) fn from_inner(inner: Arc<Inner>) -> Self {
        Self { inner }
    }

    /// Starts a new cycle and admits the first worker.
    ///
    /// Returns `true`, also when already started. The cycle token is a child of
    /// `token`, so cancelling `token` stops every worker of the cycle.
    pub fn start(&self, token: &CancellationToken) -> bool {
        let inner = &self.inner;
        let capacity = {
            let mut cycle = inner.cycle.write();
            if inner
                .started
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                return true;
            }
            cycle.epoch += 1;
            cycle.token = token.child_token();
            inner.primary.store(0, Ordering::Release);
            let capacity = inner.capacity.load(Ordering::Acquire);
            inner.registry.reset(capacity as i64, cycle.epoch);
            capacity
        };

        info!(capacity, "coordinator started");
        inner.publish(Event::new(EventKind::CoordinatorStarted).with_capacity(capacity));
        inner.try_admit_one();
        true
    }

    /// Stops the current cycle and waits for its workers, bounded by `stop_timeout`.
    ///
    /// Workers still running at the timeout are abandoned and listed in the report.
    pub async fn stop(&self) -> StopReport {
        let inner = &self.inner;
        let Cycle { epoch, token } = {
            let cycle = inner.cycle.read();
            if inner
                .started
                .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                return StopReport {
                    drained: true,
                    ..StopReport::default()
                };
            }
            cycle.clone()
        };

        let begun = Instant::now();
        let running = inner.registry.count_in(epoch);
        info!(running, "stop requested");
        inner.publish(Event::new(EventKind::StopRequested).with_running(running));
        token.cancel();
        inner.set_paused(false);

        if let Some(grace) = inner.cfg.grace() {
            time::sleep(grace).await;
        }
        let drained = time::timeout(inner.cfg.stop_timeout, inner.registry.drained(epoch))
            .await
            .is_ok();

        let stragglers = if drained {
            inner.publish(Event::new(EventKind::AllStoppedWithin));
            Vec::new()
        } else {
            let stragglers = inner.registry.ids_in(epoch);
            let listed = stragglers
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(",");
            warn!(
                stragglers = %listed,
                pending = inner.registry.pending_in(epoch),
                timeout_ms = u64::try_from(inner.cfg.stop_timeout.as_millis()).unwrap_or(u64::MAX),
                "stop timeout exceeded, abandoning workers"
            );
            inner.publish(
                Event::new(EventKind::StopTimeoutExceeded)
                    .with_running(stragglers.len())
                    .with_reason(listed)
                    .with_timeout(inner.cfg.stop_timeout),
            );
            stragglers
        };

        inner.registry.clear_epoch(epoch);
        inner.registry.close(epoch);
        StopReport {
            stopped: true,
            drained,
            stragglers,
            elapsed: begun.elapsed(),
        }
    }

    pub fn is_started(&self) -> bool {
        self.inner.is_started()
    }

    pub fn is_paused(&self) -> bool {
        self.inner.is_paused()
    }

    /// While paused, every worker idles instead of reading.
    pub fn set_paused(&self, paused: bool) {
        self.inner.set_paused(paused);
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity.load(Ordering::Acquire)
    }

    /// Resizes the pool.
    ///
    /// The difference is applied to the admission budget, so shrinking lets
    /// excess workers retire at their next check. If no worker is registered,
    /// one is admitted right away.
    pub fn set_capacity(&self, capacity: usize) -> Result<(), CoordinatorError> {
        if capacity > MAX_CAPACITY {
            return Err(CoordinatorError::CapacityOutOfRange {
                requested: capacity,
                max: MAX_CAPACITY,
            });
        }
        let inner = &self.inner;
        let old = inner.capacity.swap(capacity, Ordering::AcqRel);
        let budget = inner.registry.adjust(capacity as i64 - old as i64);
        let running = inner.running_count();

        debug!(old, capacity, budget, running, "capacity changed");
        inner.publish(
            Event::new(EventKind::CapacityChanged)
                .with_capacity(capacity)
                .with_running(running),
        );
        if running == 0 {
            inner.try_admit_one();
        }
        Ok(())
    }

    /// Workers currently registered.
    pub fn running_count(&self) -> usize {
        self.inner.running_count()
    }

    /// Current primary worker, if any.
    pub fn primary(&self) -> Option<WorkerId> {
        self.inner.primary()
    }

    pub fn is_primary(&self, id: WorkerId) -> bool {
        self.inner.is_primary(id)
    }

    pub fn is_queue_activation_enabled(&self) -> bool {
        self.inner.config().queue_activation
    }

    /// Relaunches one listener on an idle pool; see [`QueueActivator`].
    pub fn activate_queue(&self) -> bool {
        self.inner.activate_queue()
    }

    pub fn config(&self) -> &CoordinatorConfig {
        self.inner.config()
    }

    /// Worker-facing handle.
    pub fn handle(&self) -> CoordinatorHandle {
        CoordinatorHandle::new(Arc::clone(&self.inner))
    }

    /// Activator for message sources; does not keep the coordinator alive.
    pub fn activator(&self) -> Arc<dyn QueueActivator> {
        Arc::new(WeakActivator(Arc::downgrade(&self.inner)))
    }

    /// Raw receiver of coordinator events.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.inner.bus.subscribe()
    }
}

impl QueueActivator for Coordinator {
    fn is_queue_activation_enabled(&self) -> bool {
        Coordinator::is_queue_activation_enabled(self)
    }

    fn activate_queue(&self) -> bool {
        Coordinator::activate_queue(self)
    }
}
