//! # queuevisor
//!
//! **Queuevisor** is an elastic consumer pool for message queues.
//!
//! A [`Coordinator`] keeps between zero and `capacity` workers reading from a
//! message source. One worker at a time is the **primary**: it long-polls the
//! source so the pool never misses new work. The moment the primary picks up a
//! message it hands the role over and admits a fresh worker, so the pool grows
//! while there is work and shrinks back as idle secondaries retire.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!                 ┌──────────────────────────────────────────────────────────────┐
//!   start/stop ──►│  Coordinator                                                 │
//!   set_capacity  │  - Registry      (WorkerId → slot, admission budget)         │
//!   set_paused    │  - primary       (AtomicU64, moved only by CAS)              │
//!   activate_queue│  - Throttle      (read permits for secondaries)              │
//!                 │  - Bus           (broadcast events) ──► SubscriberSet        │
//!                 └──────┬───────────────────────┬───────────────────────┬───────┘
//!                        │ WorkerFactory         │                       │
//!                        ▼                       ▼                       ▼
//!                 ┌──────────────┐        ┌──────────────┐        ┌──────────────┐
//!                 │  worker-1    │        │  worker-2    │        │  worker-N    │
//!                 │  (primary)   │        │ (secondary)  │        │ (secondary)  │
//!                 └──────┬───────┘        └──────┬───────┘        └──────┬───────┘
//!                        │ long-poll             │ poll once             │
//!                        ▼                       ▼                       ▼
//!                 ┌──────────────────────────────────────────────────────────────┐
//!                 │  MessageSource ──► Dispatcher ──► commit / rollback          │
//!                 └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ### Worker cycle
//! ```text
//! loop {
//!   ├─► paused?     sleep(pause_interval), next cycle
//!   ├─► cancelled?  exit
//!   ├─► throttle (secondaries only) ─► read one message ─► release permit
//!   ├─► message?
//!   │     ├─ before_heavy_work: give up primary, admit one more worker
//!   │     ├─ dispatch
//!   │     ├─ after_heavy_work: reclaim primary if vacant
//!   │     └─ Commit ─► commit | Rollback ─► rollback | Err ─► record, rollback, exit
//!   └─► is_safe_to_retire?  exit (slot returned to the budget)
//! }
//! ```
//!
//! ## Features
//! | Area              | Description                                                    | Key types / traits                                   |
//! |-------------------|----------------------------------------------------------------|------------------------------------------------------|
//! | **Pool**          | Admission, primary election, resize, start/stop.               | [`Coordinator`], [`CoordinatorBuilder`]              |
//! | **Workers**       | Worker cycle and the hooks a transport implements.            | [`Worker`], [`MessageReader`], [`ReaderLoop`]        |
//! | **Queue readers** | Reader over a message source and a dispatcher.                 | [`MessageSource`], [`Dispatcher`], [`QueueReader`]   |
//! | **Policies**      | Delay and log throttling after source failures.                | [`SourceErrorPolicy`], [`BackoffPolicy`]             |
//! | **Subscriber API**| Hook into pool events (logging, metrics, custom subscribers).   | [`Subscribe`], [`Event`]                             |
//! | **Errors**        | Typed errors for the API and for worker cycles.                | [`CoordinatorError`], [`WorkerError`]                |
//! | **Configuration** | Centralized settings.                                          | [`CoordinatorConfig`]                                |
//!
//! ## Optional features
//! - `logging`: exports the built-in [`LogWriter`] subscriber _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//! use queuevisor::{
//!     CoordinatorBuilder, CoordinatorConfig, DispatchFn, Disposition, LiveWorkers, MemoryQueue,
//!     Message, QueueWorkerFactory, Subscribe, WorkerError, WorkerId,
//! };
//!
//! #[tokio::main(flavor = "multi_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut cfg = CoordinatorConfig::with_capacity(8);
//!     cfg.stop_grace = Duration::ZERO;
//!
//!     let queue = Arc::new(MemoryQueue::new());
//!     let dispatcher = DispatchFn::new(|msg: Message, worker: WorkerId, _ctx: CancellationToken| async move {
//!         println!("{worker} handled #{}", msg.sequence);
//!         Ok::<_, WorkerError>(Disposition::Commit)
//!     });
//!
//!     let live = Arc::new(LiveWorkers::new());
//!     let subs: Vec<Arc<dyn Subscribe>> = vec![live.clone()];
//!     let coordinator = CoordinatorBuilder::new(
//!         cfg,
//!         QueueWorkerFactory::new(Arc::clone(&queue), Arc::new(dispatcher)),
//!     )
//!     .with_subscribers(subs)
//!     .build()?;
//!
//!     coordinator.start(&CancellationToken::new());
//!     for n in 0..10 {
//!         queue.push(Message::new("job", format!("payload {n}")));
//!     }
//!     while queue.committed() < 10 {
//!         tokio::time::sleep(Duration::from_millis(10)).await;
//!     }
//!
//!     let report = coordinator.stop().await;
//!     assert!(report.drained);
//!     Ok(())
//! }
//! ```
mod core;
mod error;
mod events;
mod policies;
mod subscribers;
mod workers;

// ---- Public re-exports ----

pub use crate::core::{
    Coordinator, CoordinatorBuilder, CoordinatorConfig, CoordinatorHandle, MAX_CAPACITY,
    QueueActivator, StopReport, Throttle, ThrottleGuard,
};
pub use error::{CoordinatorError, WorkerError};
pub use events::{Bus, Event, EventKind};
pub use policies::{BackoffPolicy, FailureVerdict, JitterPolicy, SourceErrorPolicy};
pub use subscribers::{LiveWorkers, Subscribe, SubscriberSet};
pub use workers::{
    DispatchFn, Dispatcher, Disposition, FactoryFn, IterationResult, MemoryQueue, Message,
    MessageReader, MessageSource, QueueReader, QueueWorkerFactory, ReaderLoop, Worker,
    WorkerFactory, WorkerId,
};

// Optional: expose a simple built-in logger subscriber (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
