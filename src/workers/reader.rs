//! # Reader loop: the per-worker cycle template.
//!
//! [`ReaderLoop`] owns one worker's read → dispatch → retire-check cycle and
//! delegates the transport-specific parts to a [`MessageReader`].
//!
//! ## Cycle (`try_process_one`)
//! ```text
//! paused?  ──yes──► sleep(pause_interval) ──► { did_work: false, should_retire: false }
//!    │no
//! cancelled? ──yes──► Err(Canceled)
//!    │no
//! is_primary = coordinator.is_primary(id)
//! guard = read_throttle(is_primary)           (bypassed for the primary)
//! msg   = reader.read_message(is_primary)     (primary waits, secondary does not)
//! drop(guard)
//!    │
//!    ├─ None ─────────────────────────────────────────────┐
//!    └─ Some(msg)                                         │
//!         before_heavy_work(id)   (give up primary, admit one more worker)
//!         outcome = reader.dispatch(msg)                  │
//!         after_heavy_work(id)    (reclaim primary if vacant)
//!         ├─ Commit   ──► reader.commit(msg)              │
//!         ├─ Rollback ──► reader.on_rollback(msg)         │
//!         └─ Err(e)   ──► reader.on_processing_error(e, msg) ──► Err(e)
//!                                                         ▼
//! should_retire = cancelled || coordinator.is_safe_to_retire(id, did_work)
//! ```

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::core::CoordinatorHandle;
use crate::error::WorkerError;
use crate::events::{Event, EventKind};
use crate::workers::dispatch::Disposition;
use crate::workers::worker::{IterationResult, Worker, WorkerId};

/// # Transport and dispatch hooks of one reader.
///
/// The capability interface a [`ReaderLoop`] drives. Only `read_message` and
/// `dispatch` are required.
#[async_trait]
pub trait MessageReader: Send + Sync + 'static {
    /// Message type produced by `read_message`.
    type Message: Send + Sync + 'static;

    /// Reads at most one message.
    ///
    /// The primary performs a bounded blocking read; a secondary returns at once.
    async fn read_message(
        &self,
        is_primary: bool,
        token: &CancellationToken,
    ) -> Result<Option<Self::Message>, WorkerError>;

    /// Hands the message to the dispatch layer.
    async fn dispatch(
        &self,
        message: &Self::Message,
        token: &CancellationToken,
    ) -> Result<Disposition, WorkerError>;

    /// Completes the unit of work after a successful dispatch.
    async fn commit(
        &self,
        _message: &Self::Message,
        _token: &CancellationToken,
    ) -> Result<(), WorkerError> {
        Ok(())
    }

    /// Compensating hook for a rolled-back unit of work.
    async fn on_rollback(&self, _message: &Self::Message, _token: &CancellationToken) {}

    /// Records a processing failure against the message before the worker terminates.
    async fn on_processing_error(&self, _error: &WorkerError, _message: &Self::Message) {}
}

/// Worker that runs the standard cycle over a [`MessageReader`].
pub struct ReaderLoop<R> {
    id: WorkerId,
    coordinator: CoordinatorHandle,
    reader: R,
}

impl<R: MessageReader> ReaderLoop<R> {
    pub fn new(id: WorkerId, coordinator: CoordinatorHandle, reader: R) -> Self {
        Self {
            id,
            coordinator,
            reader,
        }
    }

    /// Boxes the loop for return from a [`WorkerFactory`](crate::WorkerFactory).
    pub fn boxed(id: WorkerId, coordinator: CoordinatorHandle, reader: R) -> Box<dyn Worker> {
        Box::new(Self::new(id, coordinator, reader))
    }

    /// True if this worker currently holds the primary role.
    pub fn is_primary(&self) -> bool {
        self.coordinator.is_primary(self.id)
    }

    pub fn reader(&self) -> &R {
        &self.reader
    }

    /// Reads one message under the read throttle.
    async fn read(&self, token: &CancellationToken) -> Result<Option<R::Message>, WorkerError> {
        let is_primary = self.is_primary();
        let _guard = self.coordinator.read_throttle(is_primary, token).await?;
        self.reader.read_message(is_primary, token).await
    }

    /// Dispatches one message between the heavy-work notifications.
    async fn process(&self, message: R::Message, token: &CancellationToken) -> Result<(), WorkerError> {
        if let Err(e) = self.coordinator.before_heavy_work(self.id, token) {
            self.reader.on_rollback(&message, token).await;
            return Err(e);
        }
        let outcome = self.reader.dispatch(&message, token).await;
        self.coordinator.after_heavy_work(self.id);

        match outcome {
            Ok(Disposition::Commit) => self.reader.commit(&message, token).await,
            Ok(Disposition::Rollback) => {
                self.reader.on_rollback(&message, token).await;
                self.coordinator
                    .publish(Event::new(EventKind::MessageRolledBack).with_worker(self.id));
                Ok(())
            }
            Err(WorkerError::Canceled) => {
                self.reader.on_rollback(&message, token).await;
                Err(WorkerError::Canceled)
            }
            Err(e) => {
                self.reader.on_processing_error(&e, &message).await;
                self.coordinator.publish(
                    Event::new(EventKind::MessageFailed)
                        .with_worker(self.id)
                        .with_reason(e.to_string()),
                );
                Err(e)
            }
        }
    }
}

#[async_trait]
impl<R: MessageReader> Worker for ReaderLoop<R> {
    fn id(&self) -> WorkerId {
        self.id
    }

    async fn try_process_one(
        &self,
        token: &CancellationToken,
    ) -> Result<IterationResult, WorkerError> {
        if self.coordinator.is_paused() {
            tokio::select! {
                _ = tokio::time::sleep(self.coordinator.pause_interval()) => {}
                _ = token.cancelled() => return Err(WorkerError::Canceled),
            }
            return Ok(IterationResult::IDLE);
        }
        if token.is_cancelled() {
            return Err(WorkerError::Canceled);
        }

        let did_work = match self.read(token).await? {
            Some(message) => {
                self.process(message, token).await?;
                true
            }
            None => false,
        };

        let should_retire =
            token.is_cancelled() || self.coordinator.is_safe_to_retire(self.id, did_work);
        Ok(IterationResult {
            did_work,
            should_retire,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use parking_lot::Mutex;

    use super::*;
    use crate::core::{Coordinator, CoordinatorBuilder, CoordinatorConfig};
    use crate::workers::FactoryFn;

    /// Serves scripted messages and records every hook call.
    struct Scripted {
        inbox: Mutex<VecDeque<u32>>,
        outcome: fn(u32) -> Result<Disposition, WorkerError>,
        log: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn new(inbox: &[u32], outcome: fn(u32) -> Result<Disposition, WorkerError>) -> Self {
            Self {
                inbox: Mutex::new(inbox.iter().copied().collect()),
                outcome,
                log: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl MessageReader for Scripted {
        type Message = u32;

        async fn read_message(
            &self,
            _is_primary: bool,
            _token: &CancellationToken,
        ) -> Result<Option<u32>, WorkerError> {
            Ok(self.inbox.lock().pop_front())
        }

        async fn dispatch(&self, message: &u32, _token: &CancellationToken) -> Result<Disposition, WorkerError> {
            (self.outcome)(*message)
        }

        async fn commit(&self, message: &u32, _token: &CancellationToken) -> Result<(), WorkerError> {
            self.log.lock().push(format!("commit {message}"));
            Ok(())
        }

        async fn on_rollback(&self, message: &u32, _token: &CancellationToken) {
            self.log.lock().push(format!("rollback {message}"));
        }

        async fn on_processing_error(&self, _error: &WorkerError, message: &u32) {
            self.log.lock().push(format!("error {message}"));
        }
    }

    fn idle_coordinator() -> Coordinator {
        let cfg = CoordinatorConfig {
            pause_interval: std::time::Duration::from_millis(50),
            ..CoordinatorConfig::default()
        };
        let factory = FactoryFn::new(|_id: WorkerId, _c: CoordinatorHandle| {
            Err::<Box<dyn Worker>, _>(WorkerError::fatal("not admitted in these tests"))
        });
        CoordinatorBuilder::new(cfg, factory).build().expect("build")
    }

    fn commit_all(_n: u32) -> Result<Disposition, WorkerError> {
        Ok(Disposition::Commit)
    }

    #[tokio::test(start_paused = true)]
    async fn test_paused_cycle_does_not_read() {
        let coord = idle_coordinator();
        coord.set_paused(true);
        let lp = ReaderLoop::new(WorkerId::new(1), coord.handle(), Scripted::new(&[1], commit_all));

        let res = lp.try_process_one(&CancellationToken::new()).await.expect("cycle");
        assert_eq!(res, IterationResult::IDLE);
        assert_eq!(lp.reader().inbox.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_token_fails_fast() {
        let coord = idle_coordinator();
        let lp = ReaderLoop::new(WorkerId::new(1), coord.handle(), Scripted::new(&[1], commit_all));
        let token = CancellationToken::new();
        token.cancel();

        let err = lp.try_process_one(&token).await.expect_err("cancelled");
        assert!(err.is_cancellation());
        assert_eq!(lp.reader().inbox.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_committed_message_counts_as_work() {
        let coord = idle_coordinator();
        let lp = ReaderLoop::new(WorkerId::new(1), coord.handle(), Scripted::new(&[7], commit_all));

        let res = lp.try_process_one(&CancellationToken::new()).await.expect("cycle");
        assert!(res.did_work);
        assert!(!res.should_retire);
        assert_eq!(*lp.reader().log.lock(), vec!["commit 7".to_string()]);
    }

    #[tokio::test]
    async fn test_rollback_runs_hook_and_keeps_worker() {
        let coord = idle_coordinator();
        let mut rx = coord.subscribe();
        let lp = ReaderLoop::new(
            WorkerId::new(1),
            coord.handle(),
            Scripted::new(&[2], |_| Ok(Disposition::Rollback)),
        );

        let res = lp.try_process_one(&CancellationToken::new()).await.expect("cycle");
        assert!(res.did_work);
        assert_eq!(*lp.reader().log.lock(), vec!["rollback 2".to_string()]);
        let ev = rx.recv().await.expect("event");
        assert_eq!(ev.kind, EventKind::MessageRolledBack);
    }

    #[tokio::test]
    async fn test_dispatch_error_runs_hook_and_terminates() {
        let coord = idle_coordinator();
        let lp = ReaderLoop::new(
            WorkerId::new(1),
            coord.handle(),
            Scripted::new(&[3], |n| Err(WorkerError::dispatch_failed(format!("bad {n}")))),
        );

        let err = lp.try_process_one(&CancellationToken::new()).await.expect_err("failed");
        assert!(matches!(err, WorkerError::Dispatch { .. }));
        assert_eq!(*lp.reader().log.lock(), vec!["error 3".to_string()]);
    }

    #[tokio::test]
    async fn test_cancelled_dispatch_is_rolled_back() {
        let coord = idle_coordinator();
        let lp = ReaderLoop::new(
            WorkerId::new(1),
            coord.handle(),
            Scripted::new(&[4], |_| Err(WorkerError::Canceled)),
        );

        let err = lp.try_process_one(&CancellationToken::new()).await.expect_err("cancelled");
        assert!(err.is_cancellation());
        assert_eq!(*lp.reader().log.lock(), vec!["rollback 4".to_string()]);
    }

    #[tokio::test]
    async fn test_empty_read_retires_secondary_but_not_primary() {
        let coord = idle_coordinator();
        let token = CancellationToken::new();

        let secondary = ReaderLoop::new(WorkerId::new(2), coord.handle(), Scripted::new(&[], commit_all));
        let res = secondary.try_process_one(&token).await.expect("cycle");
        assert!(!res.did_work);
        assert!(res.should_retire);

        let handle = coord.handle();
        handle.after_heavy_work(WorkerId::new(1));
        let primary = ReaderLoop::new(WorkerId::new(1), handle, Scripted::new(&[], commit_all));
        assert!(primary.is_primary());
        let res = primary.try_process_one(&token).await.expect("cycle");
        assert_eq!(res, IterationResult::IDLE);
    }
}
