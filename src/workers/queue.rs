//! # Queue reader: a [`MessageReader`] over a source and a dispatcher.
//!
//! [`QueueReader`] binds one [`MessageSource`] to one [`Dispatcher`]:
//! - the primary reader long-polls with `primary_wait`; secondaries poll once;
//! - commit/rollback finish the unit of work at the source;
//! - processing failures are recorded at the source, then rolled back;
//! - source failures go through the shared [`SourceErrorPolicy`] before they
//!   terminate the worker.
//!
//! [`QueueWorkerFactory`] is the matching [`WorkerFactory`]: every admitted id
//! gets a [`ReaderLoop`] over a `QueueReader` that shares the same source,
//! dispatcher and error policy.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::core::CoordinatorHandle;
use crate::error::WorkerError;
use crate::events::{Event, EventKind};
use crate::policies::SourceErrorPolicy;
use crate::workers::dispatch::{Dispatcher, Disposition};
use crate::workers::factory::WorkerFactory;
use crate::workers::reader::{MessageReader, ReaderLoop};
use crate::workers::source::MessageSource;
use crate::workers::worker::{Worker, WorkerId};

/// Reader bound to a source/dispatcher pair.
pub struct QueueReader<S, D> {
    id: WorkerId,
    source: Arc<S>,
    dispatcher: Arc<D>,
    errors: Arc<SourceErrorPolicy>,
    primary_wait: Duration,
    coordinator: CoordinatorHandle,
}

impl<S, D> QueueReader<S, D>
where
    S: MessageSource,
    D: Dispatcher<S::Message>,
{
    async fn on_source_error(&self, err: WorkerError, token: &CancellationToken) -> WorkerError {
        match self.errors.handle(&err, token).await {
            Ok(verdict) => {
                self.coordinator.publish(
                    Event::new(EventKind::SourceError)
                        .with_worker(self.id)
                        .with_reason(err.to_string())
                        .with_attempt(verdict.failures)
                        .with_delay(verdict.delay),
                );
                err
            }
            Err(canceled) => canceled,
        }
    }
}

#[async_trait]
impl<S, D> MessageReader for QueueReader<S, D>
where
    S: MessageSource,
    D: Dispatcher<S::Message>,
{
    type Message = S::Message;

    async fn read_message(
        &self,
        is_primary: bool,
        token: &CancellationToken,
    ) -> Result<Option<S::Message>, WorkerError> {
        let res = if is_primary {
            self.source.receive(self.primary_wait, token).await
        } else {
            self.source.try_receive(token).await
        };
        match res {
            Err(e) if !e.is_cancellation() => Err(self.on_source_error(e, token).await),
            other => other,
        }
    }

    async fn dispatch(
        &self,
        message: &S::Message,
        token: &CancellationToken,
    ) -> Result<Disposition, WorkerError> {
        self.dispatcher.dispatch(message, self.id, token).await
    }

    async fn commit(
        &self,
        message: &S::Message,
        _token: &CancellationToken,
    ) -> Result<(), WorkerError> {
        self.source.commit(message).await
    }

    async fn on_rollback(&self, message: &S::Message, _token: &CancellationToken) {
        self.source.rollback(message).await;
    }

    async fn on_processing_error(&self, error: &WorkerError, message: &S::Message) {
        self.source.record_failure(message, error);
        self.source.rollback(message).await;
    }
}

/// [`WorkerFactory`] producing [`QueueReader`] workers.
pub struct QueueWorkerFactory<S, D> {
    source: Arc<S>,
    dispatcher: Arc<D>,
    errors: Arc<SourceErrorPolicy>,
    primary_wait: Option<Duration>,
}

impl<S, D> QueueWorkerFactory<S, D>
where
    S: MessageSource,
    D: Dispatcher<S::Message>,
{
    /// Creates a factory with the default [`SourceErrorPolicy`].
    ///
    /// The primary wait defaults to the coordinator's `primary_wait`.
    pub fn new(source: Arc<S>, dispatcher: Arc<D>) -> Self {
        Self {
            source,
            dispatcher,
            errors: Arc::new(SourceErrorPolicy::default()),
            primary_wait: None,
        }
    }

    pub fn with_error_policy(mut self, errors: SourceErrorPolicy) -> Self {
        self.errors = Arc::new(errors);
        self
    }

    /// Overrides the primary long-poll timeout for readers of this factory.
    pub fn with_primary_wait(mut self, wait: Duration) -> Self {
        self.primary_wait = Some(wait);
        self
    }

    pub fn source(&self) -> &Arc<S> {
        &self.source
    }
}

impl<S, D> WorkerFactory for QueueWorkerFactory<S, D>
where
    S: MessageSource,
    D: Dispatcher<S::Message>,
{
    fn create_worker(
        &self,
        id: WorkerId,
        coordinator: CoordinatorHandle,
    ) -> Result<Box<dyn Worker>, WorkerError> {
        let reader = QueueReader {
            id,
            source: Arc::clone(&self.source),
            dispatcher: Arc::clone(&self.dispatcher),
            errors: Arc::clone(&self.errors),
            primary_wait: self
                .primary_wait
                .unwrap_or_else(|| coordinator.config().primary_wait),
            coordinator: coordinator.clone(),
        };
        Ok(ReaderLoop::boxed(id, coordinator, reader))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Coordinator, CoordinatorBuilder, CoordinatorConfig};
    use crate::policies::BackoffPolicy;
    use crate::workers::{DispatchFn, FactoryFn, MemoryQueue, Message};

    fn idle_coordinator() -> Coordinator {
        let factory = FactoryFn::new(|_id: WorkerId, _c: CoordinatorHandle| {
            Err::<Box<dyn Worker>, _>(WorkerError::fatal("not admitted in these tests"))
        });
        CoordinatorBuilder::new(CoordinatorConfig::default(), factory)
            .build()
            .expect("build")
    }

    async fn reject(
        msg: Message,
        _id: WorkerId,
        _t: CancellationToken,
    ) -> Result<Disposition, WorkerError> {
        match msg.body_str() {
            Some("bad") => Err(WorkerError::dispatch_failed("rejected")),
            _ => Ok(Disposition::Commit),
        }
    }

    /// Source that is always down.
    struct Down;

    #[async_trait]
    impl MessageSource for Down {
        type Message = Message;

        async fn receive(
            &self,
            _wait: Duration,
            _token: &CancellationToken,
        ) -> Result<Option<Message>, WorkerError> {
            Err(WorkerError::source_failed("connection refused"))
        }

        async fn try_receive(&self, _token: &CancellationToken) -> Result<Option<Message>, WorkerError> {
            Err(WorkerError::source_failed("connection refused"))
        }
    }

    #[tokio::test]
    async fn test_commit_reaches_the_source() {
        let coord = idle_coordinator();
        let queue = Arc::new(MemoryQueue::new());
        queue.push(Message::new("job", "ok"));
        let factory = QueueWorkerFactory::new(Arc::clone(&queue), Arc::new(DispatchFn::new(reject)));

        let worker = factory.create_worker(WorkerId::new(1), coord.handle()).expect("worker");
        let res = worker.try_process_one(&CancellationToken::new()).await.expect("cycle");
        assert!(res.did_work);
        assert_eq!(queue.committed(), 1);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_failed_dispatch_is_recorded_and_requeued() {
        let coord = idle_coordinator();
        let queue = Arc::new(MemoryQueue::new());
        let seq = queue.push(Message::new("job", "bad"));
        let factory = QueueWorkerFactory::new(Arc::clone(&queue), Arc::new(DispatchFn::new(reject)));

        let worker = factory.create_worker(WorkerId::new(1), coord.handle()).expect("worker");
        let err = worker
            .try_process_one(&CancellationToken::new())
            .await
            .expect_err("dispatch failed");
        assert!(matches!(err, WorkerError::Dispatch { .. }));
        assert_eq!(queue.failure_count(seq), 1);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.committed(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_source_error_waits_out_the_policy() {
        let coord = idle_coordinator();
        let mut rx = coord.subscribe();
        let policy = SourceErrorPolicy::new(BackoffPolicy {
            step: Duration::from_millis(200),
            ..BackoffPolicy::default()
        });
        let factory = QueueWorkerFactory::new(Arc::new(Down), Arc::new(DispatchFn::new(reject)))
            .with_error_policy(policy);

        let worker = factory.create_worker(WorkerId::new(1), coord.handle()).expect("worker");
        let started = tokio::time::Instant::now();
        let err = worker
            .try_process_one(&CancellationToken::new())
            .await
            .expect_err("source down");
        assert!(matches!(err, WorkerError::Source { .. }));
        assert!(started.elapsed() >= Duration::from_millis(200));

        let ev = rx.recv().await.expect("event");
        assert_eq!(ev.kind, EventKind::SourceError);
        assert_eq!(ev.attempt, Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_source_error_delay_is_cancellable() {
        let coord = idle_coordinator();
        let factory = QueueWorkerFactory::new(Arc::new(Down), Arc::new(DispatchFn::new(reject)));
        let worker = factory.create_worker(WorkerId::new(1), coord.handle()).expect("worker");

        let token = CancellationToken::new();
        let cancel = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            cancel.cancel();
        });
        let err = worker.try_process_one(&token).await.expect_err("cancelled");
        assert!(err.is_cancellation());
    }

    #[tokio::test]
    async fn test_primary_wait_override() {
        let coord = idle_coordinator();
        let queue = Arc::new(MemoryQueue::new());
        let factory = QueueWorkerFactory::new(Arc::clone(&queue), Arc::new(DispatchFn::new(reject)))
            .with_primary_wait(Duration::from_millis(5));
        assert_eq!(coord.config().primary_wait, Duration::from_secs(10));

        let handle = coord.handle();
        handle.after_heavy_work(WorkerId::new(1));
        let worker = factory.create_worker(WorkerId::new(1), handle).expect("worker");
        let res = tokio::time::timeout(Duration::from_secs(1), worker.try_process_one(&CancellationToken::new()))
            .await
            .expect("primary wait bounded by the override")
            .expect("cycle");
        assert_eq!(res, crate::workers::IterationResult::IDLE);
    }
}
