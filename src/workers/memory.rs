//! # In-process message source.
//!
//! [`MemoryQueue`] is a FIFO [`MessageSource`] for tests, demos and hosts that
//! feed the pool from inside the process.
//!
//! - `push` assigns the sequence number and wakes one long-polling reader;
//! - `rollback` puts the message back at the **front**;
//! - `record_failure` counts failures per sequence number;
//! - an optional [`QueueActivator`] is poked on every push, so a pool that
//!   idled down to zero workers is relaunched when work arrives.

use std::collections::VecDeque;
use std::sync::{Arc, OnceLock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::core::QueueActivator;
use crate::error::WorkerError;
use crate::workers::message::Message;
use crate::workers::source::MessageSource;

/// Thread-safe in-memory FIFO queue.
#[derive(Default)]
pub struct MemoryQueue {
    items: Mutex<VecDeque<Message>>,
    notify: Notify,
    next_seq: AtomicU64,
    committed: AtomicU64,
    failures: DashMap<u64, u32>,
    activator: OnceLock<Arc<dyn QueueActivator>>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs the activator poked on every push. Only the first call wins.
    pub fn set_activator(&self, activator: Arc<dyn QueueActivator>) -> bool {
        self.activator.set(activator).is_ok()
    }

    /// Enqueues a message and returns its assigned sequence number.
    pub fn push(&self, mut message: Message) -> u64 {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed) + 1;
        message.sequence = seq;
        self.items.lock().push_back(message);
        self.notify.notify_one();

        if let Some(activator) = self.activator.get() {
            if activator.is_queue_activation_enabled() {
                activator.activate_queue();
            }
        }
        seq
    }

    /// Messages waiting to be read.
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    /// Units of work committed so far.
    pub fn committed(&self) -> u64 {
        self.committed.load(Ordering::Relaxed)
    }

    /// Failures recorded against the given sequence number.
    pub fn failure_count(&self, sequence: u64) -> u32 {
        self.failures.get(&sequence).map(|c| *c).unwrap_or(0)
    }

    fn pop(&self) -> Option<Message> {
        self.items.lock().pop_front()
    }
}

#[async_trait]
impl MessageSource for MemoryQueue {
    type Message = Message;

    async fn receive(
        &self,
        wait: Duration,
        token: &CancellationToken,
    ) -> Result<Option<Message>, WorkerError> {
        let deadline = time::Instant::now() + wait;
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(message) = self.pop() {
                return Ok(Some(message));
            }
            tokio::select! {
                _ = token.cancelled() => return Err(WorkerError::Canceled),
                _ = time::sleep_until(deadline) => return Ok(None),
                _ = &mut notified => {}
            }
        }
    }

    async fn try_receive(&self, token: &CancellationToken) -> Result<Option<Message>, WorkerError> {
        if token.is_cancelled() {
            return Err(WorkerError::Canceled);
        }
        Ok(self.pop())
    }

    async fn commit(&self, _message: &Message) -> Result<(), WorkerError> {
        self.committed.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn rollback(&self, message: &Message) {
        self.items.lock().push_front(message.clone());
        self.notify.notify_one();
    }

    fn record_failure(&self, message: &Message, _error: &WorkerError) {
        *self.failures.entry(message.sequence).or_insert(0) += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fifo_and_sequence_numbers() {
        let q = MemoryQueue::new();
        assert_eq!(q.push(Message::new("a", "1")), 1);
        assert_eq!(q.push(Message::new("b", "2")), 2);

        let token = CancellationToken::new();
        let first = q.try_receive(&token).await.expect("ok").expect("message");
        assert_eq!(first.sequence, 1);
        assert_eq!(&*first.message_type, "a");
        assert_eq!(q.len(), 1);
    }

    #[tokio::test]
    async fn test_rollback_requeues_at_front() {
        let q = MemoryQueue::new();
        q.push(Message::new("a", "1"));
        q.push(Message::new("b", "2"));

        let token = CancellationToken::new();
        let m = q.try_receive(&token).await.expect("ok").expect("message");
        q.rollback(&m).await;

        let again = q.try_receive(&token).await.expect("ok").expect("message");
        assert_eq!(again.sequence, m.sequence);
    }

    #[tokio::test(start_paused = true)]
    async fn test_receive_times_out_empty() {
        let q = MemoryQueue::new();
        let token = CancellationToken::new();
        let res = q.receive(Duration::from_secs(10), &token).await;
        assert_eq!(res, Ok(None));
    }

    #[tokio::test]
    async fn test_receive_wakes_on_push() {
        let q = Arc::new(MemoryQueue::new());
        let token = CancellationToken::new();

        let reader = {
            let q = Arc::clone(&q);
            let token = token.clone();
            tokio::spawn(async move { q.receive(Duration::from_secs(30), &token).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        q.push(Message::new("wake", "x"));

        let got = reader.await.expect("join").expect("ok").expect("message");
        assert_eq!(&*got.message_type, "wake");
    }

    #[tokio::test]
    async fn test_receive_is_cancellable() {
        let q = MemoryQueue::new();
        let token = CancellationToken::new();
        token.cancel();
        let res = q.receive(Duration::from_secs(30), &token).await;
        assert_eq!(res, Err(WorkerError::Canceled));
    }

    #[tokio::test]
    async fn test_failures_are_counted_per_sequence() {
        let q = MemoryQueue::new();
        let seq = q.push(Message::new("a", "1"));
        let token = CancellationToken::new();
        let m = q.try_receive(&token).await.expect("ok").expect("message");

        q.record_failure(&m, &WorkerError::dispatch_failed("boom"));
        q.record_failure(&m, &WorkerError::dispatch_failed("boom"));
        assert_eq!(q.failure_count(seq), 2);
        assert_eq!(q.failure_count(seq + 1), 0);
    }
}
