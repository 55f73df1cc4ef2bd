//! # Message source boundary.
//!
//! A [`MessageSource`] is the transport a [`QueueReader`](crate::QueueReader)
//! pulls from. It offers two receive modes:
//! - [`receive`](MessageSource::receive): long-poll used by the **primary** reader,
//!   bounded by `wait` so the caller re-checks cancellation periodically;
//! - [`try_receive`](MessageSource::try_receive): immediate return used by
//!   **secondary** readers.
//!
//! Received messages form a unit of work that the reader later finishes with
//! exactly one of [`commit`](MessageSource::commit) or
//! [`rollback`](MessageSource::rollback). How that is made atomic is up to the
//! transport.

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::WorkerError;

/// # Transport a queue reader pulls messages from.
#[async_trait]
pub trait MessageSource: Send + Sync + 'static {
    /// Message type produced by this source.
    type Message: Send + Sync + 'static;

    /// Waits up to `wait` for one message.
    ///
    /// Returns `Ok(None)` on timeout and `Err(Canceled)` if `token` fires.
    async fn receive(
        &self,
        wait: Duration,
        token: &CancellationToken,
    ) -> Result<Option<Self::Message>, WorkerError>;

    /// Returns one message if immediately available.
    async fn try_receive(
        &self,
        token: &CancellationToken,
    ) -> Result<Option<Self::Message>, WorkerError>;

    /// Completes the unit of work for `message`.
    async fn commit(&self, _message: &Self::Message) -> Result<(), WorkerError> {
        Ok(())
    }

    /// Abandons the unit of work; the message becomes available again.
    async fn rollback(&self, _message: &Self::Message) {}

    /// Remembers that processing `message` failed, keyed by its identity.
    fn record_failure(&self, _message: &Self::Message, _error: &WorkerError) {}
}
