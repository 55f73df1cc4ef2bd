//! # Dispatch boundary.
//!
//! The engine does not interpret messages. It hands each one to a
//! [`Dispatcher`] and acts on the returned [`Disposition`]:
//! - `Commit` → the unit of work is completed at the source;
//! - `Rollback` → the source is asked to put the message back;
//! - `Err(_)` → failure is recorded against the message, the unit of work is
//!   rolled back and the worker that read it terminates.
//!
//! ## Example
//! ```rust
//! use tokio_util::sync::CancellationToken;
//! use queuevisor::{DispatchFn, Disposition, Message, WorkerError, WorkerId};
//!
//! let dispatcher = DispatchFn::new(|msg: Message, _worker: WorkerId, _ctx: CancellationToken| async move {
//!     if msg.body.is_empty() {
//!         return Ok::<_, WorkerError>(Disposition::Rollback);
//!     }
//!     Ok(Disposition::Commit)
//! });
//! # let _ = dispatcher;
//! ```

use std::future::Future;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::WorkerError;
use crate::workers::worker::WorkerId;

/// What should happen to the unit of work after dispatch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Disposition {
    /// Complete the unit of work.
    #[default]
    Commit,
    /// Abandon the unit of work; the message returns to the source.
    Rollback,
}

impl Disposition {
    pub fn is_rollback(&self) -> bool {
        matches!(self, Disposition::Rollback)
    }
}

/// # Business-logic entry point for one message.
#[async_trait]
pub trait Dispatcher<M: Send + Sync + 'static>: Send + Sync + 'static {
    /// Processes one message on behalf of `worker`.
    async fn dispatch(
        &self,
        message: &M,
        worker: WorkerId,
        token: &CancellationToken,
    ) -> Result<Disposition, WorkerError>;
}

/// Closure-backed [`Dispatcher`].
///
/// The closure receives an owned clone of the message so it can build a
/// `'static` future.
#[derive(Debug)]
pub struct DispatchFn<F> {
    f: F,
}

impl<F> DispatchFn<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<M, F, Fut> Dispatcher<M> for DispatchFn<F>
where
    M: Clone + Send + Sync + 'static,
    F: Fn(M, WorkerId, CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Disposition, WorkerError>> + Send + 'static,
{
    async fn dispatch(
        &self,
        message: &M,
        worker: WorkerId,
        token: &CancellationToken,
    ) -> Result<Disposition, WorkerError> {
        (self.f)(message.clone(), worker, token.clone()).await
    }
}
