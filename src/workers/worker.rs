//! # Worker abstraction.
//!
//! A [`Worker`] is one concurrently-running read → dispatch → retire-check loop
//! body. The coordinator only ever sees this object-safe trait: it calls
//! [`Worker::try_process_one`] repeatedly until the returned
//! [`IterationResult`] says the worker may retire, or cancellation fires.
//!
//! Most implementations should not implement `Worker` directly but implement
//! [`MessageReader`](crate::MessageReader) and wrap it in a
//! [`ReaderLoop`](crate::ReaderLoop), which supplies the cycle algorithm.

use std::fmt;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::WorkerError;

/// Identifier of one worker-loop instance.
///
/// Ids start at 1 and grow monotonically within one Start/Stop cycle; the
/// sequence wraps back to 1 at the maximum and skips ids still registered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkerId(u64);

impl WorkerId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker-{}", self.0)
    }
}

/// Result of one worker cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IterationResult {
    /// A message was read (and committed or rolled back) in this cycle.
    pub did_work: bool,
    /// The worker should leave its loop and deregister.
    pub should_retire: bool,
}

impl IterationResult {
    /// Cycle that neither worked nor retires (idle or paused).
    pub const IDLE: IterationResult = IterationResult {
        did_work: false,
        should_retire: false,
    };
}

/// # One cycle of a pool worker.
#[async_trait]
pub trait Worker: Send + Sync + 'static {
    /// Id assigned by the coordinator at admission.
    fn id(&self) -> WorkerId;

    /// Runs one read/dispatch/retire-check cycle.
    ///
    /// `Err(WorkerError::Canceled)` is the orderly exit; any other error
    /// terminates this worker only.
    async fn try_process_one(
        &self,
        token: &CancellationToken,
    ) -> Result<IterationResult, WorkerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_id_display() {
        assert_eq!(WorkerId::new(7).to_string(), "worker-7");
        assert_eq!(WorkerId::new(7).get(), 7);
    }

    #[test]
    fn test_idle_is_default() {
        assert_eq!(IterationResult::IDLE, IterationResult::default());
    }
}
