//! # Outer run loop of one worker.
//!
//! Drives a [`Worker`] cycle after cycle and turns the way it ended into a
//! [`WorkerExit`]. The coordinator's spawn wrapper then deregisters the worker
//! and returns its admission slot, whatever the exit kind.
//!
//! ```text
//! claim primary (CAS 0 → id, only if vacant)
//! loop:
//!   try_process_one(token)
//!     ├─ Ok { should_retire: true } ──► Retired
//!     ├─ Ok { .. }                  ──► yield_now, next cycle
//!     ├─ Err(Canceled)              ──► Retired
//!     └─ Err(e)                     ──► Failed(e)
//! panic anywhere above              ──► Panicked(message)
//! ```
//!
//! ## Rules
//! - The scheduler is yielded between cycles so a hot worker cannot starve the
//!   runtime threads.
//! - Cancellation is an orderly exit and never reported as a failure.
//! - The primary role is released by the caller, which also runs on panic.

use std::any::Any;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tokio_util::sync::CancellationToken;

use crate::core::handle::CoordinatorHandle;
use crate::error::WorkerError;
use crate::workers::Worker;

/// How a worker loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum WorkerExit {
    /// Retired on its own or cancelled.
    Retired,
    /// Terminated by a non-cancellation error.
    Failed(WorkerError),
    /// Panicked; carries the panic message.
    Panicked(String),
}

/// Runs `worker` until it retires, fails, panics or `token` fires.
pub(crate) async fn run_worker(
    worker: Box<dyn Worker>,
    coordinator: CoordinatorHandle,
    token: CancellationToken,
) -> WorkerExit {
    let id = worker.id();
    coordinator.after_heavy_work(id);

    let cycles = async {
        loop {
            match worker.try_process_one(&token).await {
                Ok(res) if res.should_retire => return Ok(()),
                Ok(_) => tokio::task::yield_now().await,
                Err(e) => return Err(e),
            }
        }
    };

    match AssertUnwindSafe(cycles).catch_unwind().await {
        Ok(Ok(())) => WorkerExit::Retired,
        Ok(Err(e)) if e.is_cancellation() => WorkerExit::Retired,
        Ok(Err(e)) => WorkerExit::Failed(e),
        Err(panic) => WorkerExit::Panicked(panic_message(&*panic)),
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message_downcasts() {
        let s: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(&*s), "static");

        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(&*owned), "owned");

        let other: Box<dyn Any + Send> = Box::new(42_u8);
        assert_eq!(panic_message(&*other), "unknown panic");
    }
}
