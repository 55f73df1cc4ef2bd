//! # Worker factories.
//!
//! The coordinator builds every worker through a [`WorkerFactory`] it was given
//! at construction. The factory binds a worker id and a [`CoordinatorHandle`]
//! to a concrete message source / dispatch pairing.
//!
//! [`FactoryFn`] wraps a closure, which is handy in tests and small hosts:
//! ```rust
//! use queuevisor::{CoordinatorHandle, FactoryFn, Worker, WorkerError, WorkerId};
//!
//! let factory = FactoryFn::new(|_id: WorkerId, _coord: CoordinatorHandle| {
//!     Err::<Box<dyn Worker>, _>(WorkerError::fatal("not wired yet"))
//! });
//! # let _ = factory;
//! ```

use crate::core::CoordinatorHandle;
use crate::error::WorkerError;
use crate::workers::worker::{Worker, WorkerId};

/// Builds a worker for a newly admitted id.
pub trait WorkerFactory: Send + Sync + 'static {
    /// Creates the worker. An error aborts the admission and returns the slot.
    fn create_worker(
        &self,
        id: WorkerId,
        coordinator: CoordinatorHandle,
    ) -> Result<Box<dyn Worker>, WorkerError>;
}

/// Closure-backed [`WorkerFactory`].
pub struct FactoryFn<F> {
    f: F,
}

impl<F> FactoryFn<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> WorkerFactory for FactoryFn<F>
where
    F: Fn(WorkerId, CoordinatorHandle) -> Result<Box<dyn Worker>, WorkerError>
        + Send
        + Sync
        + 'static,
{
    fn create_worker(
        &self,
        id: WorkerId,
        coordinator: CoordinatorHandle,
    ) -> Result<Box<dyn Worker>, WorkerError> {
        (self.f)(id, coordinator)
    }
}
