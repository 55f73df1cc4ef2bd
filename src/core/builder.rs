use std::sync::Arc;

use tokio::runtime::Handle as RuntimeHandle;
use tokio::sync::broadcast::error::RecvError;
use tracing::warn;

use crate::{
    core::{CoordinatorConfig, MAX_CAPACITY},
    error::CoordinatorError,
    events::Bus,
    subscribers::{Subscribe, SubscriberSet},
    workers::WorkerFactory,
};
use super::{coordinator::Coordinator, coordinator::Inner, registry::Registry};

/// Builder for constructing a [`Coordinator`].
pub struct CoordinatorBuilder {
    cfg: CoordinatorConfig,
    factory: Arc<dyn WorkerFactory>,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl CoordinatorBuilder {
    /// Creates a new builder with the given configuration and worker factory.
    pub fn new(cfg: CoordinatorConfig, factory: impl WorkerFactory) -> Self {
        Self {
            cfg,
            factory: Arc::new(factory),
            subscribers: Vec::new(),
        }
    }

    /// Same as [`new`](Self::new) for an already shared factory.
    pub fn with_shared_factory(cfg: CoordinatorConfig, factory: Arc<dyn WorkerFactory>) -> Self {
        Self {
            cfg,
            factory,
            subscribers: Vec::new(),
        }
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive coordinator events (admission, retirement, failures,
    /// resize, stop) through dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Builds the coordinator.
    ///
    /// Must be called from within a Tokio runtime: subscriber workers and,
    /// later, pool workers are spawned on it.
    pub fn build(self) -> Result<Coordinator, CoordinatorError> {
        if self.cfg.capacity > MAX_CAPACITY {
            return Err(CoordinatorError::CapacityOutOfRange {
                requested: self.cfg.capacity,
                max: MAX_CAPACITY,
            });
        }
        let runtime =
            RuntimeHandle::try_current().map_err(|_| CoordinatorError::RuntimeUnavailable)?;

        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let subs = Arc::new(SubscriberSet::new(self.subscribers, bus.clone()));
        let inner = Arc::new(Inner::new(
            self.cfg,
            self.factory,
            bus.clone(),
            runtime.clone(),
            Registry::new(),
        ));

        // Bus -> subscriber fan-out, until the coordinator is dropped.
        let mut rx = bus.subscribe();
        let closed = inner.closed();
        runtime.spawn(async move {
            loop {
                tokio::select! {
                    _ = closed.cancelled() => break,
                    res = rx.recv() => match res {
                        Ok(ev) => subs.emit(&ev),
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(skipped, "subscriber listener lagged behind the bus");
                        }
                        Err(RecvError::Closed) => break,
                    },
                }
            }
        });

        Ok(Coordinator::from_inner(inner))
    }
}
