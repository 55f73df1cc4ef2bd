//! # Worker-facing view of the coordinator.
//!
//! A [`CoordinatorHandle`] is what the [`WorkerFactory`](crate::WorkerFactory)
//! hands to every worker. It exposes the primary/secondary protocol, the read
//! throttle and the retirement check; it cannot start or stop the pool.
//!
//! [`QueueActivator`] is the narrow facet a message source uses to relaunch a
//! listener on a pool that idled down to zero workers.

use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::core::config::CoordinatorConfig;
use crate::core::coordinator::Inner;
use crate::core::throttle::ThrottleGuard;
use crate::error::WorkerError;
use crate::events::Event;
use crate::workers::WorkerId;

/// Relaunches one worker on an idle pool when new work arrives.
pub trait QueueActivator: Send + Sync {
    /// True if the pool is allowed to idle down to zero workers.
    fn is_queue_activation_enabled(&self) -> bool;

    /// Admits one worker if activation is enabled, the pool is started and no
    /// worker is registered. Returns whether a worker was admitted.
    fn activate_queue(&self) -> bool;
}

/// Cloneable handle held by workers.
#[derive(Clone)]
pub struct CoordinatorHandle {
    inner: Arc<Inner>,
}

impl CoordinatorHandle {
    pub(crate) fn new(inner: Arc<Inner>) -> Self {
        Self { inner }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        self.inner.config()
    }

    pub fn is_paused(&self) -> bool {
        self.inner.is_paused()
    }

    pub fn pause_interval(&self) -> Duration {
        self.inner.config().pause_interval
    }

    pub fn is_started(&self) -> bool {
        self.inner.is_started()
    }

    /// True iff `id` currently holds the primary designation.
    pub fn is_primary(&self, id: WorkerId) -> bool {
        self.inner.is_primary(id)
    }

    /// Workers currently registered.
    pub fn running_count(&self) -> usize {
        self.inner.running_count()
    }

    /// Token of the current Start/Stop cycle.
    pub fn token(&self) -> CancellationToken {
        self.inner.cycle_token()
    }

    /// Enters the read throttle for the given role.
    pub async fn read_throttle(
        &self,
        is_primary: bool,
        token: &CancellationToken,
    ) -> Result<ThrottleGuard, WorkerError> {
        self.inner.throttle().enter(is_primary, token).await
    }

    /// Gives up the primary role (if held) and tries to admit a replacement.
    ///
    /// Fails with [`WorkerError::Canceled`] if `token` already fired.
    pub fn before_heavy_work(
        &self,
        id: WorkerId,
        token: &CancellationToken,
    ) -> Result<(), WorkerError> {
        self.inner.release_primary(id);
        if token.is_cancelled() {
            return Err(WorkerError::Canceled);
        }
        self.inner.try_admit_one();
        Ok(())
    }

    /// Claims the primary role if it is vacant.
    pub fn after_heavy_work(&self, id: WorkerId) {
        self.inner.claim_primary(id);
    }

    /// Retirement check run at the end of every cycle.
    pub fn is_safe_to_retire(&self, id: WorkerId, did_work: bool) -> bool {
        self.inner.is_safe_to_retire(id, did_work)
    }

    /// Tries to admit one more worker. Returns whether one was admitted.
    pub fn try_start_worker(&self) -> bool {
        self.inner.try_admit_one()
    }

    /// Publishes an event on the coordinator bus.
    pub fn publish(&self, event: Event) {
        self.inner.publish(event);
    }

    /// Activator that does not keep the coordinator alive.
    pub fn activator(&self) -> Arc<dyn QueueActivator> {
        Arc::new(WeakActivator(Arc::downgrade(&self.inner)))
    }
}

impl QueueActivator for CoordinatorHandle {
    fn is_queue_activation_enabled(&self) -> bool {
        self.inner.config().queue_activation
    }

    fn activate_queue(&self) -> bool {
        self.inner.activate_queue()
    }
}

/// Activator over a weak reference; inert once the coordinator is dropped.
pub(crate) struct WeakActivator(pub(crate) Weak<Inner>);

impl QueueActivator for WeakActivator {
    fn is_queue_activation_enabled(&self) -> bool {
        self.0
            .upgrade()
            .is_some_and(|inner| inner.config().queue_activation)
    }

    fn activate_queue(&self) -> bool {
        self.0.upgrade().is_some_and(|inner| inner.activate_queue())
    }
}
