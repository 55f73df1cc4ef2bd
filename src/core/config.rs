//! # Coordinator configuration.
//!
//! Provides [`CoordinatorConfig`], the centralized settings of one coordinator.
//!
//! ## Sentinel values
//! - `capacity = 0` → started but idle: no worker is admitted until the capacity grows
//! - `max_read_parallelism <= 2` → exactly one secondary read at a time
//! - `stop_grace = 0s` → no grace sleep before waiting for workers to drain

use std::time::Duration;

/// Largest capacity a coordinator accepts.
pub const MAX_CAPACITY: usize = i32::MAX as usize;

/// Configuration for one coordinator.
///
/// ## Field semantics
/// - `capacity`: maximum number of concurrent workers (mutable at runtime via `set_capacity`)
/// - `max_read_parallelism`: receive calls in flight, primary included
/// - `queue_activation`: allow the pool to idle to zero and rely on `activate_queue`
/// - `pause_interval`: idle sleep of a paused worker per cycle
/// - `stop_grace`: sleep after cancelling, before draining
/// - `stop_timeout`: hard bound on the drain; stragglers are abandoned
/// - `primary_wait`: long-poll bound of the primary reader
/// - `bus_capacity`: event bus ring buffer size (min 1)
#[derive(Clone, Debug)]
pub struct CoordinatorConfig {
    /// Initial pool capacity.
    pub capacity: usize,

    /// Total concurrent receive calls allowed, primary included.
    ///
    /// Secondary readers share `max(max_read_parallelism - 1, 1)` permits.
    pub max_read_parallelism: usize,

    /// Let even the primary retire when idle; wake-up comes from `activate_queue`.
    pub queue_activation: bool,

    /// How long a paused worker sleeps per cycle.
    pub pause_interval: Duration,

    /// Delay between cancellation and draining on stop.
    pub stop_grace: Duration,

    /// Maximum time stop waits for workers to exit.
    pub stop_timeout: Duration,

    /// Upper bound of one primary long-poll, so cancellation is re-checked.
    pub primary_wait: Duration,

    /// Capacity of the event bus broadcast channel.
    pub bus_capacity: usize,
}

impl CoordinatorConfig {
    /// Config with the given capacity and defaults elsewhere.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Returns the grace sleep as an `Option` (`None` when zero).
    #[inline]
    pub fn grace(&self) -> Option<Duration> {
        (!self.stop_grace.is_zero()).then_some(self.stop_grace)
    }
}

impl Default for CoordinatorConfig {
    /// Default configuration:
    ///
    /// - `capacity = 1`
    /// - `max_read_parallelism = 4`
    /// - `queue_activation = false`
    /// - `pause_interval = 1s`, `stop_grace = 1s`, `stop_timeout = 30s`
    /// - `primary_wait = 10s`
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            capacity: 1,
            max_read_parallelism: 4,
            queue_activation: false,
            pause_interval: Duration::from_secs(1),
            stop_grace: Duration::from_secs(1),
            stop_timeout: Duration::from_secs(30),
            primary_wait: Duration::from_secs(10),
            bus_capacity: 1024,
        }
    }
}
