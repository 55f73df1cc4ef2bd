//! # Backoff for repeated source failures.
//!
//! [`BackoffPolicy`] maps a consecutive-failure count to a delay. Growth is linear
//! (`step × failures`), capped at [`BackoffPolicy::max`], then jittered. After
//! `cycle` failures the count wraps and the delay starts again from zero, so a
//! source that stays down for a long time is still probed regularly.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use queuevisor::{BackoffPolicy, JitterPolicy};
//!
//! let backoff = BackoffPolicy {
//!     step: Duration::from_secs(1),
//!     max: Duration::from_secs(10),
//!     cycle: 30,
//!     jitter: JitterPolicy::None,
//! };
//!
//! assert_eq!(backoff.delay(0), Duration::ZERO);
//! assert_eq!(backoff.delay(3), Duration::from_secs(3));
//! assert_eq!(backoff.delay(25), Duration::from_secs(10));
//! assert_eq!(backoff.delay(31), Duration::from_secs(1));
//! ```

use std::time::Duration;

use crate::policies::jitter::JitterPolicy;

/// Linear, capped, cyclic delay policy.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BackoffPolicy {
    /// Delay added per consecutive failure.
    pub step: Duration,
    /// Upper bound before jitter.
    pub max: Duration,
    /// Failure count at which the delay wraps back to zero (`0` = never wraps).
    pub cycle: u32,
    /// Randomization applied to the capped delay.
    pub jitter: JitterPolicy,
}

impl Default for BackoffPolicy {
    /// `step = 1s`, `max = 30s`, `cycle = 30`, no jitter.
    fn default() -> Self {
        Self {
            step: Duration::from_secs(1),
            max: Duration::from_secs(30),
            cycle: 30,
            jitter: JitterPolicy::None,
        }
    }
}

impl BackoffPolicy {
    /// Computes the delay after `failures` consecutive failures.
    pub fn delay(&self, failures: u32) -> Duration {
        let n = match self.cycle {
            0 => failures,
            c => failures % c,
        };
        let base = self.step.checked_mul(n).unwrap_or(self.max).min(self.max);
        self.jitter.apply(base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear(max_secs: u64, cycle: u32) -> BackoffPolicy {
        BackoffPolicy {
            step: Duration::from_millis(100),
            max: Duration::from_secs(max_secs),
            cycle,
            jitter: JitterPolicy::None,
        }
    }

    #[test]
    fn test_grows_linearly() {
        let p = linear(10, 0);
        assert_eq!(p.delay(1), Duration::from_millis(100));
        assert_eq!(p.delay(2), Duration::from_millis(200));
        assert_eq!(p.delay(7), Duration::from_millis(700));
    }

    #[test]
    fn test_clamped_to_max() {
        let p = linear(1, 0);
        assert_eq!(p.delay(50), Duration::from_secs(1));
        assert_eq!(p.delay(u32::MAX), Duration::from_secs(1));
    }

    #[test]
    fn test_wraps_at_cycle() {
        let p = linear(10, 5);
        assert_eq!(p.delay(4), Duration::from_millis(400));
        assert_eq!(p.delay(5), Duration::ZERO);
        assert_eq!(p.delay(6), Duration::from_millis(100));
    }

    #[test]
    fn test_overflowing_step_falls_back_to_max() {
        let p = BackoffPolicy {
            step: Duration::MAX,
            max: Duration::from_secs(3),
            cycle: 0,
            jitter: JitterPolicy::None,
        };
        assert_eq!(p.delay(2), Duration::from_secs(3));
    }
}
