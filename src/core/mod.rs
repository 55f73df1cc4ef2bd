//! Runtime core: admission, primary election and lifecycle.
//!
//! The public entry point is [`Coordinator`], built through
//! [`CoordinatorBuilder`]. Workers see it through a [`CoordinatorHandle`].
//!
//! Internal modules:
//! - `coordinator`: start/stop, admission, resize, primary protocol;
//! - `registry`: worker registry, admission budget and id sequence;
//! - `runner`: outer loop of one worker with panic isolation;
//! - `throttle`: read-permit limiter for secondary readers;
//! - `handle`: worker-facing handle and the queue activator facet;
//! - `config`: coordinator settings.

mod builder;
mod config;
mod coordinator;
mod handle;
mod registry;
mod runner;
mod throttle;

pub use builder::CoordinatorBuilder;
pub use config::{CoordinatorConfig, MAX_CAPACITY};
pub use coordinator::{Coordinator, StopReport};
pub use handle::{CoordinatorHandle, QueueActivator};
pub use throttle::{Throttle, ThrottleGuard};

pub(crate) use runner::panic_message;
