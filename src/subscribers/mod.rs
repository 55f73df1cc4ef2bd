//! # Event subscribers for the coordinator.
//!
//! This module provides the [`Subscribe`] trait, the [`SubscriberSet`] fan-out
//! and built-in implementations for handling events published on the
//! [`Bus`](crate::events::Bus).
//!
//! ## Architecture
//! ```text
//! Coordinator / workers ── publish(Event) ──► Bus ──► listener ──► SubscriberSet::emit
//!                                                                   │
//!                                                       ┌───────────┼───────────┐
//!                                                       ▼           ▼           ▼
//!                                                   LogWriter  LiveWorkers   Custom ...
//! ```
//!
//! ## Built-ins
//! - [`LiveWorkers`]: stateful; tracks registered worker ids from lifecycle events.
//! - [`LogWriter`] (feature `logging`): renders events through `tracing`.

mod embedded;
mod subscribe;
mod subscriber_set;

#[cfg(feature = "logging")]
pub use embedded::LogWriter;
pub use embedded::LiveWorkers;
pub use subscribe::Subscribe;
pub use subscriber_set::SubscriberSet;
