//! Runtime events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to runtime events emitted by the coordinator, the worker
//! loops, the readers and the subscriber workers.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `Coordinator` (lifecycle, admission, resize), worker spawn
//!   wrapper (retire/fail/panic), `ReaderLoop` and `QueueReader` (message and
//!   source events), `SubscriberSet` workers (overflow/panic).
//! - **Consumer**: the event listener spawned by `CoordinatorBuilder::build`, which fans out
//!   to the `SubscriberSet`.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
