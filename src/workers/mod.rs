//! # Worker abstractions and the bundled queue reader.
//!
//! This module provides the worker-side types:
//! - [`Worker`] - object-safe single-cycle trait the coordinator drives
//! - [`WorkerFactory`] / [`FactoryFn`] - how the coordinator builds workers
//! - [`MessageReader`] / [`ReaderLoop`] - capability hooks and the cycle template
//! - [`MessageSource`], [`Dispatcher`] / [`DispatchFn`], [`Disposition`] - transport and dispatch boundaries
//! - [`QueueReader`] / [`QueueWorkerFactory`] - reader over a source + dispatcher
//! - [`Message`] / [`MemoryQueue`] - in-process source

mod dispatch;
mod factory;
mod memory;
mod message;
mod queue;
mod reader;
mod source;
mod worker;

pub use dispatch::{DispatchFn, Dispatcher, Disposition};
pub use factory::{FactoryFn, WorkerFactory};
pub use memory::MemoryQueue;
pub use message::Message;
pub use queue::{QueueReader, QueueWorkerFactory};
pub use reader::{MessageReader, ReaderLoop};
pub use source::MessageSource;
pub use worker::{IterationResult, Worker, WorkerId};
