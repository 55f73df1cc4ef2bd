//! # Built-in subscribers
//!
//! Small, self-contained implementations useful for hosts, demos and tests.
//!
//! - [`LiveWorkers`]: set of currently registered worker ids.
//! - [`LogWriter`]: renders events through `tracing` (demo/debug).

mod live;
#[cfg(feature = "logging")]
mod log;

pub use live::LiveWorkers;
#[cfg(feature = "logging")]
pub use log::LogWriter;
