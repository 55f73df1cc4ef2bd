//! Source-error policies.
//!
//! These knobs control **how long** a worker waits after its message source
//! fails, before the failure terminates it.
//!
//! ## Contents
//! - [`BackoffPolicy`] how the delay evolves with consecutive failures (step / max / cycle + jitter)
//! - [`JitterPolicy`]  randomization to avoid readers retrying in lockstep
//! - [`SourceErrorPolicy`] the shared failure counter readers consult
//!
//! ## Quick wiring
//! ```text
//! QueueWorkerFactory { errors: Arc<SourceErrorPolicy> }
//!      └─► QueueReader::read_message on Err:
//!           - errors.handle(err, token) → log (throttled) + sleep(delay)
//!           - return Err → worker terminates, slot returned to the pool
//! ```

mod backoff;
mod jitter;
mod source_error;

pub use backoff::BackoffPolicy;
pub use jitter::JitterPolicy;
pub use source_error::{FailureVerdict, SourceErrorPolicy};
