//! Step process execution.
//!
//! - [`TimeoutCommand`] - Runs a step process with hang detection, timeout and redaction
//! - [`SharedWriter`] - Serializes output pumped from several threads

pub mod shared;
pub mod timeout;

pub use shared::SharedWriter;
pub use timeout::{CommandOutcome, TimeoutCommand, DEFAULT_KILL_GRACE_PERIOD};
