//! Step execution orchestration.

pub mod workflow;

pub use workflow::{RunProgress, StepRunner, StepSpec};
