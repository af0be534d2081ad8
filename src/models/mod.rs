//! Run models shared by the executor and environment management.
//!
//! - [`StepExecutionPlan`] - Per-step scope information from the workflow resolver
//! - [`StepRunStatus`] - Terminal status of a step
//! - [`StepRunResult`] - Result of one step
//! - [`BuildRunResults`] - Aggregate of every step result in a build

pub mod plan;
pub mod results;
pub mod status;

pub use plan::StepExecutionPlan;
pub use results::{
    BuildRunResults, StepRunResult, EXIT_ABORTED_WITH_CUSTOM_TIMEOUT,
    EXIT_ABORTED_WITH_NO_OUTPUT_TIMEOUT, EXIT_FAILED, EXIT_SUCCESS,
};
pub use status::StepRunStatus;
