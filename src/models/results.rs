//! Build run results.
//!
//! The executor records every finished step into a [`BuildRunResults`]; the
//! workflow environment manager only reads it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::status::StepRunStatus;

/// Process exit code of a successful build.
pub const EXIT_SUCCESS: i32 = 0;
/// Process exit code of a failed build.
pub const EXIT_FAILED: i32 = 1;
/// Process exit code when a step exceeded its custom timeout.
pub const EXIT_ABORTED_WITH_CUSTOM_TIMEOUT: i32 = 2;
/// Process exit code when a step was aborted for producing no output.
pub const EXIT_ABORTED_WITH_NO_OUTPUT_TIMEOUT: i32 = 3;

/// Result of one step run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRunResult {
    /// Position of the step in the run.
    pub idx: usize,

    /// Display title of the step.
    pub title: String,

    pub status: StepRunStatus,

    /// Process exit code (0 if the process never ran).
    pub exit_code: i32,

    /// Failure detail shown to later steps.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    pub started_at: DateTime<Utc>,
}

impl StepRunResult {
    /// Create a result without an error message.
    pub fn new(idx: usize, title: impl Into<String>, status: StepRunStatus, exit_code: i32) -> Self {
        Self {
            idx,
            title: title.into(),
            status,
            exit_code,
            error_message: None,
            started_at: Utc::now(),
        }
    }

    /// Attach an error message.
    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    /// The error message, falling back to the status reason.
    pub fn failure_reason(&self) -> String {
        self.error_message
            .clone()
            .unwrap_or_else(|| self.status.reason(self.exit_code))
    }
}

/// Aggregate of every step result in a build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRunResults {
    pub workflow_id: String,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub success_steps: Vec<StepRunResult>,
    #[serde(default)]
    pub failed_steps: Vec<StepRunResult>,
    #[serde(default)]
    pub failed_skippable_steps: Vec<StepRunResult>,
    #[serde(default)]
    pub skipped_steps: Vec<StepRunResult>,
}

impl BuildRunResults {
    /// Create empty results for a workflow starting now.
    pub fn new(workflow_id: impl Into<String>) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            start_time: Utc::now(),
            success_steps: Vec::new(),
            failed_steps: Vec::new(),
            failed_skippable_steps: Vec::new(),
            skipped_steps: Vec::new(),
        }
    }

    /// File a step result under its status.
    pub fn record(&mut self, result: StepRunResult) {
        match result.status {
            StepRunStatus::Success => self.success_steps.push(result),
            StepRunStatus::FailedSkippable => self.failed_skippable_steps.push(result),
            StepRunStatus::Skipped | StepRunStatus::SkippedWithRunIf => {
                self.skipped_steps.push(result)
            }
            StepRunStatus::Failed
            | StepRunStatus::PreparationFailed
            | StepRunStatus::AbortedWithCustomTimeout
            | StepRunStatus::AbortedWithNoOutputTimeout => self.failed_steps.push(result),
        }
    }

    /// Whether any step failed.
    pub fn is_build_failed(&self) -> bool {
        !self.failed_steps.is_empty()
    }

    /// Whether any step failed in a skippable way.
    pub fn has_failed_skippable_steps(&self) -> bool {
        !self.failed_skippable_steps.is_empty()
    }

    /// Total number of recorded results.
    pub fn results_count(&self) -> usize {
        self.success_steps.len()
            + self.failed_steps.len()
            + self.failed_skippable_steps.len()
            + self.skipped_steps.len()
    }

    /// Exit code for the whole build.
    ///
    /// A no-output abort takes precedence over a custom timeout, which takes
    /// precedence over an ordinary failure.
    pub fn exit_code(&self) -> i32 {
        if !self.is_build_failed() {
            return EXIT_SUCCESS;
        }
        if self.any_failed_with(StepRunStatus::AbortedWithNoOutputTimeout) {
            return EXIT_ABORTED_WITH_NO_OUTPUT_TIMEOUT;
        }
        if self.any_failed_with(StepRunStatus::AbortedWithCustomTimeout) {
            return EXIT_ABORTED_WITH_CUSTOM_TIMEOUT;
        }
        EXIT_FAILED
    }

    /// All results ordered by step index.
    pub fn ordered_results(&self) -> Vec<&StepRunResult> {
        let mut results: Vec<&StepRunResult> = self
            .success_steps
            .iter()
            .chain(&self.failed_steps)
            .chain(&self.failed_skippable_steps)
            .chain(&self.skipped_steps)
            .collect();
        results.sort_by_key(|result| result.idx);
        results
    }

    fn any_failed_with(&self, status: StepRunStatus) -> bool {
        self.failed_steps.iter().any(|step| step.status == status)
    }
}
