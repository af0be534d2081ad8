//! Step run status codes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Terminal status of a single step run.
///
/// The numeric codes are stable and are what gets persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepRunStatus {
    Success,
    Failed,
    FailedSkippable,
    Skipped,
    SkippedWithRunIf,
    PreparationFailed,
    /// Killed after exceeding the step's own timeout.
    AbortedWithCustomTimeout,
    /// Killed after producing no output for too long.
    #[serde(rename = "aborted_with_no_output")]
    AbortedWithNoOutputTimeout,
}

impl StepRunStatus {
    /// Numeric status code.
    pub fn code(self) -> i32 {
        match self {
            StepRunStatus::Success => 0,
            StepRunStatus::Failed => 1,
            StepRunStatus::FailedSkippable => 2,
            StepRunStatus::Skipped => 3,
            StepRunStatus::SkippedWithRunIf => 4,
            StepRunStatus::PreparationFailed => 5,
            StepRunStatus::AbortedWithCustomTimeout => 7,
            StepRunStatus::AbortedWithNoOutputTimeout => 8,
        }
    }

    /// Status for a numeric code.
    pub fn from_code(code: i32) -> Option<Self> {
        Some(match code {
            0 => StepRunStatus::Success,
            1 => StepRunStatus::Failed,
            2 => StepRunStatus::FailedSkippable,
            3 => StepRunStatus::Skipped,
            4 => StepRunStatus::SkippedWithRunIf,
            5 => StepRunStatus::PreparationFailed,
            7 => StepRunStatus::AbortedWithCustomTimeout,
            8 => StepRunStatus::AbortedWithNoOutputTimeout,
            _ => return None,
        })
    }

    /// Machine-readable name.
    pub fn as_str(self) -> &'static str {
        match self {
            StepRunStatus::Success => "success",
            StepRunStatus::Failed => "failed",
            StepRunStatus::FailedSkippable => "failed_skippable",
            StepRunStatus::Skipped => "skipped",
            StepRunStatus::SkippedWithRunIf => "skipped_with_run_if",
            StepRunStatus::PreparationFailed => "preparation_failed",
            StepRunStatus::AbortedWithCustomTimeout => "aborted_with_custom_timeout",
            StepRunStatus::AbortedWithNoOutputTimeout => "aborted_with_no_output",
        }
    }

    /// Parse a machine-readable name.
    pub fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "success" => StepRunStatus::Success,
            "failed" => StepRunStatus::Failed,
            "failed_skippable" => StepRunStatus::FailedSkippable,
            "skipped" => StepRunStatus::Skipped,
            "skipped_with_run_if" => StepRunStatus::SkippedWithRunIf,
            "preparation_failed" => StepRunStatus::PreparationFailed,
            "aborted_with_custom_timeout" => StepRunStatus::AbortedWithCustomTimeout,
            "aborted_with_no_output" => StepRunStatus::AbortedWithNoOutputTimeout,
            _ => return None,
        })
    }

    /// Whether the run counts as a build failure.
    pub fn is_failure(self) -> bool {
        matches!(
            self,
            StepRunStatus::Failed
                | StepRunStatus::PreparationFailed
                | StepRunStatus::AbortedWithCustomTimeout
                | StepRunStatus::AbortedWithNoOutputTimeout
        )
    }

    /// Human-readable reason for the status, given the process exit code.
    pub fn reason(self, exit_code: i32) -> String {
        match self {
            StepRunStatus::Success | StepRunStatus::Skipped | StepRunStatus::SkippedWithRunIf => {
                String::new()
            }
            StepRunStatus::Failed
            | StepRunStatus::PreparationFailed
            | StepRunStatus::FailedSkippable => format!("exit code: {}", exit_code),
            StepRunStatus::AbortedWithCustomTimeout => "timed out".to_string(),
            StepRunStatus::AbortedWithNoOutputTimeout => "timed out due to no output".to_string(),
        }
    }
}

impl fmt::Display for StepRunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
