//! Environment variables describing the state of a run.

use super::item::{EnvironmentItem, EnvironmentItemOptions};
use crate::models::StepRunResult;

/// Build status, `"0"` while passing, `"1"` once failed.
pub const BUILD_STATUS_ENV_KEY: &str = "RUNWAY_BUILD_STATUS";
/// Build status mirror for step libraries.
pub const STEPLIB_BUILD_STATUS_ENV_KEY: &str = "STEPLIB_BUILD_STATUS";
/// Title of the step that failed the build.
pub const FAILED_STEP_TITLE_ENV_KEY: &str = "RUNWAY_FAILED_STEP_TITLE";
/// Error message of the step that failed the build.
pub const FAILED_STEP_ERROR_MESSAGE_ENV_KEY: &str = "RUNWAY_FAILED_STEP_ERROR_MESSAGE";
/// Id of the workflow the run was started with.
pub const TRIGGERED_WORKFLOW_ID_ENV_KEY: &str = "RUNWAY_TRIGGERED_WORKFLOW_ID";
/// Title of the workflow the run was started with.
pub const TRIGGERED_WORKFLOW_TITLE_ENV_KEY: &str = "RUNWAY_TRIGGERED_WORKFLOW_TITLE";
/// Where steps store their exported envs.
pub const ENVSTORE_PATH_ENV_KEY: &str = "RUNWAY_ENVSTORE_PATH";
/// Where steps write formatted output.
pub const FORMATTED_OUTPUT_PATH_ENV_KEY: &str = "RUNWAY_STEP_FORMATTED_OUTPUT_FILE_PATH";

/// Build status envs for a passing or failed build.
pub fn build_status_envs(failed: bool) -> Vec<EnvironmentItem> {
    let status = if failed { "1" } else { "0" };
    vec![
        EnvironmentItem::new(BUILD_STATUS_ENV_KEY, status),
        EnvironmentItem::new(STEPLIB_BUILD_STATUS_ENV_KEY, status),
    ]
}

/// Envs describing the step that failed the build.
///
/// Values are never expanded: an error message may contain `$`.
pub fn failed_step_envs(result: &StepRunResult) -> Vec<EnvironmentItem> {
    let literal = EnvironmentItemOptions {
        is_expand: Some(false),
        ..Default::default()
    };
    vec![
        EnvironmentItem::new(FAILED_STEP_TITLE_ENV_KEY, result.title.clone())
            .with_options(literal.clone()),
        EnvironmentItem::new(FAILED_STEP_ERROR_MESSAGE_ENV_KEY, result.failure_reason())
            .with_options(literal),
    ]
}

/// Envs identifying the workflow a run was started with.
pub fn triggered_workflow_envs(workflow_id: &str, workflow_title: &str) -> Vec<EnvironmentItem> {
    vec![
        EnvironmentItem::new(TRIGGERED_WORKFLOW_ID_ENV_KEY, workflow_id),
        EnvironmentItem::new(TRIGGERED_WORKFLOW_TITLE_ENV_KEY, workflow_title),
    ]
}
