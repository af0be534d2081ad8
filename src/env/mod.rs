//! Environment declarations and their scoping across a workflow run.
//!
//! - [`EnvironmentItem`] - A single `KEY: value` declaration with options
//! - [`expand`] - `$VAR` / `${VAR}` expansion
//! - [`resolve_declarations`] - Ordered resolution of declarations into an [`Environment`]
//! - [`WorkflowEnvManager`] - Workflow, bundle and secret scopes of a run

pub mod declaration;
pub mod expand;
pub mod item;
pub mod manager;
pub mod status;

pub use declaration::{
    replay, resolve_declarations, DeclarationCommand, DeclarationSideEffects, Environment,
    EnvironmentSource, ProcessEnvironment, Variable,
};
pub use expand::expand;
pub use item::{EnvironmentItem, EnvironmentItemOptions, OPTIONS_KEY};
pub use manager::WorkflowEnvManager;
pub use status::{
    build_status_envs, failed_step_envs, triggered_workflow_envs, BUILD_STATUS_ENV_KEY,
    ENVSTORE_PATH_ENV_KEY, FAILED_STEP_ERROR_MESSAGE_ENV_KEY, FAILED_STEP_TITLE_ENV_KEY,
    FORMATTED_OUTPUT_PATH_ENV_KEY, STEPLIB_BUILD_STATUS_ENV_KEY, TRIGGERED_WORKFLOW_ID_ENV_KEY,
    TRIGGERED_WORKFLOW_TITLE_ENV_KEY,
};
