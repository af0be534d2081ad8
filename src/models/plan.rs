//! Step execution plans.

use serde::{Deserialize, Serialize};

use crate::env::EnvironmentItem;

/// What the workflow model resolver hands over for each step.
///
/// Only the step bundle scope matters to environment management: steps
/// sharing a non-empty `step_bundle_uuid` run in the same bundle scope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepExecutionPlan {
    /// Unique id of the step within the run.
    #[serde(default)]
    pub uuid: String,

    /// Bundle the step belongs to; empty for bare workflow steps.
    #[serde(default)]
    pub step_bundle_uuid: String,

    /// Environment declared by the bundle.
    #[serde(default)]
    pub step_bundle_envs: Vec<EnvironmentItem>,
}

impl StepExecutionPlan {
    /// Plan for a step outside of any bundle.
    pub fn workflow_step(uuid: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            ..Default::default()
        }
    }

    /// Plan for a step inside a bundle.
    pub fn bundle_step(
        uuid: impl Into<String>,
        step_bundle_uuid: impl Into<String>,
        step_bundle_envs: Vec<EnvironmentItem>,
    ) -> Self {
        Self {
            uuid: uuid.into(),
            step_bundle_uuid: step_bundle_uuid.into(),
            step_bundle_envs,
        }
    }

    /// Whether the step runs inside a bundle.
    pub fn in_bundle(&self) -> bool {
        !self.step_bundle_uuid.is_empty()
    }
}
