//! Workflow environment scoping.
//!
//! [`WorkflowEnvManager`] owns the environment declarations of a running
//! workflow. Declarations are layered in three scopes:
//!
//! - secrets, fixed at construction
//! - workflow envs, appended to for the lifetime of the run
//! - step bundle envs, a copy of the workflow envs plus the bundle's own
//!   declarations, rebuilt whenever execution enters a different bundle and
//!   dropped when execution leaves bundle scope
//!
//! Every accessor returns a fresh copy; callers may mutate what they get.
//! The manager is driven by the single workflow execution thread.

use tracing::{debug, info};

use super::item::EnvironmentItem;
use super::status::{build_status_envs, failed_step_envs, triggered_workflow_envs};
use crate::models::{BuildRunResults, StepExecutionPlan};

/// Tracks the declarations visible to each step of a workflow run.
///
/// # Example
///
/// ```
/// use runway::env::{EnvironmentItem, WorkflowEnvManager};
/// use runway::models::StepExecutionPlan;
///
/// let mut manager = WorkflowEnvManager::new(
///     vec![],
///     &[],
///     &[],
///     "primary",
///     "Primary",
///     &[EnvironmentItem::new("CI", "true")],
/// );
///
/// let plan = StepExecutionPlan::bundle_step(
///     "step-1",
///     "b1",
///     vec![EnvironmentItem::new("GREETING", "Hello")],
/// );
/// let envs = manager.envs_for_step_start(&plan);
/// assert!(envs.contains(&EnvironmentItem::new("GREETING", "Hello")));
/// assert!(envs.contains(&EnvironmentItem::new("CI", "true")));
///
/// let envs = manager.envs_for_step_start(&StepExecutionPlan::workflow_step("step-2"));
/// assert!(!envs.contains(&EnvironmentItem::new("GREETING", "Hello")));
/// ```
#[derive(Debug, Clone)]
pub struct WorkflowEnvManager {
    secrets: Vec<EnvironmentItem>,
    workflow_envs: Vec<EnvironmentItem>,
    step_bundle_envs: Vec<EnvironmentItem>,
    current_step_bundle_uuid: String,
    build_failed: bool,
}

impl WorkflowEnvManager {
    /// Create the manager for one workflow run.
    ///
    /// The initial workflow scope is, in order (later entries win when
    /// materialized): `runtime_envs`, `secrets`, `app_envs`, passing build
    /// status envs, triggered workflow id/title, `workflow_envs`.
    pub fn new(
        runtime_envs: Vec<EnvironmentItem>,
        secrets: &[EnvironmentItem],
        app_envs: &[EnvironmentItem],
        workflow_id: &str,
        workflow_title: &str,
        workflow_envs: &[EnvironmentItem],
    ) -> Self {
        let mut initial = runtime_envs;
        initial.extend_from_slice(secrets);
        initial.extend_from_slice(app_envs);
        initial.extend(build_status_envs(false));
        initial.extend(triggered_workflow_envs(workflow_id, workflow_title));
        initial.extend_from_slice(workflow_envs);

        Self {
            secrets: secrets.to_vec(),
            workflow_envs: initial,
            step_bundle_envs: Vec::new(),
            current_step_bundle_uuid: String::new(),
            build_failed: false,
        }
    }

    /// Append the envs of a workflow that is starting.
    ///
    /// Call exactly once per workflow invocation (before-run and after-run
    /// workflows included); repeated calls append again.
    pub fn workflow_start(&mut self, workflow_envs: &[EnvironmentItem]) {
        self.workflow_envs.extend_from_slice(workflow_envs);
    }

    /// Declarations for the step about to start.
    ///
    /// Entering a different bundle rebuilds the bundle scope from the current
    /// workflow scope plus the bundle's declarations; leaving bundle scope
    /// drops it.
    pub fn envs_for_step_start(&mut self, plan: &StepExecutionPlan) -> Vec<EnvironmentItem> {
        if plan.step_bundle_uuid != self.current_step_bundle_uuid {
            self.current_step_bundle_uuid = plan.step_bundle_uuid.clone();

            if plan.in_bundle() {
                debug!("Entering step bundle {}", plan.step_bundle_uuid);
                let mut bundle_envs = self.workflow_envs.clone();
                bundle_envs.extend_from_slice(&plan.step_bundle_envs);
                self.step_bundle_envs = bundle_envs;
            } else {
                debug!("Leaving step bundle scope");
                self.step_bundle_envs = Vec::new();
            }
        }

        if self.in_bundle_scope() {
            self.step_bundle_envs.clone()
        } else {
            self.workflow_envs.clone()
        }
    }

    /// Record a finished step.
    ///
    /// The step's output envs are appended to the workflow scope (and to the
    /// bundle scope while inside a bundle). The first time the build is seen
    /// failing, failed step envs (only when exactly one step has failed) and
    /// failing build status envs are appended as well; this happens at most
    /// once per run.
    pub fn update_with_step_finished(
        &mut self,
        output_envs: &[EnvironmentItem],
        build_run_results: &BuildRunResults,
    ) {
        let mut envs_to_add = output_envs.to_vec();

        if !self.build_failed && build_run_results.is_build_failed() {
            self.build_failed = true;
            info!("Build started failing, exposing failure status to later steps");

            if let [failed_step] = build_run_results.failed_steps.as_slice() {
                envs_to_add.extend(failed_step_envs(failed_step));
            }
            envs_to_add.extend(build_status_envs(true));
        }

        if self.in_bundle_scope() {
            self.step_bundle_envs.extend_from_slice(&envs_to_add);
        }
        self.workflow_envs.extend(envs_to_add);
    }

    /// A copy of the secrets the manager was created with.
    pub fn secrets(&self) -> Vec<EnvironmentItem> {
        self.secrets.clone()
    }

    /// A copy of the current workflow scope.
    pub fn workflow_envs(&self) -> Vec<EnvironmentItem> {
        self.workflow_envs.clone()
    }

    /// Bundle of the most recently started step; empty outside bundles.
    pub fn current_step_bundle_uuid(&self) -> &str {
        &self.current_step_bundle_uuid
    }

    /// Whether failure envs have been injected.
    pub fn is_build_failed(&self) -> bool {
        self.build_failed
    }

    fn in_bundle_scope(&self) -> bool {
        !self.current_step_bundle_uuid.is_empty()
    }
}
