//! Sequential step execution for one workflow run.

use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::config::{
    log_large_env_warning, EnvFile, EnvFileParser, RunnerSettings, OUTPUT_ENV_FILE_ENV_KEY,
};
use crate::env::{
    resolve_declarations, Environment, EnvironmentItem, EnvironmentItemOptions,
    EnvironmentSource, WorkflowEnvManager,
};
use crate::error::{Result, RunwayError};
use crate::models::{BuildRunResults, StepExecutionPlan, StepRunResult, StepRunStatus};
use crate::secrets::SecretSet;
use crate::shell::{SharedWriter, TimeoutCommand};

/// Exit code recorded for a step that failed before its process ran.
const NOT_STARTED_EXIT_CODE: i32 = 1;

/// A step to run: a program, its own declarations and its scope.
#[derive(Debug, Clone)]
pub struct StepSpec {
    pub title: String,
    pub program: String,
    pub args: Vec<String>,

    /// Declarations applied on top of the scope's envs.
    pub envs: Vec<EnvironmentItem>,

    pub plan: StepExecutionPlan,
    pub cwd: Option<PathBuf>,
}

impl StepSpec {
    /// Create a step outside any bundle.
    pub fn new(title: impl Into<String>, program: impl Into<String>) -> Self {
        let title = title.into();
        Self {
            plan: StepExecutionPlan::workflow_step(title.clone()),
            title,
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
            cwd: None,
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn envs(mut self, envs: Vec<EnvironmentItem>) -> Self {
        self.envs = envs;
        self
    }

    pub fn plan(mut self, plan: StepExecutionPlan) -> Self {
        self.plan = plan;
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }
}

/// Progress events emitted during a run.
#[derive(Debug)]
pub enum RunProgress<'a> {
    /// A step is about to start.
    StepStarting {
        title: &'a str,
        index: usize,
        total: usize,
    },
    /// A step finished.
    StepFinished { result: &'a StepRunResult },
}

/// Runs steps one after another, threading envs through a [`WorkflowEnvManager`].
///
/// Every step runs, even after a failure; later steps see the failure
/// through the build status envs.
pub struct StepRunner<'a> {
    settings: &'a RunnerSettings,
    source: &'a dyn EnvironmentSource,
    secret_filtering: bool,
}

impl<'a> StepRunner<'a> {
    /// Create a runner resolving step envs on top of `source`.
    pub fn new(
        settings: &'a RunnerSettings,
        source: &'a dyn EnvironmentSource,
        secret_filtering: bool,
    ) -> Self {
        Self {
            settings,
            source,
            secret_filtering,
        }
    }

    /// Run `steps`, copying their output into `output`.
    pub fn run<W: Write + Send + 'static>(
        &self,
        manager: &mut WorkflowEnvManager,
        workflow_id: &str,
        steps: &[StepSpec],
        output: &SharedWriter<W>,
    ) -> Result<BuildRunResults> {
        self.run_with_progress(manager, workflow_id, steps, output, |_| {})
    }

    /// Run `steps` with a progress callback.
    ///
    /// # Errors
    ///
    /// Fails only when the secrets cannot be resolved or step output cannot
    /// be written; step failures are recorded in the results.
    pub fn run_with_progress<W: Write + Send + 'static>(
        &self,
        manager: &mut WorkflowEnvManager,
        workflow_id: &str,
        steps: &[StepSpec],
        output: &SharedWriter<W>,
        mut on_progress: impl FnMut(RunProgress<'_>),
    ) -> Result<BuildRunResults> {
        let mut results = BuildRunResults::new(workflow_id);

        let secrets = if self.secret_filtering {
            SecretSet::from_items(&manager.secrets())?
        } else {
            SecretSet::default()
        };

        if let Some(path) = &self.settings.envfile_path {
            log_large_env_warning(path);
        }

        for (index, step) in steps.iter().enumerate() {
            on_progress(RunProgress::StepStarting {
                title: &step.title,
                index,
                total: steps.len(),
            });

            let (result, outputs) = self.run_step(manager, index, step, &secrets, output)?;

            results.record(result.clone());
            manager.update_with_step_finished(&outputs, &results);
            on_progress(RunProgress::StepFinished { result: &result });
        }

        info!(
            "Workflow {} finished: {} succeeded, {} failed, {} skipped",
            workflow_id,
            results.success_steps.len(),
            results.failed_steps.len(),
            results.skipped_steps.len()
        );
        Ok(results)
    }

    fn run_step<W: Write + Send + 'static>(
        &self,
        manager: &mut WorkflowEnvManager,
        index: usize,
        step: &StepSpec,
        secrets: &SecretSet,
        output: &SharedWriter<W>,
    ) -> Result<(StepRunResult, Vec<EnvironmentItem>)> {
        let output_env_file = self.output_env_file()?;

        let mut declarations = manager.envs_for_step_start(&step.plan);
        declarations.extend(step.envs.iter().cloned());
        declarations.push(
            EnvironmentItem::new(
                OUTPUT_ENV_FILE_ENV_KEY,
                output_env_file.path().to_string_lossy(),
            )
            .with_options(EnvironmentItemOptions {
                is_expand: Some(false),
                ..Default::default()
            }),
        );

        let effects = match resolve_declarations(&declarations, &self.source_environment()) {
            Ok(effects) => effects,
            Err(e) => {
                warn!("Failed to prepare environment of step '{}': {}", step.title, e);
                let result = StepRunResult::new(
                    index,
                    &step.title,
                    StepRunStatus::PreparationFailed,
                    NOT_STARTED_EXIT_CODE,
                )
                .with_error(e.to_string());
                return Ok((result, Vec::new()));
            }
        };

        let mut cmd = TimeoutCommand::new(&step.program)
            .args(step.args.iter().cloned())
            .envs(effects.result_environment.to_pairs())
            .tick_interval(self.settings.tick_interval())
            .kill_grace_period(self.settings.kill_grace_period());
        if let Some(timeout) = self.settings.timeout() {
            cmd = cmd.timeout(timeout);
        }
        if let Some(timeout) = self.settings.no_output_timeout() {
            cmd = cmd.hang_timeout(timeout);
        }
        if let Some(cwd) = &step.cwd {
            cmd = cmd.current_dir(cwd);
        }
        if self.secret_filtering {
            let mut step_secrets = secrets.clone();
            step_secrets.merge(&SecretSet::from_variables(&effects.result_environment));
            cmd = cmd.redact(step_secrets);
        }

        debug!("Running step '{}': {}", step.title, cmd.command_line());
        let result = match cmd.run(output.clone()) {
            Ok((outcome, _)) => {
                StepRunResult::new(index, &step.title, outcome.status, outcome.exit_code)
            }
            Err(e @ RunwayError::CommandFailed { .. }) => {
                warn!("Step '{}' could not be started: {}", step.title, e);
                StepRunResult::new(
                    index,
                    &step.title,
                    StepRunStatus::Failed,
                    NOT_STARTED_EXIT_CODE,
                )
                .with_error(e.to_string())
            }
            Err(e) => return Err(e),
        };

        let outputs = read_outputs(output_env_file.path());
        Ok((result, outputs))
    }

    fn source_environment(&self) -> Environment {
        let runtime = self.source.environment();
        let Some(path) = self.settings.envfile_path.as_deref() else {
            return runtime;
        };
        if !path.exists() {
            return runtime;
        }
        match EnvFile::load(path) {
            Ok(envfile) => envfile.restore(&runtime),
            Err(e) => {
                warn!("Ignoring envfile: {}", e);
                runtime
            }
        }
    }

    fn output_env_file(&self) -> Result<tempfile::NamedTempFile> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("runway-output-").suffix(".env");
        let file = match &self.settings.output_env_dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        Ok(file)
    }
}

fn read_outputs(path: &Path) -> Vec<EnvironmentItem> {
    match EnvFileParser::load_optional(path) {
        Ok(outputs) => outputs,
        Err(e) => {
            warn!("Failed to read step outputs: {}", e);
            Vec::new()
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::env::{BUILD_STATUS_ENV_KEY, FAILED_STEP_TITLE_ENV_KEY};
    use std::time::Duration;

    fn sh(title: &str, script: &str) -> StepSpec {
        StepSpec::new(title, "/bin/sh").args(["-c", script])
    }

    fn manager(secrets: &[EnvironmentItem]) -> WorkflowEnvManager {
        WorkflowEnvManager::new(
            vec![],
            secrets,
            &[],
            "primary",
            "Primary",
            &[EnvironmentItem::new("CI", "true")],
        )
    }

    fn source() -> Environment {
        Environment::from_pairs([("PATH", "/usr/bin:/bin")])
    }

    fn run_steps(
        settings: &RunnerSettings,
        manager: &mut WorkflowEnvManager,
        steps: &[StepSpec],
        filtering: bool,
    ) -> (BuildRunResults, String) {
        let source = source();
        let output = SharedWriter::new(Vec::new());
        let results = StepRunner::new(settings, &source, filtering)
            .run(manager, "primary", steps, &output)
            .unwrap();
        let output = output.try_into_inner().unwrap();
        (results, String::from_utf8(output).unwrap())
    }

    #[test]
    fn workflow_envs_reach_step() {
        let mut manager = manager(&[]);
        let (results, output) = run_steps(
            &RunnerSettings::default(),
            &mut manager,
            &[sh("print", "echo \"CI=$CI status=$RUNWAY_BUILD_STATUS\"")],
            false,
        );
        assert!(!results.is_build_failed());
        assert_eq!(output, "CI=true status=0\n");
    }

    #[test]
    fn outputs_flow_to_later_steps() {
        let mut manager = manager(&[]);
        let steps = [
            sh("export", "echo 'ARTIFACT=out/app.bin' >> \"$RUNWAY_OUTPUT_ENV_FILE\""),
            sh("consume", "echo \"artifact: $ARTIFACT\""),
        ];
        let (_, output) = run_steps(&RunnerSettings::default(), &mut manager, &steps, false);
        assert_eq!(output, "artifact: out/app.bin\n");
    }

    #[test]
    fn failure_is_visible_to_later_steps() {
        let mut manager = manager(&[]);
        let steps = [
            sh("Compile", "exit 2"),
            sh("Report", "echo \"$RUNWAY_BUILD_STATUS $RUNWAY_FAILED_STEP_TITLE\""),
        ];
        let (results, output) =
            run_steps(&RunnerSettings::default(), &mut manager, &steps, false);

        assert_eq!(results.failed_steps.len(), 1);
        assert_eq!(results.success_steps.len(), 1);
        assert_eq!(results.exit_code(), 1);
        assert_eq!(output, "1 Compile\n");

        let env = resolve_declarations(&manager.workflow_envs(), &Environment::new())
            .unwrap()
            .result_environment;
        assert_eq!(env.value(BUILD_STATUS_ENV_KEY), Some("1"));
        assert_eq!(env.value(FAILED_STEP_TITLE_ENV_KEY), Some("Compile"));
    }

    #[test]
    fn secrets_are_redacted() {
        let mut manager = manager(&[EnvironmentItem::new("API_TOKEN", "s3cr3t-value")]);
        let (_, output) = run_steps(
            &RunnerSettings::default(),
            &mut manager,
            &[sh("leak", "echo \"token: $API_TOKEN\"")],
            true,
        );
        assert_eq!(output, "token: [REDACTED]\n");
    }

    #[test]
    fn derived_sensitive_values_are_redacted() {
        let mut manager = manager(&[]);
        let sensitive = EnvironmentItem::new("PASSWORD", "hunter22").with_options(
            EnvironmentItemOptions {
                is_sensitive: Some(true),
                ..Default::default()
            },
        );
        let step = sh("leak", "echo \"$AUTH\"")
            .envs(vec![sensitive, EnvironmentItem::expanded("AUTH", "admin:$PASSWORD")]);
        let (_, output) = run_steps(&RunnerSettings::default(), &mut manager, &[step], true);
        assert_eq!(output, "[REDACTED]\n");
    }

    #[test]
    fn filtering_disabled_passes_secrets_through() {
        let mut manager = manager(&[EnvironmentItem::new("API_TOKEN", "s3cr3t-value")]);
        let (_, output) = run_steps(
            &RunnerSettings::default(),
            &mut manager,
            &[sh("leak", "echo \"$API_TOKEN\"")],
            false,
        );
        assert_eq!(output, "s3cr3t-value\n");
    }

    #[test]
    fn malformed_step_env_is_preparation_failure() {
        let mut manager = manager(&[]);
        let malformed: EnvironmentItem = serde_yaml::from_str("A: 1\nB: 2").unwrap();
        let steps = [sh("broken", "echo never").envs(vec![malformed])];
        let (results, output) =
            run_steps(&RunnerSettings::default(), &mut manager, &steps, false);

        assert_eq!(results.failed_steps[0].status, StepRunStatus::PreparationFailed);
        assert_eq!(results.failed_steps[0].exit_code, 1);
        assert!(output.is_empty());
    }

    #[test]
    fn missing_program_fails_step_and_continues() {
        let mut manager = manager(&[]);
        let steps = [
            StepSpec::new("missing", "/nonexistent/program"),
            sh("after", "echo still running"),
        ];
        let (results, output) =
            run_steps(&RunnerSettings::default(), &mut manager, &steps, false);

        assert_eq!(results.failed_steps[0].title, "missing");
        assert!(results.failed_steps[0].error_message.is_some());
        assert_eq!(output, "still running\n");
    }

    #[test]
    fn hang_is_recorded_with_distinct_status() {
        let settings = RunnerSettings {
            no_output_timeout_secs: Some(1),
            tick_interval_secs: 1,
            kill_grace_period_secs: 1,
            ..Default::default()
        };
        let mut manager = manager(&[]);
        let (results, _) = run_steps(&settings, &mut manager, &[sh("stuck", "sleep 30")], false);

        let result = &results.failed_steps[0];
        assert_eq!(result.status, StepRunStatus::AbortedWithNoOutputTimeout);
        assert_eq!(result.failure_reason(), "timed out due to no output");
        assert_eq!(results.exit_code(), 3);
    }

    #[test]
    fn bundle_envs_stay_in_bundle() {
        let mut manager = manager(&[]);
        let bundle = StepExecutionPlan::bundle_step(
            "s1",
            "b1",
            vec![EnvironmentItem::new("GREETING", "Hello")],
        );
        let steps = [
            sh("in bundle", "echo \"[$GREETING]\"").plan(bundle),
            sh("after bundle", "echo \"[$GREETING]\""),
        ];
        let (_, output) = run_steps(&RunnerSettings::default(), &mut manager, &steps, false);
        assert_eq!(output, "[Hello]\n[]\n");
    }

    #[test]
    fn envfile_restores_cleared_values() {
        let dir = tempfile::tempdir().unwrap();
        let envfile = dir.path().join("envfile.yml");
        std::fs::write(&envfile, "envs:\n  BIG: restored value\n").unwrap();

        let settings = RunnerSettings {
            envfile_path: Some(envfile),
            ..Default::default()
        };
        let source = Environment::from_pairs([("PATH", "/usr/bin:/bin"), ("BIG", "")]);
        let output = SharedWriter::new(Vec::new());
        let mut manager = manager(&[]);

        StepRunner::new(&settings, &source, false)
            .run(&mut manager, "primary", &[sh("print", "echo \"$BIG\"")], &output)
            .unwrap();

        let output = output.try_into_inner().unwrap();
        assert_eq!(String::from_utf8(output).unwrap(), "restored value\n");
    }

    #[test]
    fn progress_reports_each_step() {
        let settings = RunnerSettings::default();
        let source = source();
        let output = SharedWriter::new(Vec::new());
        let mut manager = manager(&[]);
        let mut events = Vec::new();

        StepRunner::new(&settings, &source, false)
            .run_with_progress(
                &mut manager,
                "primary",
                &[sh("a", "true"), sh("b", "false")],
                &output,
                |event| match event {
                    RunProgress::StepStarting { title, index, total } => {
                        events.push(format!("start {title} {index}/{total}"))
                    }
                    RunProgress::StepFinished { result } => {
                        events.push(format!("done {} {}", result.title, result.status))
                    }
                },
            )
            .unwrap();

        assert_eq!(
            events,
            vec!["start a 0/2", "done a success", "start b 1/2", "done b failed"]
        );
    }

    #[test]
    fn timeout_setting_aborts_step() {
        let settings = RunnerSettings {
            timeout_secs: Some(1),
            kill_grace_period_secs: 1,
            ..Default::default()
        };
        let mut manager = manager(&[]);
        let start = std::time::Instant::now();
        let (results, _) = run_steps(&settings, &mut manager, &[sh("slow", "sleep 30")], false);
        assert_eq!(
            results.failed_steps[0].status,
            StepRunStatus::AbortedWithCustomTimeout
        );
        assert!(start.elapsed() < Duration::from_secs(20));
    }
}
