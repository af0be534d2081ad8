//! Exec command implementation.
//!
//! The `exec` command runs one program as a single-step workflow with
//! the secret inventory in scope, redacting its output and aborting it
//! when it hangs.

use std::io;

use anyhow::anyhow;
use tracing::debug;

use super::dispatcher::{Command, CommandResult};
use crate::cli::args::ExecArgs;
use crate::config::{load_inventory, RunnerSettings};
use crate::env::{ProcessEnvironment, WorkflowEnvManager};
use crate::error::{Result, RunwayError};
use crate::runner::{RunProgress, StepRunner, StepSpec};
use crate::secrets::is_secret_filtering;
use crate::shell::SharedWriter;

/// The exec command implementation.
pub struct ExecCommand {
    args: ExecArgs,
}

impl ExecCommand {
    /// Create a new exec command.
    pub fn new(args: ExecArgs) -> Self {
        Self { args }
    }

    /// Settings file, then environment overrides, then flags.
    fn settings(&self) -> Result<RunnerSettings> {
        let mut settings = match &self.args.settings {
            Some(path) => RunnerSettings::load(path)?,
            None => RunnerSettings::default(),
        };
        settings.apply_process_env()?;

        if let Some(secs) = self.args.hang_timeout {
            settings.no_output_timeout_secs = Some(secs);
        }
        if let Some(secs) = self.args.timeout {
            settings.timeout_secs = Some(secs);
        }
        if self.args.secret_filtering.is_some() {
            settings.secret_filtering = self.args.secret_filtering;
        }
        Ok(settings)
    }

    fn step(&self) -> Result<StepSpec> {
        let (program, args) = self
            .args
            .command
            .split_first()
            .ok_or_else(|| RunwayError::Other(anyhow!("no program given")))?;
        let title = self.args.title.clone().unwrap_or_else(|| program.clone());
        Ok(StepSpec::new(title, program.clone()).args(args.iter().cloned()))
    }
}

impl Command for ExecCommand {
    fn execute(&self) -> Result<CommandResult> {
        let settings = self.settings()?;
        let step = self.step()?;

        let secrets = match &self.args.inventory {
            Some(path) => load_inventory(path)?,
            None => Vec::new(),
        };
        let filtering = is_secret_filtering(settings.secret_filtering, &secrets)?;
        debug!(
            "Secret filtering {}, {} secret(s)",
            if filtering { "enabled" } else { "disabled" },
            secrets.len()
        );

        let mut manager = WorkflowEnvManager::new(
            settings.runtime_envs(),
            &secrets,
            &[],
            &self.args.workflow,
            &self.args.workflow,
            &[],
        );

        let source = ProcessEnvironment;
        let output = SharedWriter::new(io::stdout());
        let results = StepRunner::new(&settings, &source, filtering).run_with_progress(
            &mut manager,
            &self.args.workflow,
            std::slice::from_ref(&step),
            &output,
            |event| {
                if let RunProgress::StepFinished { result } = event {
                    if result.status.is_failure() {
                        eprintln!("{}: {}", result.title, result.failure_reason());
                    }
                }
            },
        )?;

        Ok(CommandResult::from_exit_code(results.exit_code()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::args::{Cli, Commands};
    use clap::Parser;

    fn exec_args(argv: &[&str]) -> ExecArgs {
        let mut full = vec!["runway", "exec"];
        full.extend_from_slice(argv);
        match Cli::parse_from(full).command {
            Commands::Exec(args) => args,
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn flags_override_settings() {
        let command = ExecCommand::new(exec_args(&[
            "--hang-timeout",
            "45",
            "--timeout",
            "600",
            "--secret-filtering",
            "false",
            "--",
            "true",
        ]));
        let settings = command.settings().unwrap();
        assert_eq!(settings.no_output_timeout_secs, Some(45));
        assert_eq!(settings.timeout_secs, Some(600));
        assert_eq!(settings.secret_filtering, Some(false));
    }

    #[test]
    fn title_defaults_to_program() {
        let step = ExecCommand::new(exec_args(&["--", "make", "test"]))
            .step()
            .unwrap();
        assert_eq!(step.title, "make");
        assert_eq!(step.program, "make");
        assert_eq!(step.args, vec!["test"]);

        let step = ExecCommand::new(exec_args(&["--title", "Unit tests", "--", "make"]))
            .step()
            .unwrap();
        assert_eq!(step.title, "Unit tests");
    }

    #[test]
    fn missing_settings_file_is_error() {
        let command = ExecCommand::new(exec_args(&[
            "--settings",
            "/nonexistent/settings.yml",
            "--",
            "true",
        ]));
        assert!(matches!(
            command.settings(),
            Err(RunwayError::Settings { .. })
        ));
    }
}
