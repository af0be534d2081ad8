//! Envs command implementation.
//!
//! Resolves a declaration file against the process environment and prints
//! what each declaration does.

use std::io::{self, Write};
use std::path::Path;

use super::dispatcher::{Command, CommandResult};
use crate::cli::args::EnvsArgs;
use crate::config::load_inventory;
use crate::env::{
    resolve_declarations, DeclarationCommand, EnvironmentItem, ProcessEnvironment,
};
use crate::error::{Result, RunwayError};
use crate::secrets::{SecretSet, REDACTED};

/// The envs command implementation.
pub struct EnvsCommand {
    args: EnvsArgs,
}

impl EnvsCommand {
    /// Create a new envs command.
    pub fn new(args: EnvsArgs) -> Self {
        Self { args }
    }

    /// Resolve and render the declarations, one line per command.
    fn render(&self, out: &mut dyn Write) -> Result<()> {
        let secrets = match &self.args.inventory {
            Some(path) => load_inventory(path)?,
            None => Vec::new(),
        };
        let declarations = load_declarations(&self.args.decl)?;

        let base = resolve_declarations(&secrets, &ProcessEnvironment)?;
        let effects = resolve_declarations(&declarations, &base.result_environment)?;
        let secret_values = SecretSet::from_items(&secrets)?;

        for command in &effects.command_history {
            writeln!(out, "{}", describe(command, &secret_values))?;
        }
        Ok(())
    }
}

impl Command for EnvsCommand {
    fn execute(&self) -> Result<CommandResult> {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        self.render(&mut out)?;
        Ok(CommandResult::success())
    }
}

fn load_declarations(path: &Path) -> Result<Vec<EnvironmentItem>> {
    let content = std::fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_yaml::from_str(&content).map_err(|e| {
        RunwayError::Other(anyhow::anyhow!(
            "invalid declaration file {}: {}",
            path.display(),
            e
        ))
    })
}

fn describe(command: &DeclarationCommand, secrets: &SecretSet) -> String {
    match command {
        DeclarationCommand::Set(var) if var.is_sensitive => {
            format!("set {}={}", var.key, REDACTED)
        }
        DeclarationCommand::Set(var) => format!("set {}={}", var.key, secrets.redact(&var.value)),
        DeclarationCommand::Unset { key } => format!("unset {}", key),
        DeclarationCommand::Skip { key } => format!("skip {}", key),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn render(decl: &str, inventory: Option<&str>) -> String {
        let dir = TempDir::new().unwrap();
        let decl_path = dir.path().join("envs.yml");
        fs::write(&decl_path, decl).unwrap();
        let inventory = inventory.map(|content| {
            let path = dir.path().join("secrets.yml");
            fs::write(&path, content).unwrap();
            path
        });

        let command = EnvsCommand::new(EnvsArgs {
            inventory,
            decl: decl_path,
        });
        let mut out = Vec::new();
        command.render(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn prints_command_per_declaration() {
        let output = render(
            r#"
- RUNWAY_ENVS_TEST_A: hello
- RUNWAY_ENVS_TEST_B: ""
  opts:
    skip_if_empty: true
- RUNWAY_ENVS_TEST_C:
  opts:
    unset: true
- RUNWAY_ENVS_TEST_D: "$RUNWAY_ENVS_TEST_A world"
  opts:
    is_expand: true
"#,
            None,
        );
        assert_eq!(
            output,
            "set RUNWAY_ENVS_TEST_A=hello\n\
             skip RUNWAY_ENVS_TEST_B\n\
             unset RUNWAY_ENVS_TEST_C\n\
             set RUNWAY_ENVS_TEST_D=hello world\n"
        );
    }

    #[test]
    fn secret_values_are_hidden() {
        let output = render(
            r#"
- RUNWAY_ENVS_TEST_AUTH: "token $RUNWAY_ENVS_TEST_TOKEN"
  opts:
    is_expand: true
- RUNWAY_ENVS_TEST_PLAIN: s3cr3t-value
- RUNWAY_ENVS_TEST_PASSWORD: hunter22
  opts:
    is_sensitive: true
"#,
            Some(
                r#"
envs:
- RUNWAY_ENVS_TEST_TOKEN: s3cr3t-value
"#,
            ),
        );
        assert_eq!(
            output,
            format!(
                "set RUNWAY_ENVS_TEST_AUTH=token {REDACTED}\n\
                 set RUNWAY_ENVS_TEST_PLAIN={REDACTED}\n\
                 set RUNWAY_ENVS_TEST_PASSWORD={REDACTED}\n"
            )
        );
    }

    #[test]
    fn empty_file_prints_nothing() {
        assert_eq!(render("", None), "");
    }

    #[test]
    fn malformed_declaration_is_error() {
        let dir = TempDir::new().unwrap();
        let decl = dir.path().join("envs.yml");
        fs::write(&decl, "- A: 1\n  B: 2\n").unwrap();
        let command = EnvsCommand::new(EnvsArgs {
            inventory: None,
            decl,
        });
        assert!(matches!(
            command.render(&mut Vec::new()),
            Err(RunwayError::MalformedDeclaration { .. })
        ));
    }
}
