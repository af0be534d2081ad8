//! Integration tests for the runway binary.
// The cargo_bin function is marked deprecated in favor of cargo_bin! macro,
// but both work correctly. Suppressing until assert_cmd stabilizes the new API.
#![allow(deprecated)]

use assert_cmd::cargo::cargo_bin;
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// A runway command isolated from runway settings in the test environment.
fn runway() -> Command {
    let mut cmd = Command::new(cargo_bin("runway"));
    for key in [
        "RUNWAY_SECRET_FILTERING",
        "RUNWAY_NO_OUTPUT_TIMEOUT",
        "RUNWAY_ENVFILE_PATH",
        "RUNWAY_INVENTORY",
        "RUNWAY_SETTINGS",
        "RUST_LOG",
    ] {
        cmd.env_remove(key);
    }
    cmd
}

fn write(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

const INVENTORY: &str = r#"
envs:
  - DEPLOY_TOKEN: tok-9f8e7d6c
"#;

#[test]
fn shows_help() -> Result<(), Box<dyn std::error::Error>> {
    runway()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("exec"))
        .stdout(predicate::str::contains("envs"));
    Ok(())
}

#[test]
fn shows_version() -> Result<(), Box<dyn std::error::Error>> {
    runway()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
    Ok(())
}

#[test]
fn exec_requires_a_program() -> Result<(), Box<dyn std::error::Error>> {
    runway().arg("exec").assert().failure();
    Ok(())
}

#[cfg(unix)]
#[test]
fn exec_streams_step_output() -> Result<(), Box<dyn std::error::Error>> {
    runway()
        .args(["exec", "--", "/bin/sh", "-c", "echo hello from step"])
        .assert()
        .success()
        .stdout("hello from step\n");
    Ok(())
}

#[cfg(unix)]
#[test]
fn exec_exposes_workflow_envs() -> Result<(), Box<dyn std::error::Error>> {
    runway()
        .args([
            "exec",
            "--workflow",
            "nightly",
            "--",
            "/bin/sh",
            "-c",
            "echo \"$RUNWAY_TRIGGERED_WORKFLOW_ID $RUNWAY_BUILD_STATUS\"",
        ])
        .assert()
        .success()
        .stdout("nightly 0\n");
    Ok(())
}

#[cfg(unix)]
#[test]
fn exec_redacts_inventory_secrets() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let inventory = write(&dir, "secrets.yml", INVENTORY);

    runway()
        .arg("exec")
        .arg("--inventory")
        .arg(&inventory)
        .args(["--", "/bin/sh", "-c", "echo \"token=$DEPLOY_TOKEN\""])
        .assert()
        .success()
        .stdout("token=[REDACTED]\n");
    Ok(())
}

#[cfg(unix)]
#[test]
fn exec_without_filtering_shows_secrets() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let inventory = write(&dir, "secrets.yml", INVENTORY);

    runway()
        .arg("exec")
        .arg("--inventory")
        .arg(&inventory)
        .args(["--secret-filtering", "false"])
        .args(["--", "/bin/sh", "-c", "echo \"token=$DEPLOY_TOKEN\""])
        .assert()
        .success()
        .stdout("token=tok-9f8e7d6c\n");
    Ok(())
}

#[cfg(unix)]
#[test]
fn exec_filtering_can_be_disabled_by_env() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let inventory = write(&dir, "secrets.yml", INVENTORY);

    runway()
        .env("RUNWAY_SECRET_FILTERING", "false")
        .env("RUNWAY_INVENTORY", &inventory)
        .args(["exec", "--", "/bin/sh", "-c", "echo \"$DEPLOY_TOKEN\""])
        .assert()
        .success()
        .stdout("tok-9f8e7d6c\n");
    Ok(())
}

#[cfg(unix)]
#[test]
fn exec_failure_sets_exit_code() -> Result<(), Box<dyn std::error::Error>> {
    runway()
        .args(["exec", "--title", "Compile", "--", "/bin/sh", "-c", "exit 7"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Compile"));
    Ok(())
}

#[test]
fn exec_missing_program_fails() -> Result<(), Box<dyn std::error::Error>> {
    runway()
        .args(["exec", "--", "/nonexistent/runway-test-program"])
        .assert()
        .code(1);
    Ok(())
}

#[cfg(unix)]
#[test]
fn exec_aborts_hung_step() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let settings = write(
        &dir,
        "settings.yml",
        "tick_interval_secs: 1\nkill_grace_period_secs: 1\n",
    );

    runway()
        .arg("exec")
        .arg("--settings")
        .arg(&settings)
        .args(["--hang-timeout", "1", "--", "/bin/sh", "-c", "sleep 30"])
        .timeout(std::time::Duration::from_secs(20))
        .assert()
        .code(3)
        .stderr(predicate::str::contains("timed out due to no output"));
    Ok(())
}

#[test]
fn exec_rejects_invalid_settings() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let settings = write(&dir, "settings.yml", "tick_interval_secs: 0\n");

    runway()
        .arg("exec")
        .arg("--settings")
        .arg(&settings)
        .args(["--", "true"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Error:"));
    Ok(())
}

#[test]
fn envs_prints_command_history() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let decl = write(
        &dir,
        "envs.yml",
        r#"
- RUNWAY_CLI_TEST_NAME: world
- RUNWAY_CLI_TEST_GREETING: "hello $RUNWAY_CLI_TEST_NAME"
  opts:
    is_expand: true
- RUNWAY_CLI_TEST_EMPTY: ""
  opts:
    skip_if_empty: true
"#,
    );

    runway()
        .arg("envs")
        .arg("--decl")
        .arg(&decl)
        .assert()
        .success()
        .stdout(
            "set RUNWAY_CLI_TEST_NAME=world\n\
             set RUNWAY_CLI_TEST_GREETING=hello world\n\
             skip RUNWAY_CLI_TEST_EMPTY\n",
        );
    Ok(())
}

#[test]
fn envs_hides_secrets() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let inventory = write(&dir, "secrets.yml", INVENTORY);
    let decl = write(
        &dir,
        "envs.yml",
        r#"
- RUNWAY_CLI_TEST_HEADER: "Bearer $DEPLOY_TOKEN"
  opts:
    is_expand: true
"#,
    );

    runway()
        .arg("envs")
        .arg("--inventory")
        .arg(&inventory)
        .arg("--decl")
        .arg(&decl)
        .assert()
        .success()
        .stdout("set RUNWAY_CLI_TEST_HEADER=Bearer [REDACTED]\n");
    Ok(())
}

#[test]
fn envs_reports_malformed_declaration() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let decl = write(&dir, "envs.yml", "- A: one\n  B: two\n");

    runway()
        .arg("envs")
        .arg("--decl")
        .arg(&decl)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Malformed environment declaration"));
    Ok(())
}
