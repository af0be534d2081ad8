//! Restoring env vars that were cleared for being too large.
//!
//! The agent launching the runner may clear large variables (changed file
//! lists, commit messages) from the process environment to stay under the
//! `execve` size limit, keeping their original values in a YAML envfile:
//!
//! ```yaml
//! envs:
//!   GIT_COMMIT_MESSAGES: "Merge x into y\n..."
//! cleared_env_keys:
//!   - GIT_COMMIT_MESSAGES
//! ```

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use tracing::warn;

use crate::env::{Environment, Variable};
use crate::error::{Result, RunwayError};

/// Environment key pointing at the envfile.
pub const ENVFILE_PATH_ENV_KEY: &str = "RUNWAY_ENVFILE_PATH";

/// Original values of cleared variables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct EnvFile {
    #[serde(default)]
    pub envs: HashMap<String, String>,

    /// Keys that were removed from the runtime environment.
    #[serde(default)]
    pub cleared_env_keys: Vec<String>,
}

impl EnvFile {
    /// Load an envfile.
    pub fn load(path: &Path) -> Result<Self> {
        let error = |message: String| RunwayError::EnvFile {
            path: path.to_path_buf(),
            message,
        };
        let content = std::fs::read_to_string(path).map_err(|e| error(e.to_string()))?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&content).map_err(|e| error(e.to_string()))
    }

    /// The true value of `key`.
    ///
    /// A key absent at runtime is `""`. An empty runtime value is replaced by
    /// the file's value when the file has one.
    pub fn value_for(&self, key: &str, runtime: &Environment) -> String {
        match runtime.value(key) {
            None => String::new(),
            Some("") => self.envs.get(key).cloned().unwrap_or_default(),
            Some(value) => value.to_string(),
        }
    }

    /// Apply [`EnvFile::value_for`] to every runtime variable.
    pub fn restore(&self, runtime: &Environment) -> Environment {
        let mut restored = runtime.clone();
        for var in runtime.iter().filter(|var| var.value.is_empty()) {
            if let Some(original) = self.envs.get(&var.key) {
                restored.insert(Variable {
                    value: original.clone(),
                    ..var.clone()
                });
            }
        }
        restored
    }
}

/// Read the true value of `key` using the envfile at `path`.
///
/// `path` must exist.
pub fn get_env(key: &str, runtime: &Environment, path: &Path) -> Result<String> {
    Ok(EnvFile::load(path)?.value_for(key, runtime))
}

/// Restore every cleared variable of `runtime` from the envfile at `path`.
pub fn restore_cleared(runtime: &Environment, path: &Path) -> Result<Environment> {
    Ok(EnvFile::load(path)?.restore(runtime))
}

/// Warn about variables missing from the runtime environment.
///
/// A missing file is silent; other load errors are only warned about.
pub fn log_large_env_warning(path: &Path) {
    if !path.exists() {
        return;
    }

    let envfile = match EnvFile::load(path) {
        Ok(envfile) => envfile,
        Err(e) => {
            warn!("Failed to load envfile at ${}: {}", ENVFILE_PATH_ENV_KEY, e);
            return;
        }
    };

    if envfile.cleared_env_keys.is_empty() {
        return;
    }

    let cleared: String = envfile
        .cleared_env_keys
        .iter()
        .map(|key| format!("- {}\n", key))
        .collect();
    warn!(
        "Some env vars were removed because their size would exceed system limits.\n\
         Their original values are available in the file at ${}.\n\
         The following env vars are not available in the runtime environment:\n{}",
        ENVFILE_PATH_ENV_KEY, cleared
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const CONTENT: &str = r#"
envs:
  GIT_CHANGED_FILES: README.md
  GIT_COMMIT_MESSAGES: "Merge x into y\nAnd it goes on and on..."
  KEY3: original_value3
  ONLY_IN_FILE: original_value4
cleared_env_keys:
  - GIT_COMMIT_MESSAGES
"#;

    fn write_envfile(content: &str) -> (TempDir, std::path::PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("envfile.yml");
        fs::write(&path, content).unwrap();
        (dir, path)
    }

    fn runtime() -> Environment {
        Environment::from_pairs([
            ("GIT_CHANGED_FILES", "README.md"),
            ("GIT_COMMIT_MESSAGES", ""),
            ("KEY3", "runtime_value3"),
            ("ONLY_AT_RUNTIME", "runtime_value5"),
        ])
    }

    #[test]
    fn restores_cleared_value() {
        let (_dir, path) = write_envfile(CONTENT);
        assert_eq!(
            get_env("GIT_COMMIT_MESSAGES", &runtime(), &path).unwrap(),
            "Merge x into y\nAnd it goes on and on..."
        );
    }

    #[test]
    fn runtime_value_wins_when_not_empty() {
        let (_dir, path) = write_envfile(CONTENT);
        assert_eq!(get_env("KEY3", &runtime(), &path).unwrap(), "runtime_value3");
        assert_eq!(
            get_env("ONLY_AT_RUNTIME", &runtime(), &path).unwrap(),
            "runtime_value5"
        );
    }

    #[test]
    fn key_absent_at_runtime_is_empty() {
        let (_dir, path) = write_envfile(CONTENT);
        assert_eq!(get_env("ONLY_IN_FILE", &runtime(), &path).unwrap(), "");
    }

    #[test]
    fn empty_envfile_changes_nothing() {
        let (_dir, path) = write_envfile("");
        assert_eq!(restore_cleared(&runtime(), &path).unwrap(), runtime());
    }

    #[test]
    fn empty_without_original_stays_empty() {
        let (_dir, path) = write_envfile("envs: {}\n");
        assert_eq!(get_env("GIT_COMMIT_MESSAGES", &runtime(), &path).unwrap(), "");
    }

    #[test]
    fn restore_only_touches_cleared_keys() {
        let (_dir, path) = write_envfile(CONTENT);
        let restored = restore_cleared(&runtime(), &path).unwrap();

        assert_eq!(
            restored.value("GIT_COMMIT_MESSAGES"),
            Some("Merge x into y\nAnd it goes on and on...")
        );
        assert_eq!(restored.value("KEY3"), Some("runtime_value3"));
        assert!(!restored.contains("ONLY_IN_FILE"));
        assert_eq!(restored.len(), runtime().len());
    }

    #[test]
    fn restore_keeps_sensitivity() {
        let mut runtime = Environment::new();
        runtime.insert(Variable::sensitive("TOKEN", ""));
        let envfile = EnvFile {
            envs: HashMap::from([("TOKEN".to_string(), "s3cr3t".to_string())]),
            cleared_env_keys: vec!["TOKEN".to_string()],
        };

        let restored = envfile.restore(&runtime);
        assert!(restored.get("TOKEN").unwrap().is_sensitive);
        assert_eq!(restored.value("TOKEN"), Some("s3cr3t"));
    }

    #[test]
    fn load_parses_cleared_keys() {
        let (_dir, path) = write_envfile(CONTENT);
        let envfile = EnvFile::load(&path).unwrap();
        assert_eq!(envfile.cleared_env_keys, vec!["GIT_COMMIT_MESSAGES"]);
        assert_eq!(envfile.envs.len(), 4);
    }

    #[test]
    fn invalid_yaml_is_envfile_error() {
        let (_dir, path) = write_envfile("envs: [not, a, map]");
        assert!(matches!(
            EnvFile::load(&path),
            Err(RunwayError::EnvFile { .. })
        ));
    }

    #[test]
    fn warning_never_fails() {
        log_large_env_warning(Path::new("/nonexistent/envfile.yml"));
        let (_dir, path) = write_envfile("envs: [not, a, map]");
        log_large_env_warning(&path);
        let (_dir, path) = write_envfile(CONTENT);
        log_large_env_warning(&path);
    }
}
