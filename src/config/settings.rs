//! Runner settings.
//!
//! Settings come from an optional YAML file, then environment overrides,
//! then command-line flags (applied by the CLI).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::envfile::ENVFILE_PATH_ENV_KEY;
use crate::env::{EnvironmentItem, ENVSTORE_PATH_ENV_KEY, FORMATTED_OUTPUT_PATH_ENV_KEY};
use crate::error::{Result, RunwayError};
use crate::secrets::SECRET_FILTERING_ENV_KEY;

/// Environment key overriding the no-output timeout, in seconds.
pub const NO_OUTPUT_TIMEOUT_ENV_KEY: &str = "RUNWAY_NO_OUTPUT_TIMEOUT";

/// Settings for running steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerSettings {
    /// Explicit secret filtering switch; unset defers to the secrets.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_filtering: Option<bool>,

    /// Abort a step after this many seconds without output. 0 disables.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_output_timeout_secs: Option<u64>,

    /// Abort a step after this many seconds. 0 disables.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,

    /// Hang detector tick interval.
    pub tick_interval_secs: u64,

    /// Time between asking a step to stop and killing it.
    pub kill_grace_period_secs: u64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub envstore_path: Option<PathBuf>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub formatted_output_path: Option<PathBuf>,

    /// Directory for per-step output env files (a temp dir when unset).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_env_dir: Option<PathBuf>,

    /// Envfile holding values of cleared variables.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub envfile_path: Option<PathBuf>,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            secret_filtering: None,
            no_output_timeout_secs: None,
            timeout_secs: None,
            tick_interval_secs: 30,
            kill_grace_period_secs: 5,
            envstore_path: None,
            formatted_output_path: None,
            output_env_dir: None,
            envfile_path: None,
        }
    }
}

impl RunnerSettings {
    /// Load settings from a YAML file. An empty file yields defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| RunwayError::Settings {
            message: format!("{}: {}", path.display(), e),
        })?;
        Self::parse(&content).map_err(|e| match e {
            RunwayError::Settings { message } => RunwayError::Settings {
                message: format!("{}: {}", path.display(), message),
            },
            other => other,
        })
    }

    /// Parse settings YAML.
    pub fn parse(content: &str) -> Result<Self> {
        let settings: Self = if content.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(content).map_err(|e| RunwayError::Settings {
                message: e.to_string(),
            })?
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Apply environment overrides read through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(SECRET_FILTERING_ENV_KEY) {
            self.secret_filtering = match value.as_str() {
                "true" => Some(true),
                "false" => Some(false),
                "" => self.secret_filtering,
                other => {
                    return Err(RunwayError::Settings {
                        message: format!(
                            "{} must be 'true' or 'false', got '{}'",
                            SECRET_FILTERING_ENV_KEY, other
                        ),
                    })
                }
            };
        }

        if let Some(value) = lookup(NO_OUTPUT_TIMEOUT_ENV_KEY).filter(|v| !v.is_empty()) {
            let secs = value.trim().parse().map_err(|_| RunwayError::Settings {
                message: format!(
                    "{} must be a number of seconds, got '{}'",
                    NO_OUTPUT_TIMEOUT_ENV_KEY, value
                ),
            })?;
            self.no_output_timeout_secs = Some(secs);
        }

        if let Some(value) = lookup(ENVFILE_PATH_ENV_KEY).filter(|v| !v.is_empty()) {
            self.envfile_path = Some(PathBuf::from(value));
        }

        Ok(())
    }

    /// Apply overrides from the process environment.
    pub fn apply_process_env(&mut self) -> Result<()> {
        self.apply_env(|key| std::env::var(key).ok())
    }

    pub fn validate(&self) -> Result<()> {
        if self.tick_interval_secs == 0 {
            return Err(RunwayError::Settings {
                message: "tick_interval_secs must be greater than 0".to_string(),
            });
        }
        Ok(())
    }

    pub fn no_output_timeout(&self) -> Option<Duration> {
        self.no_output_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs)
    }

    pub fn kill_grace_period(&self) -> Duration {
        Duration::from_secs(self.kill_grace_period_secs)
    }

    /// Envs describing runner paths, placed first in every workflow scope.
    pub fn runtime_envs(&self) -> Vec<EnvironmentItem> {
        let mut envs = Vec::new();
        if let Some(path) = &self.envstore_path {
            envs.push(EnvironmentItem::new(
                ENVSTORE_PATH_ENV_KEY,
                path.to_string_lossy(),
            ));
        }
        if let Some(path) = &self.formatted_output_path {
            envs.push(EnvironmentItem::new(
                FORMATTED_OUTPUT_PATH_ENV_KEY,
                path.to_string_lossy(),
            ));
        }
        envs
    }
}
