//! Runner configuration and the files it reads.
//!
//! - [`RunnerSettings`] - Timeouts, filtering and paths, from YAML and env overrides
//! - [`load_inventory`] - Secret declarations from an inventory file
//! - [`EnvFile`] - Original values of variables cleared for size
//! - [`EnvFileParser`] - Step output env files
//!
//! # Example
//!
//! ```
//! use runway::config::RunnerSettings;
//! use std::time::Duration;
//!
//! let mut settings = RunnerSettings::parse("no_output_timeout_secs: 600").unwrap();
//! settings
//!     .apply_env(|key| (key == "RUNWAY_SECRET_FILTERING").then(|| "false".to_string()))
//!     .unwrap();
//!
//! assert_eq!(settings.no_output_timeout(), Some(Duration::from_secs(600)));
//! assert_eq!(settings.secret_filtering, Some(false));
//! ```

pub mod env_file;
pub mod envfile;
pub mod inventory;
pub mod settings;

pub use env_file::{EnvFileParser, OUTPUT_ENV_FILE_ENV_KEY};
pub use envfile::{get_env, log_large_env_warning, restore_cleared, EnvFile, ENVFILE_PATH_ENV_KEY};
pub use inventory::{load_inventory, parse_inventory};
pub use settings::{RunnerSettings, NO_OUTPUT_TIMEOUT_ENV_KEY};
