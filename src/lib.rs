//! Runway - step execution with scoped environments.
//!
//! Runway runs workflow steps one after another. Each step gets an
//! environment built from layered declarations, its output is copied with
//! secret values redacted, and it is aborted when it stops producing output.
//!
//! # Modules
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`config`] - Runner settings, secret inventory, envfile and output env files
//! - [`env`] - Environment declarations, resolution and the workflow env manager
//! - [`error`] - Error types and result aliases
//! - [`hang`] - No-output detection
//! - [`models`] - Step plans, statuses and build results
//! - [`runner`] - Sequential step execution
//! - [`secrets`] - Secret values and output redaction
//! - [`shell`] - Child processes with timeouts and shared output
//!
//! # Example
//!
//! ```
//! use runway::env::{resolve_declarations, Environment, EnvironmentItem};
//! use runway::secrets::SecretSet;
//!
//! let declarations = vec![
//!     EnvironmentItem::new("API_TOKEN", "s3cr3t"),
//!     EnvironmentItem::expanded("AUTH_HEADER", "Bearer $API_TOKEN"),
//! ];
//! let effects = resolve_declarations(&declarations, &Environment::new()).unwrap();
//! assert_eq!(effects.result_environment.value("AUTH_HEADER"), Some("Bearer s3cr3t"));
//!
//! let secrets = SecretSet::new(["s3cr3t"]);
//! assert_eq!(secrets.redact("Bearer s3cr3t"), "Bearer [REDACTED]");
//! ```

pub mod cli;
pub mod config;
pub mod env;
pub mod error;
pub mod hang;
pub mod models;
pub mod runner;
pub mod secrets;
pub mod shell;

pub use error::{Result, RunwayError};
