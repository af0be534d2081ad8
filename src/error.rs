//! Error types for Runway operations.
//!
//! This module defines [`RunwayError`], the primary error type used throughout
//! the crate, and a [`Result`] type alias for convenience.
//!
//! # Error Handling Strategy
//!
//! - Use `RunwayError` for domain-specific errors that need distinct handling
//! - Use `anyhow::Error` (via `RunwayError::Other`) for unexpected errors
//! - Environment resolution returns errors to its caller and never logs them

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for Runway operations.
#[derive(Debug, Error)]
pub enum RunwayError {
    /// An environment declaration could not be decomposed into a key/value pair.
    #[error("Malformed environment declaration ({key}): {message}")]
    MalformedDeclaration { key: String, message: String },

    /// An environment declaration carries an option that cannot be parsed.
    #[error("Invalid option '{option}' for environment declaration ({key}): {message}")]
    InvalidOption {
        key: String,
        option: String,
        message: String,
    },

    /// The secret inventory could not be loaded.
    #[error("Failed to load secret inventory at {path}: {message}")]
    Inventory { path: PathBuf, message: String },

    /// The envfile could not be loaded.
    #[error("Failed to load envfile at {path}: {message}")]
    EnvFile { path: PathBuf, message: String },

    /// Invalid runner settings.
    #[error("Invalid settings: {message}")]
    Settings { message: String },

    /// A step process could not be started or waited on.
    #[error("Command failed with exit code {code:?}: {command}")]
    CommandFailed { command: String, code: Option<i32> },

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic wrapped error for anyhow interop.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias for Runway operations.
pub type Result<T> = std::result::Result<T, RunwayError>;
