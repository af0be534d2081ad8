//! CLI argument definitions.
//!
//! This module defines all CLI arguments using clap's derive macros.
//! The main entry point is the [`Cli`] struct.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Runway - step execution with scoped envs, secret redaction and hang detection.
#[derive(Debug, Parser)]
#[command(name = "runway")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run a program as a single workflow step
    Exec(ExecArgs),

    /// Resolve environment declarations and show what they do
    Envs(EnvsArgs),
}

/// Arguments for the `exec` command.
#[derive(Debug, Clone, clap::Args)]
pub struct ExecArgs {
    /// Secret inventory file
    #[arg(long, value_name = "FILE", env = "RUNWAY_INVENTORY")]
    pub inventory: Option<PathBuf>,

    /// Runner settings file
    #[arg(long, value_name = "FILE", env = "RUNWAY_SETTINGS")]
    pub settings: Option<PathBuf>,

    /// Abort after this many seconds without output
    #[arg(long, value_name = "SECS")]
    pub hang_timeout: Option<u64>,

    /// Abort after this many seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Redact secrets from output (true or false)
    #[arg(long, value_name = "BOOL")]
    pub secret_filtering: Option<bool>,

    /// Workflow id exposed to the step
    #[arg(long, default_value = "exec")]
    pub workflow: String,

    /// Step title (defaults to the program name)
    #[arg(long)]
    pub title: Option<String>,

    /// Program and arguments to run
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

/// Arguments for the `envs` command.
#[derive(Debug, Clone, clap::Args)]
pub struct EnvsArgs {
    /// Secret inventory file, resolved before the declarations
    #[arg(long, value_name = "FILE")]
    pub inventory: Option<PathBuf>,

    /// YAML list of environment declarations
    #[arg(long, value_name = "FILE")]
    pub decl: PathBuf,
}
