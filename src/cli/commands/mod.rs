//! CLI command implementations.
//!
//! Each command implements the [`Command`] trait, which provides a uniform
//! interface for executing commands and reporting results.
//!
//! Commands are dispatched via [`CommandDispatcher`], which routes CLI
//! subcommands (`runway exec`, `runway envs`) to their implementations.

pub mod dispatcher;
pub mod envs;
pub mod exec;

pub use dispatcher::{Command, CommandDispatcher, CommandResult};
