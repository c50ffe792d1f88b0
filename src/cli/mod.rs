//! Command line interface for mpr.
//!
//! Argument parsing, colored output, and the command implementations that
//! drive the version coordinator and release orchestrator.

mod args;
pub mod commands;
mod output;

pub use args::{Args, Command, ReleaseCommand, RuntimeConfig, VersionCommand};
pub use commands::execute_command;
pub use output::OutputManager;

use crate::error::Result;

/// Main CLI entry point
pub async fn run() -> Result<i32> {
    let args = Args::parse_args();
    execute_command(args).await
}
