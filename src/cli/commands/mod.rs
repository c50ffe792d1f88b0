//! Command execution.
//!
//! Each command returns its exit code; errors are reported here with their
//! recovery suggestions and mapped to exit code 1.

mod helpers;
mod release;
mod rollback;
mod status;
mod version;

use crate::cli::{Args, Command, ReleaseCommand, RuntimeConfig};
use crate::error::Result;

use release::execute_create;
use rollback::execute_rollback;
use status::execute_status;
use version::execute_version;

/// Execute the parsed command and return the process exit code
pub async fn execute_command(args: Args) -> Result<i32> {
    let config = RuntimeConfig::from(&args);

    let result = match &args.command {
        Command::Release { action } => match action {
            ReleaseCommand::Create { .. } => execute_create(action, &config).await,
            ReleaseCommand::Status => execute_status(&config).await,
            ReleaseCommand::Rollback { confirm } => execute_rollback(*confirm, &config).await,
        },
        Command::Version { action } => execute_version(action, &config).await,
    };

    match result {
        Ok(exit_code) => Ok(exit_code),
        Err(e) => {
            helpers::report_error(&config, args.command.name(), &e);
            Ok(1)
        }
    }
}
