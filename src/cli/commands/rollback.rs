//! Rollback command implementation.
//!
//! Restores every repository recorded in the most recent backup folder:
//! manifest bytes, HEAD revision, lock file, and tags created since.

use crate::cli::RuntimeConfig;
use crate::error::{CliError, Result};
use crate::ports::SystemPorts;
use crate::release::ReleaseOrchestrator;

use super::helpers::prompt_confirmation;

/// Execute `release rollback`
pub(super) async fn execute_rollback(confirm: bool, config: &RuntimeConfig) -> Result<i32> {
    let workspace = config.load_workspace()?;
    let ports = SystemPorts::system(&workspace.config.settings);
    let orchestrator = ReleaseOrchestrator::new(workspace, ports);

    if !confirm && !prompt_confirmation("Restore every repository from the latest backup?")? {
        return Err(CliError::Cancelled {
            operation: "rollback".to_string(),
        }
        .into());
    }

    config.println("📦 Rolling back to the latest backup...");
    let report = orchestrator.rollback().await?;

    if let Some(folder) = &report.folder {
        config.verbose_println(&format!("Backup folder: {}", folder.display()));
    }
    for restore in &report.restored {
        config.success_println(&format!("Restored {}", restore.repository));
        if let Err(reason) = &restore.lock {
            config.warning_println(&format!(
                "Lock file for {} could not be regenerated: {}",
                restore.repository, reason
            ));
        }
        for tag in &restore.deleted_tags {
            config.indent(&format!("deleted tag {}", tag));
        }
    }
    for (name, error) in &report.failures {
        config.error_println(&format!("Failed to restore {}: {}", name, error));
    }

    if report.success() {
        config.success_println("Rollback completed");
        Ok(0)
    } else {
        config.warning_println("Rollback completed with failures");
        Ok(1)
    }
}
