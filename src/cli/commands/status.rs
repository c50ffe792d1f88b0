//! Release status command implementation.
//!
//! Shows each repository's current version, last release tag, and whether
//! it has uncommitted changes.

use crate::cli::RuntimeConfig;
use crate::error::Result;
use crate::ports::SystemPorts;
use crate::release::ReleaseOrchestrator;

/// Execute `release status`
pub(super) async fn execute_status(config: &RuntimeConfig) -> Result<i32> {
    let workspace = config.load_workspace()?;
    config.verbose_println(&format!("Workspace: {}", workspace.root.display()));

    let ports = SystemPorts::system(&workspace.config.settings);
    let orchestrator = ReleaseOrchestrator::new(workspace, ports);
    let statuses = orchestrator.status().await;

    config.section("Release Status");
    let mut rows = vec![vec![
        "Repository".to_string(),
        "Version".to_string(),
        "Last tag".to_string(),
        "Changes".to_string(),
    ]];
    for status in statuses {
        if !status.exists {
            rows.push(vec![
                status.name,
                "-".to_string(),
                "-".to_string(),
                "missing".to_string(),
            ]);
            continue;
        }
        rows.push(vec![
            status.name,
            status.current_version.unwrap_or_else(|| "unknown".to_string()),
            status.last_tag.unwrap_or_else(|| "none".to_string()),
            if status.pending_changes {
                "pending".to_string()
            } else {
                "clean".to_string()
            },
        ]);
    }
    let _ = config.output().table(&rows);

    Ok(0)
}
