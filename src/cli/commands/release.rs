//! Release create command implementation.

use crate::cli::{ReleaseCommand, RuntimeConfig};
use crate::error::Result;
use crate::ports::SystemPorts;
use crate::release::{ReleaseOrchestrator, ReleaseReport, ReleaseRequest, RepoOutcome};
use crate::version::CascadeOutcome;

use super::helpers::parse_repo_versions;

/// Execute `release create`
pub(super) async fn execute_create(action: &ReleaseCommand, config: &RuntimeConfig) -> Result<i32> {
    let ReleaseCommand::Create {
        stage,
        repositories,
        version,
        repo_versions,
        dry_run,
        skip_tests,
        force,
        parallel,
    } = action
    else {
        unreachable!("execute_create called with non-Create command");
    };

    let workspace = config.load_workspace()?;
    let request = ReleaseRequest {
        stage: *stage,
        repositories: (!repositories.is_empty()).then(|| repositories.clone()),
        version: version.clone(),
        repository_versions: parse_repo_versions(repo_versions.as_deref())?,
        dry_run: *dry_run,
        skip_tests: *skip_tests,
        force: *force,
        parallel: *parallel,
    };

    if *dry_run {
        config.warning_println("Running in DRY RUN mode - no changes will be made");
    }
    config.println(&format!("🚀 Starting {} release", stage));

    let ports = SystemPorts::system(&workspace.config.settings);
    let mut orchestrator = ReleaseOrchestrator::new(workspace, ports);
    let report = orchestrator.create_release(request).await?;

    print_report(config, &report);

    if report.success {
        config.success_println(&format!(
            "{} release completed successfully",
            report.stage.to_string().to_uppercase()
        ));
        Ok(0)
    } else {
        config.error_println(&format!(
            "{} release failed",
            report.stage.to_string().to_uppercase()
        ));
        Ok(1)
    }
}

fn print_report(config: &RuntimeConfig, report: &ReleaseReport) {
    if let Some(folder) = &report.backup_folder {
        config.verbose_println(&format!("Backups saved to {}", folder.display()));
    }

    config.section("Release Summary");
    let mut rows = vec![vec![
        "Repository".to_string(),
        "Status".to_string(),
        "Version".to_string(),
        "Note".to_string(),
    ]];
    for repo in &report.repositories {
        let note = match &repo.outcome {
            Some(RepoOutcome::AlreadyReleased) => "already released".to_string(),
            Some(RepoOutcome::WouldRelease) => "dry run".to_string(),
            Some(RepoOutcome::Failed { error }) => error.clone(),
            Some(RepoOutcome::Released) | None => String::new(),
        };
        rows.push(vec![
            repo.name.clone(),
            repo.status.to_string(),
            repo.version.clone().unwrap_or_else(|| "-".to_string()),
            note,
        ]);
    }
    let _ = config.output().table(&rows);

    if !report.cascade.is_empty() {
        config.section("Dependent Repositories");
        for step in &report.cascade {
            match &step.outcome {
                CascadeOutcome::Bumped { .. } => config.success_println(&format!(
                    "{}: {} → {}",
                    step.repository,
                    step.old_version.as_deref().unwrap_or("?"),
                    step.new_version.as_deref().unwrap_or("?")
                )),
                CascadeOutcome::AlreadyCurrent => config.success_println(&format!(
                    "{} already at correct version",
                    step.repository
                )),
                CascadeOutcome::Skipped { reason } => {
                    config.indent(&format!("{}: {}", step.repository, reason))
                }
                CascadeOutcome::Failed { error } => {
                    config.error_println(&format!("Failed to update {}: {}", step.repository, error))
                }
            }
        }
    }

    for tag in &report.tagged {
        config.success_println(&format!("Tagged {}", tag));
    }

    if !report.integration_failures.is_empty() {
        config.error_println(&format!(
            "Integration tests failed for: {}",
            report.integration_failures.join(", ")
        ));
    }

    if !report.restored.is_empty() || !report.restore_failures.is_empty() {
        config.section("Rollback");
        for restore in &report.restored {
            config.success_println(&format!("Restored {}", restore.repository));
        }
        for (name, error) in &report.restore_failures {
            config.error_println(&format!("Failed to restore {}: {}", name, error));
        }
    }
}
