//! Version bump, status, and sync commands.

use crate::cli::{RuntimeConfig, VersionCommand};
use crate::error::{CliError, Result};
use crate::git::VcsOperations;
use crate::manifest::ManifestOperations;
use crate::ports::SystemPorts;
use crate::testing::{TestOperations, TestOutcome};
use crate::version::{BumpRequest, CascadeOutcome, SyncMismatch, VersionCoordinator};

use super::helpers::prompt_confirmation;

/// Execute a `version` subcommand
pub(super) async fn execute_version(action: &VersionCommand, config: &RuntimeConfig) -> Result<i32> {
    let workspace = config.load_workspace()?;
    let ports = SystemPorts::system(&workspace.config.settings);
    let coordinator = VersionCoordinator::new(workspace, ports);

    match action {
        VersionCommand::Bump {
            repository,
            bump_type,
            alpha,
            dry_run,
            no_update_dependents,
            dependents_bump,
            no_validate,
        } => {
            let request = BumpRequest {
                repository: repository.clone(),
                kind: *bump_type,
                alpha: *alpha,
                dependents_kind: *dependents_bump,
                dry_run: *dry_run,
                update_dependents: !no_update_dependents,
                validate: !no_validate,
            };
            bump(&coordinator, request, config).await
        }
        VersionCommand::Status {
            repository,
            show_dependents,
        } => status(&coordinator, repository.as_deref(), *show_dependents, config),
        VersionCommand::Sync { dry_run, force } => sync(&coordinator, *dry_run, *force, config),
    }
}

async fn bump<M, V, T>(
    coordinator: &VersionCoordinator<M, V, T>,
    request: BumpRequest,
    config: &RuntimeConfig,
) -> Result<i32>
where
    M: ManifestOperations,
    V: VcsOperations,
    T: TestOperations + 'static,
{
    let dry_run = request.dry_run;
    if dry_run {
        config.warning_println("DRY RUN MODE - No changes will be made");
    }

    let report = coordinator.bump_repository(request).await?;

    let verb = if dry_run { "Would bump" } else { "Bumped" };
    config.success_println(&format!(
        "{} {}: {} → {}",
        verb, report.repository, report.old_version, report.new_version
    ));

    for step in &report.dependents {
        match &step.outcome {
            CascadeOutcome::Bumped { .. } => config.indent(&format!(
                "{} {}: {} → {}",
                verb,
                step.repository,
                step.old_version.as_deref().unwrap_or("?"),
                step.new_version.as_deref().unwrap_or("?")
            )),
            CascadeOutcome::AlreadyCurrent => {
                config.indent(&format!("{} already at correct version", step.repository))
            }
            CascadeOutcome::Skipped { reason } => {
                config.verbose_println(&format!("Skipped {}: {}", step.repository, reason))
            }
            CascadeOutcome::Failed { error } => {
                config.warning_println(&format!("Failed to update {}: {}", step.repository, error))
            }
        }
    }

    for (name, outcome) in &report.validation {
        match outcome {
            TestOutcome::NoneFound => config.indent(&format!("{}: no tests found", name)),
            _ => config.indent(&format!("{}: tests passed", name)),
        }
    }

    Ok(0)
}

fn status<M, V, T>(
    coordinator: &VersionCoordinator<M, V, T>,
    repository: Option<&str>,
    show_dependents: bool,
    config: &RuntimeConfig,
) -> Result<i32>
where
    M: ManifestOperations,
    V: VcsOperations,
    T: TestOperations + 'static,
{
    let status = coordinator.status(repository)?;

    config.section("Version Status");
    let mut rows = vec![vec![
        "Repository".to_string(),
        "Package".to_string(),
        "Version".to_string(),
        "Alpha".to_string(),
    ]];
    for repo in &status.repositories {
        let version = if repo.exists {
            repo.current_version
                .clone()
                .unwrap_or_else(|| "unknown".to_string())
        } else {
            "missing".to_string()
        };
        rows.push(vec![
            repo.name.clone(),
            repo.package_name.clone(),
            version,
            (if repo.is_alpha { "yes" } else { "" }).to_string(),
        ]);
    }
    let _ = config.output().table(&rows);

    for repo in &status.repositories {
        if repo.dependencies.is_empty() && !(show_dependents && !repo.dependents.is_empty()) {
            continue;
        }
        config.println(&format!("\n{}:", repo.name));
        for dep in &repo.dependencies {
            let requirement = dep
                .requirement
                .as_ref()
                .map(|r| r.to_string())
                .unwrap_or_else(|| "not declared".to_string());
            let marker = match dep.compatible {
                Some(true) => "✓",
                Some(false) => "✗",
                None => "-",
            };
            config.indent(&format!(
                "{} {} {} (current {})",
                marker,
                dep.package,
                requirement,
                dep.current_version.as_deref().unwrap_or("unknown")
            ));
        }
        if show_dependents && !repo.dependents.is_empty() {
            config.indent(&format!("dependents: {}", repo.dependents.join(", ")));
        }
    }

    if !status.history.is_empty() {
        config.section("Recent Version Changes");
        for entry in status.history.iter().rev() {
            config.indent(&format!(
                "{} {}: {} → {} ({}{})",
                entry.timestamp.format("%Y-%m-%d %H:%M"),
                entry.repository,
                entry.old_version,
                entry.new_version,
                entry.bump_type,
                if entry.is_alpha { ", alpha" } else { "" }
            ));
        }
    }

    Ok(0)
}

fn sync<M, V, T>(
    coordinator: &VersionCoordinator<M, V, T>,
    dry_run: bool,
    force: bool,
    config: &RuntimeConfig,
) -> Result<i32>
where
    M: ManifestOperations,
    V: VcsOperations,
    T: TestOperations + 'static,
{
    config.section("Synchronizing Dependency Versions");
    if dry_run {
        config.warning_println("DRY RUN MODE - No changes will be made");
    }

    let report = coordinator.sync_dependency_versions(dry_run, force, |mismatches| {
        print_mismatches(config, mismatches);
        prompt_confirmation("Proceed with updates?").unwrap_or(false)
    })?;

    if report.mismatches.is_empty() {
        config.success_println("All dependency versions are already synchronized");
        return Ok(0);
    }
    if dry_run || force {
        print_mismatches(config, &report.mismatches);
    }
    if report.cancelled {
        return Err(CliError::Cancelled {
            operation: "version sync".to_string(),
        }
        .into());
    }
    for (name, error) in &report.failures {
        config.error_println(&format!("Failed to update {}: {}", name, error));
    }

    if dry_run {
        return Ok(0);
    }
    let updated = report.mismatches.len().saturating_sub(report.failures.len());
    if report.success() {
        config.success_println(&format!(
            "Successfully updated {}/{} dependencies",
            updated,
            report.mismatches.len()
        ));
        Ok(0)
    } else {
        config.warning_println(&format!(
            "Updated {}/{} dependencies",
            updated,
            report.mismatches.len()
        ));
        Ok(1)
    }
}

fn print_mismatches(config: &RuntimeConfig, mismatches: &[SyncMismatch]) {
    config.println(&format!("Found {} dependencies to update:", mismatches.len()));
    for m in mismatches {
        config.indent(&format!(
            "{}: {} {} → {}",
            m.repository,
            m.package,
            m.current_requirement,
            m.new_requirement()
        ));
    }
}
