//! Propagation of new versions to transitive dependents.
//!
//! The closure of dependents is collected breadth-first and then walked in
//! dependency order, so every dependent sees the final versions of all the
//! repositories it depends on and is visited exactly once, diamonds included.

use crate::error::{Result, VersionError};
use crate::git::VcsOperations;
use crate::manifest::{self, LockMode, ManifestOperations, RewriteOutcome};
use crate::version::{SemanticVersion, VersionBump};
use crate::workspace::{DependencyGraph, RepositoryDescriptor, WorkspaceInfo};
use std::collections::HashMap;

/// How dependents are treated
#[derive(Debug, Clone, Copy)]
pub struct CascadePolicy {
    /// Bump kind applied to dependents (always into alpha)
    pub bump: VersionBump,
    /// Bump only when a requirement's content actually changed
    pub require_change: bool,
    /// Commit the manifest of each bumped dependent
    pub commit: bool,
    /// Attempt a fast relock after rewriting
    pub relock: bool,
    /// Report only, touch nothing
    pub dry_run: bool,
}

impl CascadePolicy {
    /// Policy for the post-release dependent update
    pub fn release() -> Self {
        Self {
            bump: VersionBump::Patch,
            require_change: true,
            commit: true,
            relock: false,
            dry_run: false,
        }
    }

    /// Policy for a single-repository version bump.
    ///
    /// Dependents land in alpha whatever alpha flag the bumped repository used.
    pub fn bump(kind: VersionBump, dry_run: bool) -> Self {
        Self {
            bump: kind,
            require_change: false,
            commit: false,
            relock: true,
            dry_run,
        }
    }
}

/// What happened to one dependent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CascadeOutcome {
    /// Requirements rewritten and version bumped
    Bumped {
        /// Whether a commit was created
        committed: bool,
    },
    /// Nothing left to change
    AlreadyCurrent,
    /// Not processed
    Skipped {
        /// Why
        reason: String,
    },
    /// Processing failed
    Failed {
        /// Error message
        error: String,
    },
}

/// One dependent's step in a cascade
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CascadeStep {
    /// Dependent repository
    pub repository: String,
    /// Version before the cascade
    pub old_version: Option<String>,
    /// Version assigned by the cascade
    pub new_version: Option<String>,
    /// `(package, version)` requirements rewritten
    pub updated: Vec<(String, String)>,
    /// Outcome
    pub outcome: CascadeOutcome,
}

impl CascadeStep {
    fn new(repository: &str) -> Self {
        Self {
            repository: repository.to_string(),
            old_version: None,
            new_version: None,
            updated: Vec::new(),
            outcome: CascadeOutcome::AlreadyCurrent,
        }
    }

    /// Whether the dependent received a new version
    pub fn bumped(&self) -> bool {
        matches!(self.outcome, CascadeOutcome::Bumped { .. })
    }
}

/// Commit message for a cascaded dependent
pub fn commit_message(updated: &[(String, String)], new_version: &str) -> String {
    let deps = updated
        .iter()
        .map(|(package, version)| format!("{}@{}", package, version))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "Update dependencies: {}; bump version to {}",
        deps, new_version
    )
}

/// Push `roots` (repository name, new version) through every transitive dependent.
///
/// Fails only when the graph is cyclic; per-dependent problems are recorded in
/// the returned steps and the walk continues.
pub async fn cascade<M, V>(
    workspace: &WorkspaceInfo,
    graph: &DependencyGraph,
    manifest: &M,
    vcs: &V,
    roots: &[(String, String)],
    policy: CascadePolicy,
) -> Result<Vec<CascadeStep>>
where
    M: ManifestOperations,
    V: VcsOperations,
{
    let root_names: Vec<String> = roots.iter().map(|(name, _)| name.clone()).collect();
    let closure = graph.find_all_dependents(&root_names);
    let order = graph.processing_order(&closure)?;

    let mut assigned: HashMap<String, String> = roots.iter().cloned().collect();
    let mut steps = Vec::with_capacity(order.len());

    for name in order {
        let Some(repo) = workspace.repository(&name) else {
            continue;
        };
        let mut step = CascadeStep::new(&name);

        if !repo.exists {
            step.outcome = CascadeOutcome::Skipped {
                reason: "repository checkout missing".to_string(),
            };
            steps.push(step);
            continue;
        }

        match cascade_one(workspace, graph, manifest, vcs, repo, &assigned, policy, &mut step).await
        {
            Ok(()) => {
                if let Some(version) = &step.new_version
                    && step.bumped()
                {
                    assigned.insert(name.clone(), version.clone());
                }
            }
            Err(e) => {
                log::warn!("Failed to update dependent '{}': {}", name, e);
                step.outcome = CascadeOutcome::Failed {
                    error: e.to_string(),
                };
            }
        }
        steps.push(step);
    }

    Ok(steps)
}

#[allow(clippy::too_many_arguments)]
async fn cascade_one<M, V>(
    workspace: &WorkspaceInfo,
    graph: &DependencyGraph,
    manifest: &M,
    vcs: &V,
    repo: &RepositoryDescriptor,
    assigned: &HashMap<String, String>,
    policy: CascadePolicy,
    step: &mut CascadeStep,
) -> Result<()>
where
    M: ManifestOperations,
    V: VcsOperations,
{
    let mut touched = false;
    let mut declared = false;

    for dependency in graph.dependencies(&repo.name) {
        let (Some(version), Some(dep_repo)) =
            (assigned.get(&dependency), workspace.repository(&dependency))
        else {
            continue;
        };

        let package = dep_repo.package_name.as_str();
        let outcome = if policy.dry_run {
            manifest::preview_rewrite(manifest, repo, package, version)?
        } else {
            manifest::rewrite_requirement(manifest, repo, package, version)?
        };

        match outcome {
            RewriteOutcome::Changed { .. } => {
                touched = true;
                declared = true;
                step.updated.push((package.to_string(), version.clone()));
            }
            RewriteOutcome::Unchanged | RewriteOutcome::PathDependency => {
                declared = true;
                if !policy.require_change {
                    touched = true;
                }
            }
            RewriteOutcome::Missing => log::warn!(
                "'{}' declares no requirement on '{}' in its manifest",
                repo.name,
                package
            ),
        }
    }

    if !touched {
        step.outcome = if declared {
            CascadeOutcome::AlreadyCurrent
        } else {
            CascadeOutcome::Skipped {
                reason: "no requirement to update".to_string(),
            }
        };
        return Ok(());
    }

    let current = manifest
        .get_version(repo)?
        .ok_or_else(|| VersionError::Unavailable {
            repository: repo.name.clone(),
        })?;
    let new_version = SemanticVersion::parse(&current)?
        .bump(policy.bump, true)
        .to_string();
    step.old_version = Some(current);
    step.new_version = Some(new_version.clone());

    if policy.dry_run {
        step.outcome = CascadeOutcome::Bumped { committed: false };
        return Ok(());
    }

    manifest.set_version(repo, &new_version)?;
    log::info!("Cascaded '{}' to {}", repo.name, new_version);

    if policy.relock
        && let Err(e) = manifest.lock(repo, LockMode::Fast).await
    {
        log::warn!("Failed to update lock file for '{}': {}", repo.name, e);
    }

    let mut committed = false;
    if policy.commit {
        if vcs.working_tree_clean(repo).await? {
            step.outcome = CascadeOutcome::AlreadyCurrent;
            return Ok(());
        }
        let message = commit_message(&step.updated, &new_version);
        committed = vcs
            .commit(repo, &[manifest.manifest_path(repo)], &message)
            .await?;
    }

    step.outcome = CascadeOutcome::Bumped { committed };
    Ok(())
}
