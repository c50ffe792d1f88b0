//! Single-repository version bumps with cascading dependent updates.

use crate::error::{ConfigError, Result, TestError, VersionError};
use crate::git::VcsOperations;
use crate::manifest::{self, ManifestOperations, Requirement, RewriteOutcome};
use crate::ports::Ports;
use crate::testing::{self, TestOperations, TestOutcome, TestSuite};
use crate::version::cascade::{self, CascadePolicy, CascadeStep};
use crate::version::{
    SemanticVersion, VersionBump, VersionHistory, VersionHistoryEntry, is_compatible,
};
use crate::workspace::{DependencyGraph, RepositoryDescriptor, SharedWorkspaceInfo};
use chrono::Utc;

/// Number of ledger entries shown by [`VersionCoordinator::status`]
const STATUS_HISTORY_ENTRIES: usize = 10;

/// Parameters of a single-repository bump
#[derive(Debug, Clone)]
pub struct BumpRequest {
    /// Repository to bump
    pub repository: String,
    /// Bump kind for the repository itself
    pub kind: VersionBump,
    /// Produce (or advance) an alpha pre-release
    pub alpha: bool,
    /// Bump kind applied to cascaded dependents
    pub dependents_kind: VersionBump,
    /// Report only
    pub dry_run: bool,
    /// Cascade the new version to transitive dependents
    pub update_dependents: bool,
    /// Run the unit suite of every affected repository afterwards
    pub validate: bool,
}

impl BumpRequest {
    /// Request with the command-line defaults: cascade as patch, validate
    pub fn new(repository: impl Into<String>, kind: VersionBump) -> Self {
        Self {
            repository: repository.into(),
            kind,
            alpha: false,
            dependents_kind: VersionBump::Patch,
            dry_run: false,
            update_dependents: true,
            validate: true,
        }
    }
}

/// What a bump did (or would do, for a dry run)
#[derive(Debug, Clone)]
pub struct BumpReport {
    /// Repository that was bumped
    pub repository: String,
    /// Version before the bump
    pub old_version: String,
    /// Version after the bump
    pub new_version: String,
    /// Cascade steps in processing order
    pub dependents: Vec<CascadeStep>,
    /// Whether anything was written
    pub dry_run: bool,
    /// Unit-suite outcome per validated repository
    pub validation: Vec<(String, TestOutcome)>,
}

impl BumpReport {
    /// Dependents that received a new version, with that version
    pub fn bumped_dependents(&self) -> Vec<(&str, &str)> {
        self.dependents
            .iter()
            .filter(|s| s.bumped())
            .filter_map(|s| Some((s.repository.as_str(), s.new_version.as_deref()?)))
            .collect()
    }
}

/// One out-of-date requirement found by [`VersionCoordinator::sync_dependency_versions`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncMismatch {
    /// Repository holding the requirement
    pub repository: String,
    /// Required package
    pub package: String,
    /// Requirement as currently written
    pub current_requirement: String,
    /// Actual version of the required package
    pub actual_version: String,
}

impl SyncMismatch {
    /// Requirement the sync writes
    pub fn new_requirement(&self) -> String {
        manifest::caret(&self.actual_version)
    }
}

/// Result of a sync run
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    /// Every mismatch found, in dependency order
    pub mismatches: Vec<SyncMismatch>,
    /// Whether the rewrite was declined
    pub cancelled: bool,
    /// Per-mismatch rewrite failures `(repository, error)`
    pub failures: Vec<(String, String)>,
    /// Whether this was a dry run
    pub dry_run: bool,
}

impl SyncReport {
    /// Whether every mismatch was resolved (or would be, for a dry run)
    pub fn success(&self) -> bool {
        !self.cancelled && self.failures.is_empty()
    }
}

/// A managed requirement as seen by `version status`
#[derive(Debug, Clone)]
pub struct DependencyStatus {
    /// Dependency repository
    pub repository: String,
    /// Package name
    pub package: String,
    /// Requirement in the manifest, `None` when undeclared
    pub requirement: Option<Requirement>,
    /// Actual version of the dependency
    pub current_version: Option<String>,
    /// Whether the requirement admits the actual version; `None` for path requirements
    pub compatible: Option<bool>,
}

/// Version status of one repository
#[derive(Debug, Clone)]
pub struct RepositoryVersionStatus {
    /// Repository name
    pub name: String,
    /// Package name
    pub package_name: String,
    /// Whether the checkout exists
    pub exists: bool,
    /// Current version, when readable
    pub current_version: Option<String>,
    /// Whether the current version is an alpha
    pub is_alpha: bool,
    /// Managed dependencies
    pub dependencies: Vec<DependencyStatus>,
    /// Direct dependents
    pub dependents: Vec<String>,
}

/// Output of `version status`
#[derive(Debug, Clone)]
pub struct VersionStatus {
    /// Per-repository status
    pub repositories: Vec<RepositoryVersionStatus>,
    /// Recent ledger entries, oldest first
    pub history: Vec<VersionHistoryEntry>,
}

/// Coordinates versions across the workspace
pub struct VersionCoordinator<M, V, T> {
    workspace: SharedWorkspaceInfo,
    ports: Ports<M, V, T>,
    graph: DependencyGraph,
    history: VersionHistory,
}

impl<M, V, T> VersionCoordinator<M, V, T>
where
    M: ManifestOperations,
    V: VcsOperations,
    T: TestOperations + 'static,
{
    /// Create a coordinator for a loaded workspace
    pub fn new(workspace: SharedWorkspaceInfo, ports: Ports<M, V, T>) -> Self {
        let graph = DependencyGraph::build(&workspace);
        let history = VersionHistory::new(
            workspace.history_path(),
            workspace.config.settings.history_limit,
        );
        Self {
            workspace,
            ports,
            graph,
            history,
        }
    }

    /// The version-history ledger
    pub fn history(&self) -> &VersionHistory {
        &self.history
    }

    fn current_version(&self, repo: &RepositoryDescriptor) -> Result<SemanticVersion> {
        let raw = self
            .ports
            .manifest
            .get_version(repo)
            .ok()
            .flatten()
            .ok_or_else(|| VersionError::Unavailable {
                repository: repo.name.clone(),
            })?;
        SemanticVersion::parse(&raw).map_err(|_| {
            VersionError::Unavailable {
                repository: repo.name.clone(),
            }
            .into()
        })
    }

    /// Bump one repository and, optionally, every transitive dependent
    pub async fn bump_repository(&self, request: BumpRequest) -> Result<BumpReport> {
        let repo = self.workspace.require_repository(&request.repository)?;
        // Surface a cyclic configuration before anything is written
        self.graph.topological_order()?;

        let current = self.current_version(repo)?;
        let new_version = current.bump(request.kind, request.alpha).to_string();
        log::info!(
            "Bumping '{}' {} -> {}{}",
            repo.name,
            current,
            new_version,
            if request.dry_run { " (dry run)" } else { "" }
        );

        if !request.dry_run {
            self.ports.manifest.set_version(repo, &new_version)?;
        }

        let dependents = if request.update_dependents {
            let roots = [(repo.name.clone(), new_version.clone())];
            cascade::cascade(
                &self.workspace,
                &self.graph,
                self.ports.manifest.as_ref(),
                self.ports.vcs.as_ref(),
                &roots,
                CascadePolicy::bump(request.dependents_kind, request.dry_run),
            )
            .await?
        } else {
            Vec::new()
        };

        let mut report = BumpReport {
            repository: repo.name.clone(),
            old_version: current.to_string(),
            new_version,
            dependents,
            dry_run: request.dry_run,
            validation: Vec::new(),
        };

        if request.dry_run {
            return Ok(report);
        }

        self.history.append(VersionHistoryEntry {
            timestamp: Utc::now(),
            repository: report.repository.clone(),
            old_version: report.old_version.clone(),
            new_version: report.new_version.clone(),
            bump_type: request.kind,
            is_alpha: request.alpha,
            dependents_updated: report
                .bumped_dependents()
                .into_iter()
                .map(|(name, _)| name.to_string())
                .collect(),
        })?;

        if request.validate {
            report.validation = self.validate(&report).await?;
        }

        Ok(report)
    }

    async fn validate(&self, report: &BumpReport) -> Result<Vec<(String, TestOutcome)>> {
        let mut affected = vec![report.repository.as_str()];
        affected.extend(report.bumped_dependents().into_iter().map(|(name, _)| name));
        let repos: Vec<RepositoryDescriptor> = affected
            .into_iter()
            .filter_map(|name| self.workspace.repository(name).cloned())
            .collect();

        let results = testing::run_batch(
            std::sync::Arc::clone(&self.ports.tests),
            repos,
            TestSuite::Unit,
            self.workspace.config.settings.parallel_jobs,
        )
        .await?;

        let mut outcomes = Vec::with_capacity(results.len());
        for (name, result) in results {
            match result? {
                TestOutcome::Failed { output } => {
                    return Err(TestError::Failed {
                        repository: name,
                        output,
                    }
                    .into());
                }
                outcome => outcomes.push((name, outcome)),
            }
        }
        Ok(outcomes)
    }

    /// Point every managed requirement at its dependency's actual version.
    ///
    /// `confirm` is asked before rewriting unless `force` or `dry_run` is set.
    pub fn sync_dependency_versions<F>(
        &self,
        dry_run: bool,
        force: bool,
        confirm: F,
    ) -> Result<SyncReport>
    where
        F: FnOnce(&[SyncMismatch]) -> bool,
    {
        let order = self.graph.topological_order()?;
        let mut report = SyncReport {
            dry_run,
            ..SyncReport::default()
        };

        for name in &order {
            let Some(repo) = self.workspace.repository(name).filter(|r| r.exists) else {
                continue;
            };
            for dependency in self.graph.dependencies(name) {
                let Some(dep_repo) = self.workspace.repository(&dependency).filter(|r| r.exists)
                else {
                    continue;
                };
                let Ok(actual) = self.current_version(dep_repo) else {
                    continue;
                };
                let Some(requirement) = self
                    .ports
                    .manifest
                    .get_dependency(repo, &dep_repo.package_name)?
                else {
                    continue;
                };
                let Some(required) = requirement.version() else {
                    continue;
                };

                // Build metadata never reaches a requirement
                let actual = SemanticVersion {
                    build: None,
                    ..actual
                }
                .to_string();
                if required.trim_start_matches(['^', '~', '=']) != actual {
                    report.mismatches.push(SyncMismatch {
                        repository: repo.name.clone(),
                        package: dep_repo.package_name.clone(),
                        current_requirement: required.to_string(),
                        actual_version: actual,
                    });
                }
            }
        }

        if report.mismatches.is_empty() || dry_run {
            return Ok(report);
        }

        if !force && !confirm(&report.mismatches) {
            report.cancelled = true;
            return Ok(report);
        }

        for mismatch in &report.mismatches {
            let result = self
                .workspace
                .require_repository(&mismatch.repository)
                .and_then(|repo| {
                    manifest::rewrite_requirement(
                        self.ports.manifest.as_ref(),
                        repo,
                        &mismatch.package,
                        &mismatch.actual_version,
                    )
                });
            match result {
                Ok(RewriteOutcome::Missing) => report.failures.push((
                    mismatch.repository.clone(),
                    format!("'{}' is no longer declared", mismatch.package),
                )),
                Ok(RewriteOutcome::Changed { .. }) => log::info!(
                    "Synced '{}' requirement on '{}' to {}",
                    mismatch.repository,
                    mismatch.package,
                    mismatch.new_requirement()
                ),
                Ok(RewriteOutcome::Unchanged | RewriteOutcome::PathDependency) => log::debug!(
                    "'{}' requirement on '{}' needs no rewrite",
                    mismatch.repository,
                    mismatch.package
                ),
                Err(e) => report
                    .failures
                    .push((mismatch.repository.clone(), e.to_string())),
            }
        }

        Ok(report)
    }

    /// Version status for one repository, or all of them
    pub fn status(&self, repository: Option<&str>) -> Result<VersionStatus> {
        let repos: Vec<&RepositoryDescriptor> = match repository {
            Some(name) => vec![self.workspace.repository(name).ok_or_else(|| {
                ConfigError::RepositoryNotFound {
                    name: name.to_string(),
                }
            })?],
            None => self.workspace.repositories().iter().collect(),
        };

        let mut statuses = Vec::with_capacity(repos.len());
        for repo in repos {
            statuses.push(self.repository_status(repo)?);
        }

        Ok(VersionStatus {
            repositories: statuses,
            history: self.history.recent(STATUS_HISTORY_ENTRIES, repository)?,
        })
    }

    fn repository_status(&self, repo: &RepositoryDescriptor) -> Result<RepositoryVersionStatus> {
        let mut status = RepositoryVersionStatus {
            name: repo.name.clone(),
            package_name: repo.package_name.clone(),
            exists: repo.exists,
            current_version: None,
            is_alpha: false,
            dependencies: Vec::new(),
            dependents: Vec::new(),
        };
        if !repo.exists {
            return Ok(status);
        }

        let current = self.current_version(repo).ok();
        status.is_alpha = current.as_ref().is_some_and(SemanticVersion::is_alpha);
        status.current_version = current.map(|v| v.to_string());
        status.dependents = self.graph.dependents(&repo.name);

        for dependency in self.graph.dependencies(&repo.name) {
            let Some(dep_repo) = self.workspace.repository(&dependency) else {
                continue;
            };
            let requirement = self
                .ports
                .manifest
                .get_dependency(repo, &dep_repo.package_name)?;
            let current_version = dep_repo
                .exists
                .then(|| self.current_version(dep_repo).ok())
                .flatten()
                .map(|v| v.to_string());
            let compatible = match (&requirement, &current_version) {
                (Some(req), Some(version)) => req.version().map(|r| is_compatible(r, version)),
                _ => None,
            };
            status.dependencies.push(DependencyStatus {
                repository: dep_repo.name.clone(),
                package: dep_repo.package_name.clone(),
                requirement,
                current_version,
                compatible,
            });
        }

        Ok(status)
    }
}
