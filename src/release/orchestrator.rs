//! Staged multi-repository releases.
//!
//! A run backs up every repository, releases the targets in dependency order,
//! cascades production releases to dependents, tags, runs the integration
//! suite, and restores the backups when anything failed.

use crate::error::{ConfigError, Result, TestError, VersionError};
use crate::git::{VcsOperations, tag_message, tag_name};
use crate::manifest::{self, ManifestOperations, RewriteOutcome};
use crate::pool;
use crate::ports::Ports;
use crate::release::{
    ReleaseReport, ReleaseStage, ReleaseStatus, RepoOutcome, RetryPolicy, retry_with_backoff,
};
use crate::state::{self, BackupSet, BackupStore, RestoreReport};
use crate::testing::{self, TestOperations, TestOutcome, TestSuite};
use crate::version::cascade::{self, CascadeOutcome, CascadePolicy};
use crate::workspace::{DependencyGraph, RepositoryDescriptor, SharedWorkspaceInfo, WorkspaceInfo};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Parameters of a release run
#[derive(Debug, Clone)]
pub struct ReleaseRequest {
    /// Stage to release
    pub stage: ReleaseStage,
    /// Target repositories, `None` for all
    pub repositories: Option<Vec<String>>,
    /// Base version applied to every target
    pub version: Option<String>,
    /// Per-repository base versions, overriding `version`
    pub repository_versions: BTreeMap<String, String>,
    /// Report only
    pub dry_run: bool,
    /// Skip unit and integration suites
    pub skip_tests: bool,
    /// Keep going after failures and never roll back
    pub force: bool,
    /// Release independent repositories concurrently (dev stage only)
    pub parallel: bool,
}

impl ReleaseRequest {
    /// Release every repository at `stage` with default options
    pub fn new(stage: ReleaseStage) -> Self {
        Self {
            stage,
            repositories: None,
            version: None,
            repository_versions: BTreeMap::new(),
            dry_run: false,
            skip_tests: false,
            force: false,
            parallel: false,
        }
    }

    fn base_override(&self, repository: &str) -> Option<String> {
        self.repository_versions
            .get(repository)
            .or(self.version.as_ref())
            .cloned()
    }
}

/// Release state of one repository as seen by `release status`
#[derive(Debug, Clone)]
pub struct RepositoryReleaseStatus {
    /// Repository name
    pub name: String,
    /// Whether the checkout exists
    pub exists: bool,
    /// Current manifest version
    pub current_version: Option<String>,
    /// Most recent tag reachable from HEAD
    pub last_tag: Option<String>,
    /// Whether the working tree has uncommitted changes
    pub pending_changes: bool,
}

/// Outcome of restoring the latest persisted backup
#[derive(Debug, Clone, Default)]
pub struct RollbackReport {
    /// Folder the backup was loaded from
    pub folder: Option<std::path::PathBuf>,
    /// Successful restores
    pub restored: Vec<RestoreReport>,
    /// Restores that failed `(repository, error)`
    pub failures: Vec<(String, String)>,
}

impl RollbackReport {
    /// Whether every repository was restored
    pub fn success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Per-repository parameters shared by every worker of a run
#[derive(Debug, Clone)]
struct RepoPlan {
    stage: ReleaseStage,
    base: Option<String>,
    dry_run: bool,
    skip_tests: bool,
    started_at: DateTime<Utc>,
}

/// Drives release runs for one workspace
pub struct ReleaseOrchestrator<M, V, T> {
    workspace: SharedWorkspaceInfo,
    ports: Ports<M, V, T>,
    graph: DependencyGraph,
    store: BackupStore,
    backups: BackupSet,
    retry: RetryPolicy,
}

impl<M, V, T> ReleaseOrchestrator<M, V, T>
where
    M: ManifestOperations + 'static,
    V: VcsOperations + 'static,
    T: TestOperations + 'static,
{
    /// Create an orchestrator for a loaded workspace
    pub fn new(workspace: SharedWorkspaceInfo, ports: Ports<M, V, T>) -> Self {
        let graph = DependencyGraph::build(&workspace);
        let store = BackupStore::new(workspace.backups_dir());
        Self {
            workspace,
            ports,
            graph,
            store,
            backups: BackupSet::default(),
            retry: RetryPolicy::default(),
        }
    }

    /// Snapshots taken by the last run
    pub fn backups(&self) -> &BackupSet {
        &self.backups
    }

    /// Release the requested repositories at the requested stage.
    ///
    /// Configuration problems (unknown repository, stray version key, cyclic
    /// graph) are returned as errors before anything is touched. Per-repository
    /// failures are recorded in the report.
    pub async fn create_release(&mut self, request: ReleaseRequest) -> Result<ReleaseReport> {
        let targets = self
            .workspace
            .resolve_targets(request.repositories.as_deref())?;
        if let Some(stray) = request
            .repository_versions
            .keys()
            .find(|name| !targets.contains(name))
        {
            return Err(ConfigError::VersionOutsideTargets {
                name: stray.clone(),
            }
            .into());
        }
        let order = self.graph.processing_order(&targets)?;

        log::info!(
            "Starting {} release for {:?}{}",
            request.stage,
            order,
            if request.dry_run { " (dry run)" } else { "" }
        );

        let mut report = ReleaseReport::new(request.stage, request.dry_run, &order);

        if !request.dry_run {
            self.backups = state::create_backups(
                self.ports.manifest.as_ref(),
                self.ports.vcs.as_ref(),
                self.workspace.repositories(),
            )
            .await;
            report.backup_folder = Some(self.store.persist(&self.backups)?);
        }

        let started_at = Utc::now();
        let completed = if request.parallel && request.stage == ReleaseStage::Dev {
            self.run_parallel(&order, &request, started_at, &mut report)
                .await?
        } else {
            self.run_sequential(&order, &request, started_at, &mut report)
                .await
        };
        let mut success = completed && report.all_succeeded();

        if success && request.stage.is_tagged() && !request.dry_run {
            success = self.update_dependents(&mut report).await?;
            if success {
                success = self.tag_and_push(&mut report).await;
            }
        }

        if success && !request.skip_tests && !request.dry_run {
            success = self.run_integration_tests(&targets, &mut report).await?;
        }

        if !success && !request.dry_run && !request.force {
            log::warn!("Release failed, restoring backups");
            self.restore_all(&mut report).await;
        }

        report.success = success;
        Ok(report)
    }

    fn plan(&self, request: &ReleaseRequest, name: &str, started_at: DateTime<Utc>) -> RepoPlan {
        RepoPlan {
            stage: request.stage,
            base: request.base_override(name),
            dry_run: request.dry_run,
            skip_tests: request.skip_tests,
            started_at,
        }
    }

    /// Returns `false` when a failure stopped the queue
    async fn run_sequential(
        &self,
        names: &[String],
        request: &ReleaseRequest,
        started_at: DateTime<Utc>,
        report: &mut ReleaseReport,
    ) -> bool {
        for name in names {
            let Some(repo) = self.workspace.repository(name) else {
                continue;
            };
            report.set_status(name, ReleaseStatus::InProgress);
            let plan = self.plan(request, name, started_at);
            let (version, outcome) =
                release_repository(&self.ports, &self.workspace, repo, &plan).await;
            let failed = matches!(outcome, RepoOutcome::Failed { .. });
            report.record(name, version, outcome);

            if failed {
                if request.force {
                    log::warn!("'{}' failed, continuing because of --force", name);
                } else {
                    log::error!("'{}' failed, stopping release", name);
                    return false;
                }
            }
        }
        true
    }

    /// Independent repositories run in the pool, the rest sequentially after them
    async fn run_parallel(
        &self,
        order: &[String],
        request: &ReleaseRequest,
        started_at: DateTime<Utc>,
        report: &mut ReleaseReport,
    ) -> Result<bool> {
        let (independent, dependent) = self.graph.partition_independent(order);

        let mut jobs = Vec::with_capacity(independent.len());
        for name in &independent {
            if let Some(repo) = self.workspace.repository(name) {
                report.set_status(name, ReleaseStatus::InProgress);
                jobs.push((repo.clone(), self.plan(request, name, started_at)));
            }
        }

        let ports = self.ports.clone();
        let workspace = Arc::clone(&self.workspace);
        let results = pool::run_bounded(
            jobs,
            self.workspace.config.settings.parallel_jobs,
            move |(repo, plan)| {
                let ports = ports.clone();
                let workspace = Arc::clone(&workspace);
                async move {
                    let (version, outcome) =
                        release_repository(&ports, &workspace, &repo, &plan).await;
                    (repo.name, version, outcome)
                }
            },
        )
        .await?;

        let mut any_failed = false;
        for (name, version, outcome) in results {
            any_failed |= matches!(outcome, RepoOutcome::Failed { .. });
            report.record(&name, version, outcome);
        }

        if any_failed && !request.force {
            return Ok(false);
        }

        Ok(self
            .run_sequential(&dependent, request, started_at, report)
            .await)
    }

    /// Cascade released versions to dependents; `false` when a dependent failed
    async fn update_dependents(&self, report: &mut ReleaseReport) -> Result<bool> {
        let released = report.succeeded();
        let steps = cascade::cascade(
            &self.workspace,
            &self.graph,
            self.ports.manifest.as_ref(),
            self.ports.vcs.as_ref(),
            &released,
            CascadePolicy::release(),
        )
        .await?;

        let ok = !steps
            .iter()
            .any(|s| matches!(s.outcome, CascadeOutcome::Failed { .. }));
        report.cascade = steps;
        Ok(ok)
    }

    /// Tag and push every released repository; push failures for commits are only logged
    async fn tag_and_push(&self, report: &mut ReleaseReport) -> bool {
        let mut ok = true;

        for (name, version) in report.succeeded() {
            let Some(repo) = self.workspace.repository(&name) else {
                continue;
            };
            let tag = tag_name(&version);
            match self.tag_repository(repo, &tag, &version).await {
                Ok(true) => report.tagged.push(format!("{}@{}", name, tag)),
                Ok(false) => log::warn!("Tag {} already exists in '{}', skipping", tag, name),
                Err(e) => {
                    log::error!("Failed to tag '{}': {}", name, e);
                    report.record(
                        &name,
                        None,
                        RepoOutcome::Failed {
                            error: e.to_string(),
                        },
                    );
                    ok = false;
                }
            }
        }

        for (name, _) in report.succeeded() {
            let Some(repo) = self.workspace.repository(&name) else {
                continue;
            };
            let pushed = retry_with_backoff(self.retry, &format!("push {}", name), move || {
                self.ports.vcs.push(repo)
            })
            .await;
            if let Err(e) = pushed {
                log::error!("Failed to push commits for '{}': {}", name, e);
            }
        }

        ok
    }

    async fn tag_repository(
        &self,
        repo: &RepositoryDescriptor,
        tag: &str,
        version: &str,
    ) -> Result<bool> {
        if self.ports.vcs.tag_exists(repo, tag).await? {
            return Ok(false);
        }
        self.ports.vcs.tag(repo, tag, &tag_message(version)).await?;
        retry_with_backoff(self.retry, &format!("push tag {}", tag), move || {
            self.ports.vcs.push_tag(repo, tag)
        })
        .await?;
        log::info!("Tagged '{}' as {}", repo.name, tag);
        Ok(true)
    }

    async fn run_integration_tests(
        &self,
        targets: &[String],
        report: &mut ReleaseReport,
    ) -> Result<bool> {
        let repos: Vec<RepositoryDescriptor> = targets
            .iter()
            .filter_map(|name| self.workspace.repository(name))
            .filter(|repo| repo.exists)
            .cloned()
            .collect();

        let results = testing::run_batch(
            Arc::clone(&self.ports.tests),
            repos,
            TestSuite::Integration,
            self.workspace.config.settings.parallel_jobs,
        )
        .await?;

        report.integration_failures = testing::failed_repositories(&results);
        if report.integration_failures.is_empty() {
            Ok(true)
        } else {
            log::error!(
                "{}",
                TestError::IntegrationFailed {
                    repositories: report.integration_failures.clone(),
                }
            );
            Ok(false)
        }
    }

    async fn restore_all(&self, report: &mut ReleaseReport) {
        let (restored, failures) = self.restore_set(&self.backups).await;
        for restore in &restored {
            if report.status(&restore.repository).is_some() {
                report.set_status(&restore.repository, ReleaseStatus::RolledBack);
            }
        }
        report.restored = restored;
        report.restore_failures = failures;
    }

    /// Restore every repository in `set`; one failure does not block the others
    async fn restore_set(&self, set: &BackupSet) -> (Vec<RestoreReport>, Vec<(String, String)>) {
        let mut restored = Vec::new();
        let mut failures = Vec::new();

        for backup in set.iter() {
            let Some(repo) = self.workspace.repository(&backup.repository) else {
                failures.push((
                    backup.repository.clone(),
                    "repository no longer configured".to_string(),
                ));
                continue;
            };
            match state::restore(
                self.ports.manifest.as_ref(),
                self.ports.vcs.as_ref(),
                repo,
                backup,
            )
            .await
            {
                Ok(r) => restored.push(r),
                Err(e) => {
                    log::error!("Failed to restore '{}': {}", repo.name, e);
                    failures.push((repo.name.clone(), e.to_string()));
                }
            }
        }

        (restored, failures)
    }

    /// Restore every repository from the most recent persisted backup
    pub async fn rollback(&self) -> Result<RollbackReport> {
        let folder = self.store.latest_folder()?;
        let set = self.store.latest()?;
        let (restored, failures) = self.restore_set(&set).await;
        Ok(RollbackReport {
            folder,
            restored,
            failures,
        })
    }

    /// Current version, last tag, and pending changes for every repository
    pub async fn status(&self) -> Vec<RepositoryReleaseStatus> {
        let mut statuses = Vec::with_capacity(self.workspace.repositories().len());

        for repo in self.workspace.repositories() {
            let mut status = RepositoryReleaseStatus {
                name: repo.name.clone(),
                exists: repo.exists,
                current_version: None,
                last_tag: None,
                pending_changes: false,
            };
            if repo.exists {
                status.current_version = self.ports.manifest.get_version(repo).ok().flatten();
                status.last_tag = self.ports.vcs.latest_tag(repo).await.ok().flatten();
                status.pending_changes = !self
                    .ports
                    .vcs
                    .working_tree_clean(repo)
                    .await
                    .unwrap_or(true);
            }
            statuses.push(status);
        }

        statuses
    }
}

/// Release one repository, returning its version (once known) and outcome
async fn release_repository<M, V, T>(
    ports: &Ports<M, V, T>,
    workspace: &WorkspaceInfo,
    repo: &RepositoryDescriptor,
    plan: &RepoPlan,
) -> (Option<String>, RepoOutcome)
where
    M: ManifestOperations,
    V: VcsOperations,
    T: TestOperations,
{
    let failed = |e: crate::error::MprError| {
        log::error!("Failed to release '{}': {}", repo.name, e);
        RepoOutcome::Failed {
            error: e.to_string(),
        }
    };

    let version = match stage_version(ports.manifest.as_ref(), repo, plan) {
        Ok(version) => version,
        Err(e) => return (None, failed(e)),
    };

    match apply_release(ports, workspace, repo, plan, &version).await {
        Ok(outcome) => (Some(version), outcome),
        Err(e) => (Some(version), failed(e)),
    }
}

fn stage_version<M: ManifestOperations>(
    manifest: &M,
    repo: &RepositoryDescriptor,
    plan: &RepoPlan,
) -> Result<String> {
    if !repo.exists {
        return Err(ConfigError::RepositoryMissing {
            name: repo.name.clone(),
            path: repo.path.clone(),
        }
        .into());
    }
    let base = match &plan.base {
        Some(base) => base.clone(),
        None => manifest
            .get_version(repo)?
            .ok_or_else(|| VersionError::Unavailable {
                repository: repo.name.clone(),
            })?,
    };
    Ok(plan.stage.version_for(&base, plan.started_at))
}

async fn apply_release<M, V, T>(
    ports: &Ports<M, V, T>,
    workspace: &WorkspaceInfo,
    repo: &RepositoryDescriptor,
    plan: &RepoPlan,
    version: &str,
) -> Result<RepoOutcome>
where
    M: ManifestOperations,
    V: VcsOperations,
    T: TestOperations,
{
    let manifest = ports.manifest.as_ref();

    if plan.stage.is_tagged()
        && !plan.dry_run
        && ports.vcs.tag_exists(repo, &tag_name(version)).await?
    {
        log::warn!(
            "Version {} has already been released for '{}', skipping",
            version,
            repo.name
        );
        return Ok(RepoOutcome::AlreadyReleased);
    }

    if plan.dry_run {
        log::info!("Would release '{}' as {}", repo.name, version);
        return Ok(RepoOutcome::WouldRelease);
    }

    manifest.set_version(repo, version)?;
    update_own_requirements(manifest, workspace, repo);
    manifest::regenerate_lock(manifest, repo).await?;

    if !plan.skip_tests
        && let TestOutcome::Failed { output } = ports.tests.run(repo, TestSuite::Unit).await?
    {
        return Err(TestError::Failed {
            repository: repo.name.clone(),
            output,
        }
        .into());
    }

    ports
        .vcs
        .commit(
            repo,
            &[manifest.manifest_path(repo), manifest.lock_path(repo)],
            &format!("Release version {}", version),
        )
        .await?;

    log::info!("Released '{}' version {}", repo.name, version);
    Ok(RepoOutcome::Released)
}

/// Point this repository's requirements at its dependencies' current versions.
///
/// Best effort: problems are logged and never fail the release.
fn update_own_requirements<M: ManifestOperations>(
    manifest: &M,
    workspace: &WorkspaceInfo,
    repo: &RepositoryDescriptor,
) {
    for dependency in &repo.dependencies {
        let Some(dep_repo) = workspace.repository(dependency).filter(|r| r.exists) else {
            continue;
        };
        let result = manifest.get_version(dep_repo).and_then(|version| match version {
            Some(version) => {
                manifest::rewrite_requirement(manifest, repo, &dep_repo.package_name, &version)
            }
            None => Ok(RewriteOutcome::Unchanged),
        });
        match result {
            Ok(RewriteOutcome::Changed { to, .. }) => log::info!(
                "Updated '{}' requirement on '{}' to {}",
                repo.name,
                dep_repo.package_name,
                to
            ),
            Ok(_) => {}
            Err(e) => log::warn!(
                "Could not update '{}' requirement on '{}': {}",
                repo.name,
                dep_repo.package_name,
                e
            ),
        }
    }
}
