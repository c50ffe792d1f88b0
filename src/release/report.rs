use crate::release::ReleaseStage;
use crate::state::RestoreReport;
use crate::version::CascadeStep;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Per-repository release state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseStatus {
    /// Not started
    Pending,
    /// Being processed
    InProgress,
    /// Released (or already released)
    Success,
    /// Processing failed
    Failed,
    /// Restored from backup after a failed run
    RolledBack,
}

impl fmt::Display for ReleaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReleaseStatus::Pending => "pending",
            ReleaseStatus::InProgress => "in_progress",
            ReleaseStatus::Success => "success",
            ReleaseStatus::Failed => "failed",
            ReleaseStatus::RolledBack => "rolled_back",
        };
        write!(f, "{}", s)
    }
}

/// How a repository's release ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepoOutcome {
    /// Version set, locked, tested, and committed
    Released,
    /// The release tag already existed; nothing was touched
    AlreadyReleased,
    /// Dry run: what would have been released
    WouldRelease,
    /// Processing failed
    Failed {
        /// Error message
        error: String,
    },
}

/// One repository's line in the report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryRelease {
    /// Repository name
    pub name: String,
    /// Current state
    pub status: ReleaseStatus,
    /// Release version, once known
    pub version: Option<String>,
    /// Outcome, once finished
    pub outcome: Option<RepoOutcome>,
}

/// Everything a release run did
#[derive(Debug, Clone)]
pub struct ReleaseReport {
    /// Stage released
    pub stage: ReleaseStage,
    /// Whether this was a dry run
    pub dry_run: bool,
    /// Target repositories in processing order
    pub repositories: Vec<RepositoryRelease>,
    /// Dependent cascade after a production release
    pub cascade: Vec<CascadeStep>,
    /// Tags created
    pub tagged: Vec<String>,
    /// Repositories whose integration suite failed
    pub integration_failures: Vec<String>,
    /// Backup folder written for this run
    pub backup_folder: Option<PathBuf>,
    /// Successful restores after a failed run
    pub restored: Vec<RestoreReport>,
    /// Restores that failed `(repository, error)`
    pub restore_failures: Vec<(String, String)>,
    /// Overall result
    pub success: bool,
}

impl ReleaseReport {
    pub(crate) fn new(stage: ReleaseStage, dry_run: bool, order: &[String]) -> Self {
        Self {
            stage,
            dry_run,
            repositories: order
                .iter()
                .map(|name| RepositoryRelease {
                    name: name.clone(),
                    status: ReleaseStatus::Pending,
                    version: None,
                    outcome: None,
                })
                .collect(),
            cascade: Vec::new(),
            tagged: Vec::new(),
            integration_failures: Vec::new(),
            backup_folder: None,
            restored: Vec::new(),
            restore_failures: Vec::new(),
            success: false,
        }
    }

    /// Line for a repository
    pub fn repository(&self, name: &str) -> Option<&RepositoryRelease> {
        self.repositories.iter().find(|r| r.name == name)
    }

    fn repository_mut(&mut self, name: &str) -> Option<&mut RepositoryRelease> {
        self.repositories.iter_mut().find(|r| r.name == name)
    }

    pub(crate) fn set_status(&mut self, name: &str, status: ReleaseStatus) {
        if let Some(entry) = self.repository_mut(name) {
            entry.status = status;
        }
    }

    pub(crate) fn record(&mut self, name: &str, version: Option<String>, outcome: RepoOutcome) {
        if let Some(entry) = self.repository_mut(name) {
            entry.status = match outcome {
                RepoOutcome::Failed { .. } => ReleaseStatus::Failed,
                _ => ReleaseStatus::Success,
            };
            if version.is_some() {
                entry.version = version;
            }
            entry.outcome = Some(outcome);
        }
    }

    /// Status of a repository
    pub fn status(&self, name: &str) -> Option<ReleaseStatus> {
        self.repository(name).map(|r| r.status)
    }

    /// Repositories that finished successfully, with their release version
    pub fn succeeded(&self) -> Vec<(String, String)> {
        self.repositories
            .iter()
            .filter(|r| r.status == ReleaseStatus::Success)
            .filter_map(|r| Some((r.name.clone(), r.version.clone()?)))
            .collect()
    }

    /// Whether every target succeeded
    pub fn all_succeeded(&self) -> bool {
        self.repositories
            .iter()
            .all(|r| r.status == ReleaseStatus::Success)
    }

    /// Names of failed repositories
    pub fn failed(&self) -> Vec<&str> {
        self.repositories
            .iter()
            .filter(|r| r.status == ReleaseStatus::Failed)
            .map(|r| r.name.as_str())
            .collect()
    }
}
