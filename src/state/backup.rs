//! Pre-release snapshots and rollback.
//!
//! A backup captures, per repository, the raw manifest bytes, the HEAD revision,
//! and the tags present at capture time. Restoring resets the repository to that
//! revision, writes the manifest back byte for byte, relocks, and removes tags
//! created after the snapshot that are unreachable from the restored head.

use crate::error::{Result, StateError};
use crate::git::VcsOperations;
use crate::manifest::{self, LockOutcome, ManifestOperations};
use crate::state::StateManager;
use crate::workspace::RepositoryDescriptor;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

const FOLDER_PREFIX: &str = "release_";
const INDEX_FILE: &str = "backup.json";

/// Snapshot of one repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryBackup {
    /// Repository name
    pub repository: String,
    /// File name of the manifest inside the repository
    pub manifest_file: String,
    /// Raw manifest bytes
    pub manifest: Vec<u8>,
    /// HEAD revision at capture time
    pub revision: String,
    /// Tags present at capture time
    pub tags: Vec<String>,
}

/// Snapshots taken at the start of one release run
#[derive(Debug, Clone, Default)]
pub struct BackupSet {
    /// When the snapshots were taken
    pub created_at: Option<DateTime<Utc>>,
    backups: Vec<RepositoryBackup>,
}

impl BackupSet {
    /// Snapshot for a repository
    pub fn get(&self, repository: &str) -> Option<&RepositoryBackup> {
        self.backups.iter().find(|b| b.repository == repository)
    }

    /// All snapshots in capture order
    pub fn iter(&self) -> impl Iterator<Item = &RepositoryBackup> {
        self.backups.iter()
    }

    /// Number of repositories backed up
    pub fn len(&self) -> usize {
        self.backups.len()
    }

    /// Whether nothing was backed up
    pub fn is_empty(&self) -> bool {
        self.backups.is_empty()
    }

    /// Add a snapshot
    pub fn insert(&mut self, backup: RepositoryBackup) {
        self.backups.retain(|b| b.repository != backup.repository);
        self.backups.push(backup);
    }
}

/// What a restore did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreReport {
    /// Repository name
    pub repository: String,
    /// Lock outcome, or the reason relocking failed
    pub lock: std::result::Result<LockOutcome, String>,
    /// Tags that were deleted
    pub deleted_tags: Vec<String>,
}

/// Snapshot every existing repository.
///
/// A failure for one repository is logged and does not stop the others.
pub async fn create_backups<M, V>(
    manifest: &M,
    vcs: &V,
    repositories: &[RepositoryDescriptor],
) -> BackupSet
where
    M: ManifestOperations,
    V: VcsOperations,
{
    let mut set = BackupSet {
        created_at: Some(Utc::now()),
        backups: Vec::new(),
    };

    for repo in repositories.iter().filter(|r| r.exists) {
        match backup_repository(manifest, vcs, repo).await {
            Ok(backup) => {
                log::debug!("Backed up '{}' at {}", repo.name, backup.revision);
                set.insert(backup);
            }
            Err(e) => log::warn!("Failed to back up '{}': {}", repo.name, e),
        }
    }

    set
}

async fn backup_repository<M, V>(
    manifest: &M,
    vcs: &V,
    repo: &RepositoryDescriptor,
) -> Result<RepositoryBackup>
where
    M: ManifestOperations,
    V: VcsOperations,
{
    let content = manifest.read_raw(repo)?;
    let revision = vcs.head_revision(repo).await?;
    let tags = vcs.list_tags(repo).await?;
    let manifest_file = manifest
        .manifest_path(repo)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "pyproject.toml".to_string());

    Ok(RepositoryBackup {
        repository: repo.name.clone(),
        manifest_file,
        manifest: content,
        revision,
        tags,
    })
}

/// Return a repository to its snapshot
pub async fn restore<M, V>(
    manifest: &M,
    vcs: &V,
    repo: &RepositoryDescriptor,
    backup: &RepositoryBackup,
) -> Result<RestoreReport>
where
    M: ManifestOperations,
    V: VcsOperations,
{
    log::info!("Restoring '{}' to {}", repo.name, backup.revision);

    // Reset first so the manifest write below is what ends up on disk
    vcs.reset_hard(repo, &backup.revision).await?;
    manifest.write_raw(repo, &backup.manifest)?;

    let lock = match manifest::regenerate_lock(manifest, repo).await {
        Ok(outcome) => Ok(outcome),
        Err(e) => {
            log::warn!("Could not relock '{}' after restore: {}", repo.name, e);
            Err(e.to_string())
        }
    };

    let deleted_tags = remove_orphaned_tags(vcs, repo, backup).await?;

    Ok(RestoreReport {
        repository: repo.name.clone(),
        lock,
        deleted_tags,
    })
}

async fn remove_orphaned_tags<V: VcsOperations>(
    vcs: &V,
    repo: &RepositoryDescriptor,
    backup: &RepositoryBackup,
) -> Result<Vec<String>> {
    let known: HashSet<&str> = backup.tags.iter().map(String::as_str).collect();
    let head = vcs.head_revision(repo).await?;
    let mut deleted = Vec::new();

    for tag in vcs.list_tags(repo).await? {
        if known.contains(tag.as_str()) {
            continue;
        }
        let target = vcs.tag_target(repo, &tag).await?;
        if vcs.is_ancestor(repo, &target, &head).await? {
            continue;
        }
        vcs.delete_tag(repo, &tag).await?;
        log::info!("Deleted orphaned tag '{}' in '{}'", tag, repo.name);
        deleted.push(tag);
    }

    Ok(deleted)
}

#[derive(Debug, Serialize, Deserialize)]
struct BackupIndex {
    created_at: DateTime<Utc>,
    repositories: Vec<BackupIndexEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct BackupIndexEntry {
    name: String,
    manifest_file: String,
    revision: String,
    #[serde(default)]
    tags: Vec<String>,
}

/// Timestamped backup folders under `backups/`
#[derive(Debug, Clone)]
pub struct BackupStore {
    dir: PathBuf,
}

impl BackupStore {
    /// Store rooted at `dir` (normally `<workspace>/backups`)
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Write a backup set to a new `release_<timestamp>` folder
    pub fn persist(&self, set: &BackupSet) -> Result<PathBuf> {
        let created_at = set.created_at.unwrap_or_else(Utc::now);
        let stamp = created_at.format("%Y%m%d_%H%M%S").to_string();

        let mut folder = self.dir.join(format!("{}{}", FOLDER_PREFIX, stamp));
        let mut suffix = 1;
        while folder.exists() {
            folder = self
                .dir
                .join(format!("{}{}_{}", FOLDER_PREFIX, stamp, suffix));
            suffix += 1;
        }

        let save_failed = |e: std::io::Error| StateError::SaveFailed {
            reason: format!("Failed to write backup: {}", e),
        };

        let mut entries = Vec::with_capacity(set.len());
        for backup in set.iter() {
            let repo_dir = folder.join(&backup.repository);
            std::fs::create_dir_all(&repo_dir).map_err(save_failed)?;
            std::fs::write(repo_dir.join(&backup.manifest_file), &backup.manifest)
                .map_err(save_failed)?;
            entries.push(BackupIndexEntry {
                name: backup.repository.clone(),
                manifest_file: backup.manifest_file.clone(),
                revision: backup.revision.clone(),
                tags: backup.tags.clone(),
            });
        }

        StateManager::new(folder.join(INDEX_FILE)).save(&BackupIndex {
            created_at,
            repositories: entries,
        })?;

        log::info!("Backups written to {}", folder.display());
        Ok(folder)
    }

    /// Most recent backup folder, if any
    pub fn latest_folder(&self) -> Result<Option<PathBuf>> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut folders: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_dir()
                    && path
                        .file_name()
                        .and_then(|n| n.to_str())
                        .is_some_and(|n| n.starts_with(FOLDER_PREFIX))
                    && path.join(INDEX_FILE).is_file()
            })
            .collect();

        // release_<YYYYmmdd_HHMMSS> names sort chronologically
        folders.sort();
        Ok(folders.pop())
    }

    /// Load the most recent backup set
    pub fn latest(&self) -> Result<BackupSet> {
        let folder = self.latest_folder()?.ok_or(StateError::NoBackup)?;
        Self::load(&folder)
    }

    /// Load the backup set stored in `folder`
    pub fn load(folder: &Path) -> Result<BackupSet> {
        let index: BackupIndex = StateManager::new(folder.join(INDEX_FILE))
            .load()?
            .ok_or(StateError::NoBackup)?;

        let mut set = BackupSet {
            created_at: Some(index.created_at),
            backups: Vec::with_capacity(index.repositories.len()),
        };
        for entry in index.repositories {
            let path = folder.join(&entry.name).join(&entry.manifest_file);
            let manifest = std::fs::read(&path).map_err(|e| StateError::Corrupted {
                reason: format!("Missing manifest copy {}: {}", path.display(), e),
            })?;
            set.insert(RepositoryBackup {
                repository: entry.name,
                manifest_file: entry.manifest_file,
                manifest,
                revision: entry.revision,
                tags: entry.tags,
            });
        }

        Ok(set)
    }
}
