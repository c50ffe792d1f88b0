//! Package manifest access.
//!
//! The core reads and edits manifests only through [`ManifestOperations`];
//! [`PoetryManifest`] is the `pyproject.toml` implementation used by the binary.

mod poetry;

pub use poetry::PoetryManifest;

use crate::error::{Result, ToolError};
use crate::workspace::RepositoryDescriptor;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::path::PathBuf;

/// A dependency requirement, decoded once when the manifest is read
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Requirement {
    /// Version range such as `^1.2.0`
    Range(String),
    /// Local path dependency
    Path {
        /// Path to the dependency checkout
        path: String,
        /// Whether it is installed in develop (editable) mode
        develop: bool,
    },
    /// Version range resolved from a named package source
    Sourced {
        /// Version range
        version: String,
        /// Source name
        source: String,
    },
}

impl Requirement {
    /// Version range carried by this requirement, if any
    pub fn version(&self) -> Option<&str> {
        match self {
            Requirement::Range(v) | Requirement::Sourced { version: v, .. } => Some(v),
            Requirement::Path { .. } => None,
        }
    }

    /// Whether this is a local path dependency
    pub fn is_path(&self) -> bool {
        matches!(self, Requirement::Path { .. })
    }

    /// Source name for sourced requirements
    pub fn source(&self) -> Option<&str> {
        match self {
            Requirement::Sourced { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Same requirement with its range replaced by `^version`.
    ///
    /// Path requirements are returned unchanged.
    pub fn pinned_to(&self, version: &str) -> Requirement {
        let range = caret(version);
        match self {
            Requirement::Range(_) => Requirement::Range(range),
            Requirement::Sourced { source, .. } => Requirement::Sourced {
                version: range,
                source: source.clone(),
            },
            Requirement::Path { .. } => self.clone(),
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Requirement::Range(v) => write!(f, "{}", v),
            Requirement::Path { path, develop } => {
                write!(f, "path={}", path)?;
                if *develop {
                    write!(f, " (develop)")?;
                }
                Ok(())
            }
            Requirement::Sourced { version, source } => write!(f, "{} from {}", version, source),
        }
    }
}

/// Caret range for a version, with build metadata stripped
pub fn caret(version: &str) -> String {
    let base = version.split('+').next().unwrap_or(version);
    format!("^{}", base)
}

/// Lock regeneration strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Incremental relock
    Fast,
    /// Full regeneration from scratch
    Full,
}

/// Which lock form ended up succeeding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockOutcome {
    /// The fast form succeeded
    Fast,
    /// The fast form failed and the full regeneration succeeded
    Regenerated,
}

/// Result of rewriting one requirement
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RewriteOutcome {
    /// The requirement was rewritten
    Changed {
        /// Previous requirement
        from: Requirement,
        /// New requirement
        to: Requirement,
    },
    /// The requirement already pointed at the version
    Unchanged,
    /// Path dependencies are left alone
    PathDependency,
    /// The manifest does not declare the package
    Missing,
}

impl RewriteOutcome {
    /// Whether the manifest content changed
    pub fn changed(&self) -> bool {
        matches!(self, RewriteOutcome::Changed { .. })
    }
}

/// Manifest operations for one repository at a time
pub trait ManifestOperations: Send + Sync {
    /// Path of the manifest file
    fn manifest_path(&self, repo: &RepositoryDescriptor) -> PathBuf;

    /// Path of the lock file
    fn lock_path(&self, repo: &RepositoryDescriptor) -> PathBuf;

    /// Raw manifest bytes
    fn read_raw(&self, repo: &RepositoryDescriptor) -> Result<Vec<u8>>;

    /// Overwrite the manifest with raw bytes
    fn write_raw(&self, repo: &RepositoryDescriptor, content: &[u8]) -> Result<()>;

    /// Declared package version, `None` when absent
    fn get_version(&self, repo: &RepositoryDescriptor) -> Result<Option<String>>;

    /// Set the package version
    fn set_version(&self, repo: &RepositoryDescriptor, version: &str) -> Result<()>;

    /// Requirement on `package`, tolerating `-`/`_` spelling differences
    fn get_dependency(
        &self,
        repo: &RepositoryDescriptor,
        package: &str,
    ) -> Result<Option<Requirement>>;

    /// Replace the requirement on an already declared `package`
    fn set_dependency(
        &self,
        repo: &RepositoryDescriptor,
        package: &str,
        requirement: &Requirement,
    ) -> Result<()>;

    /// Run one lock regeneration form
    fn lock(
        &self,
        repo: &RepositoryDescriptor,
        mode: LockMode,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// Regenerate the lock file: fast form first, full regeneration on failure or timeout.
pub async fn regenerate_lock<M: ManifestOperations>(
    manifest: &M,
    repo: &RepositoryDescriptor,
) -> Result<LockOutcome> {
    match manifest.lock(repo, LockMode::Fast).await {
        Ok(()) => return Ok(LockOutcome::Fast),
        Err(e) => log::warn!(
            "Fast lock failed for '{}', regenerating from scratch: {}",
            repo.name,
            e
        ),
    }

    match manifest.lock(repo, LockMode::Full).await {
        Ok(()) => Ok(LockOutcome::Regenerated),
        Err(e) => Err(ToolError::LockFailed {
            repository: repo.name.clone(),
            reason: e.to_string(),
        }
        .into()),
    }
}

/// Point the requirement on `package` at `^version`.
///
/// Path requirements and undeclared packages are reported and left alone.
pub fn rewrite_requirement<M: ManifestOperations>(
    manifest: &M,
    repo: &RepositoryDescriptor,
    package: &str,
    version: &str,
) -> Result<RewriteOutcome> {
    let outcome = preview_rewrite(manifest, repo, package, version)?;
    match &outcome {
        RewriteOutcome::Changed { to, .. } => manifest.set_dependency(repo, package, to)?,
        RewriteOutcome::PathDependency => log::debug!(
            "'{}' uses a path dependency on '{}', leaving it alone",
            repo.name,
            package
        ),
        RewriteOutcome::Unchanged | RewriteOutcome::Missing => {}
    }
    Ok(outcome)
}

/// What [`rewrite_requirement`] would do, without touching the manifest
pub fn preview_rewrite<M: ManifestOperations>(
    manifest: &M,
    repo: &RepositoryDescriptor,
    package: &str,
    version: &str,
) -> Result<RewriteOutcome> {
    Ok(match manifest.get_dependency(repo, package)? {
        None => RewriteOutcome::Missing,
        Some(current) if current.is_path() => RewriteOutcome::PathDependency,
        Some(current) => {
            let updated = current.pinned_to(version);
            if updated == current {
                RewriteOutcome::Unchanged
            } else {
                RewriteOutcome::Changed {
                    from: current,
                    to: updated,
                }
            }
        }
    })
}
