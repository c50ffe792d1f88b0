//! Workspace configuration loading and repository enumeration.

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Name of the workspace configuration file
pub const CONFIG_FILE: &str = "mpr.toml";

/// Directory holding repository checkouts, relative to the workspace root
pub const REPOS_DIR: &str = "repos";

/// Directory holding persisted backups, relative to the workspace root
pub const BACKUPS_DIR: &str = "backups";

/// Version-history ledger file, relative to the workspace root
pub const HISTORY_FILE: &str = ".version-history.json";

/// Shared reference to workspace information.
/// WorkspaceInfo is immutable after loading, so Arc without a lock is sufficient.
pub type SharedWorkspaceInfo = Arc<WorkspaceInfo>;

/// Parsed `mpr.toml`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Workspace section
    pub workspace: WorkspaceSection,
    /// Declared repositories, in declaration order
    #[serde(default)]
    pub repositories: Vec<RepositoryConfig>,
    /// Tunables
    #[serde(default)]
    pub settings: Settings,
}

/// `[workspace]` table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceSection {
    /// Workspace name
    pub name: String,
    /// Python version the repositories target
    #[serde(default = "default_python_version")]
    pub python_version: String,
}

/// One `[[repositories]]` entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryConfig {
    /// Unique repository name (also the checkout directory name)
    pub name: String,
    /// Clone URL
    #[serde(default)]
    pub url: String,
    /// Published package name, defaults to the repository name
    #[serde(default)]
    pub package_name: Option<String>,
    /// Release branch
    #[serde(default = "default_branch")]
    pub branch: String,
    /// Names of repositories this one depends on
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Package source the repository publishes to
    #[serde(default = "default_source")]
    pub source: String,
}

/// `[settings]` table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Worker pool size for parallel dev releases and batch tests
    #[serde(default = "default_parallel_jobs")]
    pub parallel_jobs: usize,
    /// Budget in seconds for one test-suite run
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    /// Number of version-history entries retained
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            parallel_jobs: default_parallel_jobs(),
            timeout: default_timeout(),
            history_limit: default_history_limit(),
        }
    }
}

fn default_python_version() -> String {
    "3.11".to_string()
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_source() -> String {
    "pypi".to_string()
}

fn default_parallel_jobs() -> usize {
    4
}

fn default_timeout() -> u64 {
    3600
}

fn default_history_limit() -> usize {
    100
}

/// A repository resolved against the workspace root.
///
/// Loaded once per invocation and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryDescriptor {
    /// Unique repository name
    pub name: String,
    /// Package name used in dependents' requirements
    pub package_name: String,
    /// Absolute checkout path
    pub path: PathBuf,
    /// Declared dependency repository names
    pub dependencies: Vec<String>,
    /// Whether the checkout existed when the workspace was loaded
    pub exists: bool,
    /// Release branch
    pub branch: String,
    /// Package source
    pub source: String,
}

/// Complete workspace information
#[derive(Debug, Clone)]
pub struct WorkspaceInfo {
    /// Root directory of the workspace
    pub root: PathBuf,
    /// Parsed configuration
    pub config: WorkspaceConfig,
    repositories: Vec<RepositoryDescriptor>,
    index: HashMap<String, usize>,
}

impl WorkspaceInfo {
    /// Discover the workspace root from `start_dir` and load it
    pub fn analyze<P: AsRef<Path>>(start_dir: P) -> Result<Self> {
        let root = Self::find_workspace_root(start_dir)?;
        Self::load(root)
    }

    /// Load the workspace whose root is exactly `root`
    pub fn load<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let config_path = root.join(CONFIG_FILE);
        let content = std::fs::read_to_string(&config_path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::RootNotFound
            } else {
                ConfigError::Invalid {
                    path: config_path.clone(),
                    reason: e.to_string(),
                }
            }
        })?;

        let config: WorkspaceConfig =
            toml::from_str(&content).map_err(|e| ConfigError::Invalid {
                path: config_path.clone(),
                reason: e.to_string(),
            })?;

        Self::from_config(root, config)
    }

    /// Build workspace information from an already parsed configuration
    pub fn from_config(root: PathBuf, config: WorkspaceConfig) -> Result<Self> {
        let mut repositories = Vec::with_capacity(config.repositories.len());
        let mut index = HashMap::new();

        for repo in &config.repositories {
            if index.contains_key(&repo.name) {
                return Err(ConfigError::DuplicateRepository {
                    name: repo.name.clone(),
                }
                .into());
            }

            let path = root.join(REPOS_DIR).join(&repo.name);
            let exists = path.is_dir();
            index.insert(repo.name.clone(), repositories.len());
            repositories.push(RepositoryDescriptor {
                name: repo.name.clone(),
                package_name: repo
                    .package_name
                    .clone()
                    .unwrap_or_else(|| repo.name.clone()),
                exists,
                path,
                dependencies: repo.dependencies.clone(),
                branch: repo.branch.clone(),
                source: repo.source.clone(),
            });
        }

        let known: HashSet<&str> = index.keys().map(String::as_str).collect();
        for repo in &repositories {
            for dep in &repo.dependencies {
                if !known.contains(dep.as_str()) {
                    log::warn!(
                        "Repository '{}' declares unknown dependency '{}', ignoring it",
                        repo.name,
                        dep
                    );
                }
            }
        }

        Ok(Self {
            root,
            config,
            repositories,
            index,
        })
    }

    /// Walk up from `start_dir` until a directory containing `mpr.toml` is found
    fn find_workspace_root<P: AsRef<Path>>(start_dir: P) -> Result<PathBuf> {
        // Try canonicalization, fall back to absolute path for network mounts
        let mut current_dir = start_dir.as_ref().canonicalize().or_else(|_| {
            let path = start_dir.as_ref();
            if path.is_absolute() {
                Ok(path.to_path_buf())
            } else {
                std::env::current_dir().map(|cwd| cwd.join(path))
            }
        })?;

        loop {
            if current_dir.join(CONFIG_FILE).is_file() {
                return Ok(current_dir);
            }

            match current_dir.parent() {
                Some(parent) => current_dir = parent.to_path_buf(),
                None => return Err(ConfigError::RootNotFound.into()),
            }
        }
    }

    /// All repositories in declaration order
    pub fn repositories(&self) -> &[RepositoryDescriptor] {
        &self.repositories
    }

    /// Look up a repository by name
    pub fn repository(&self, name: &str) -> Option<&RepositoryDescriptor> {
        self.index.get(name).map(|&i| &self.repositories[i])
    }

    /// Resolve a repository, failing when it is unknown or its checkout is missing
    pub fn require_repository(&self, name: &str) -> Result<&RepositoryDescriptor> {
        let repo = self
            .repository(name)
            .ok_or_else(|| ConfigError::RepositoryNotFound {
                name: name.to_string(),
            })?;

        if !repo.exists {
            return Err(ConfigError::RepositoryMissing {
                name: repo.name.clone(),
                path: repo.path.clone(),
            }
            .into());
        }

        Ok(repo)
    }

    /// Resolve a subset of repository names, or every repository when `names` is `None`.
    ///
    /// Unknown names fail before anything is touched.
    pub fn resolve_targets(&self, names: Option<&[String]>) -> Result<Vec<String>> {
        match names {
            None => Ok(self.repository_names()),
            Some(names) => {
                let mut targets = Vec::with_capacity(names.len());
                for name in names {
                    if !self.has_repository(name) {
                        return Err(ConfigError::RepositoryNotFound { name: name.clone() }.into());
                    }
                    if !targets.contains(name) {
                        targets.push(name.clone());
                    }
                }
                Ok(targets)
            }
        }
    }

    /// All repository names in declaration order
    pub fn repository_names(&self) -> Vec<String> {
        self.repositories.iter().map(|r| r.name.clone()).collect()
    }

    /// Check if a repository exists in the configuration
    pub fn has_repository(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Directory for persisted backups
    pub fn backups_dir(&self) -> PathBuf {
        self.root.join(BACKUPS_DIR)
    }

    /// Path of the version-history ledger
    pub fn history_path(&self) -> PathBuf {
        self.root.join(HISTORY_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const CONFIG: &str = r#"
[workspace]
name = "demo"

[[repositories]]
name = "core"
url = "git@example.com:core.git"

[[repositories]]
name = "api"
url = "git@example.com:api.git"
package_name = "demo-api"
dependencies = ["core", "ghost"]
"#;

    #[test]
    fn loads_config_with_defaults() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), CONFIG).unwrap();
        std::fs::create_dir_all(dir.path().join("repos/core")).unwrap();

        let ws = WorkspaceInfo::load(dir.path()).unwrap();
        assert_eq!(ws.config.workspace.python_version, "3.11");
        assert_eq!(ws.config.settings.parallel_jobs, 4);
        assert_eq!(ws.config.settings.history_limit, 100);
        assert_eq!(ws.repository_names(), vec!["core", "api"]);

        let core = ws.repository("core").unwrap();
        assert!(core.exists);
        assert_eq!(core.package_name, "core");
        assert_eq!(core.branch, "main");

        let api = ws.repository("api").unwrap();
        assert!(!api.exists);
        assert_eq!(api.package_name, "demo-api");
        assert!(ws.require_repository("api").is_err());
    }

    #[test]
    fn discovers_root_from_nested_directory() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), CONFIG).unwrap();
        let nested = dir.path().join("repos/core/src");
        std::fs::create_dir_all(&nested).unwrap();

        let ws = WorkspaceInfo::analyze(&nested).unwrap();
        assert_eq!(ws.root, dir.path().canonicalize().unwrap());
    }

    #[test]
    fn rejects_duplicate_repositories() {
        let dir = TempDir::new().unwrap();
        let config = format!("{}\n[[repositories]]\nname = \"core\"\n", CONFIG);
        std::fs::write(dir.path().join(CONFIG_FILE), config).unwrap();

        let err = WorkspaceInfo::load(dir.path()).unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn resolves_targets() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), CONFIG).unwrap();
        let ws = WorkspaceInfo::load(dir.path()).unwrap();

        assert_eq!(ws.resolve_targets(None).unwrap(), vec!["core", "api"]);
        let subset = vec!["api".to_string()];
        assert_eq!(ws.resolve_targets(Some(&subset)).unwrap(), vec!["api"]);
        let unknown = vec!["nope".to_string()];
        assert!(ws.resolve_targets(Some(&unknown)).is_err());
    }
}
