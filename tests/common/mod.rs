//! Shared fixtures: on-disk workspaces plus in-memory stand-ins for poetry, git, and pytest.

#![allow(dead_code)]

use mpr::error::{Result, ToolError, VcsError};
use mpr::manifest::{LockMode, ManifestOperations, PoetryManifest, Requirement};
use mpr::testing::{TestOperations, TestOutcome, TestSuite};
use mpr::workspace::{RepositoryDescriptor, SharedWorkspaceInfo, WorkspaceInfo};
use mpr::{Ports, VcsOperations};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// One repository of a fixture workspace
pub struct RepoEntry<'a> {
    pub name: &'a str,
    pub version: &'a str,
    pub dependencies: &'a [&'a str],
}

pub const fn repo<'a>(name: &'a str, version: &'a str, dependencies: &'a [&'a str]) -> RepoEntry<'a> {
    RepoEntry {
        name,
        version,
        dependencies,
    }
}

/// A workspace on disk: `mpr.toml` plus one `pyproject.toml` per repository
pub struct Fixture {
    pub dir: TempDir,
    pub workspace: SharedWorkspaceInfo,
}

impl Fixture {
    pub fn new(repos: &[RepoEntry<'_>]) -> Self {
        let dir = TempDir::new().unwrap();
        write_workspace(dir.path(), repos);
        let workspace = Arc::new(WorkspaceInfo::load(dir.path()).unwrap());
        Self { dir, workspace }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn descriptor(&self, name: &str) -> &RepositoryDescriptor {
        self.workspace.repository(name).unwrap()
    }

    pub fn manifest_text(&self, name: &str) -> String {
        std::fs::read_to_string(self.descriptor(name).path.join("pyproject.toml")).unwrap()
    }

    pub fn version_of(&self, name: &str) -> String {
        PoetryManifest::new()
            .get_version(self.descriptor(name))
            .unwrap()
            .unwrap()
    }

    pub fn requirement(&self, repo: &str, package: &str) -> Option<Requirement> {
        PoetryManifest::new()
            .get_dependency(self.descriptor(repo), package)
            .unwrap()
    }

    /// Ports wired to fresh fakes, with every repository committed once
    pub fn ports(&self) -> (Ports<FakeManifest, FakeVcs, FakeTests>, FakeHandles) {
        let manifest = FakeManifest::default();
        let vcs = FakeVcs::default();
        for repo in self.workspace.repositories() {
            vcs.init(repo);
        }
        let tests = FakeTests::default();
        let handles = FakeHandles {
            manifest: manifest.state.clone(),
            vcs: vcs.clone(),
            tests: tests.clone(),
        };
        (Ports::new(manifest, vcs, tests), handles)
    }
}

/// Writes `mpr.toml` and the repository manifests under `root`
pub fn write_workspace(root: &Path, repos: &[RepoEntry<'_>]) {
    let mut config = String::from("[workspace]\nname = \"fixture\"\n");
    for entry in repos {
        let deps = entry
            .dependencies
            .iter()
            .map(|d| format!("\"{}\"", d))
            .collect::<Vec<_>>()
            .join(", ");
        config.push_str(&format!(
            "\n[[repositories]]\nname = \"{}\"\nurl = \"https://example.invalid/{}.git\"\ndependencies = [{}]\n",
            entry.name, entry.name, deps
        ));
    }
    std::fs::write(root.join("mpr.toml"), config).unwrap();

    let versions: HashMap<&str, &str> = repos.iter().map(|r| (r.name, r.version)).collect();
    for entry in repos {
        let dir = root.join("repos").join(entry.name);
        std::fs::create_dir_all(&dir).unwrap();
        let mut manifest = format!(
            "[tool.poetry]\nname = \"{}\"\nversion = \"{}\"\ndescription = \"\"\n\n[tool.poetry.dependencies]\npython = \"^3.11\"\n",
            entry.name, entry.version
        );
        for dep in entry.dependencies {
            let version = versions.get(dep).copied().unwrap_or("0.1.0");
            manifest.push_str(&format!("{} = \"^{}\"\n", dep, version));
        }
        std::fs::write(dir.join("pyproject.toml"), manifest).unwrap();
    }
}

/// Handles the test keeps after the fakes move into the ports
pub struct FakeHandles {
    pub manifest: Arc<Mutex<ManifestState>>,
    pub vcs: FakeVcs,
    pub tests: FakeTests,
}

impl FakeHandles {
    /// Make the incremental lock fail for `repo`, leaving the full form working
    pub fn fail_fast_lock_for(&self, repo: &str) {
        self.manifest
            .lock()
            .unwrap()
            .fast_lock_fails
            .insert(repo.to_string());
    }

    /// Make every lock attempt fail for `repo`
    pub fn fail_locks_for(&self, repo: &str) {
        self.manifest.lock().unwrap().lock_fails.insert(repo.to_string());
    }

    /// Lock modes attempted for `repo`, in order
    pub fn locks_for(&self, repo: &str) -> Vec<LockMode> {
        self.manifest
            .lock()
            .unwrap()
            .locks
            .iter()
            .filter(|(name, _)| name == repo)
            .map(|(_, mode)| *mode)
            .collect()
    }
}

#[derive(Default)]
pub struct ManifestState {
    /// `(repository, mode)` for every lock attempt
    pub locks: Vec<(String, LockMode)>,
    /// Repositories whose fast lock fails
    pub fast_lock_fails: HashSet<String>,
    /// Repositories whose every lock fails
    pub lock_fails: HashSet<String>,
}

/// Real `pyproject.toml` editing with a scripted lock step
#[derive(Default)]
pub struct FakeManifest {
    inner: PoetryManifest,
    pub state: Arc<Mutex<ManifestState>>,
}

impl ManifestOperations for FakeManifest {
    fn manifest_path(&self, repo: &RepositoryDescriptor) -> PathBuf {
        self.inner.manifest_path(repo)
    }

    fn lock_path(&self, repo: &RepositoryDescriptor) -> PathBuf {
        self.inner.lock_path(repo)
    }

    fn read_raw(&self, repo: &RepositoryDescriptor) -> Result<Vec<u8>> {
        self.inner.read_raw(repo)
    }

    fn write_raw(&self, repo: &RepositoryDescriptor, content: &[u8]) -> Result<()> {
        self.inner.write_raw(repo, content)
    }

    fn get_version(&self, repo: &RepositoryDescriptor) -> Result<Option<String>> {
        self.inner.get_version(repo)
    }

    fn set_version(&self, repo: &RepositoryDescriptor, version: &str) -> Result<()> {
        self.inner.set_version(repo, version)
    }

    fn get_dependency(
        &self,
        repo: &RepositoryDescriptor,
        package: &str,
    ) -> Result<Option<Requirement>> {
        self.inner.get_dependency(repo, package)
    }

    fn set_dependency(
        &self,
        repo: &RepositoryDescriptor,
        package: &str,
        requirement: &Requirement,
    ) -> Result<()> {
        self.inner.set_dependency(repo, package, requirement)
    }

    async fn lock(&self, repo: &RepositoryDescriptor, mode: LockMode) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.locks.push((repo.name.clone(), mode));
        let fails = state.lock_fails.contains(&repo.name)
            || (mode == LockMode::Fast && state.fast_lock_fails.contains(&repo.name));
        if fails {
            return Err(ToolError::Failed {
                command: "poetry lock".to_string(),
                code: Some(1),
                stderr: "resolution failed".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

#[derive(Default)]
struct RepoHistory {
    /// Linear history, oldest first
    revisions: Vec<String>,
    /// Manifest bytes committed at each revision
    snapshots: HashMap<String, Vec<u8>>,
    tags: BTreeMap<String, String>,
    messages: Vec<String>,
}

#[derive(Default)]
pub struct VcsState {
    repos: HashMap<String, RepoHistory>,
    next_revision: usize,
    /// Repositories pushed, in order
    pub pushes: Vec<String>,
    /// `(repository, tag)` pushed, in order
    pub pushed_tags: Vec<(String, String)>,
    /// Repositories whose tag creation fails
    pub tag_fails: HashSet<String>,
    /// Repositories whose HEAD cannot be read
    pub head_fails: HashSet<String>,
}

/// In-memory git: a linear history per repository whose working tree is the
/// real manifest file on disk
#[derive(Clone, Default)]
pub struct FakeVcs {
    pub state: Arc<Mutex<VcsState>>,
}

fn manifest_file(repo: &RepositoryDescriptor) -> PathBuf {
    repo.path.join("pyproject.toml")
}

fn not_found(repo: &RepositoryDescriptor, operation: &str, reason: &str) -> mpr::MprError {
    VcsError::OperationFailed {
        operation: operation.to_string(),
        repository: repo.name.clone(),
        reason: reason.to_string(),
    }
    .into()
}

impl FakeVcs {
    /// Record the current manifest as the initial commit
    pub fn init(&self, repo: &RepositoryDescriptor) {
        let Ok(content) = std::fs::read(manifest_file(repo)) else {
            return;
        };
        let mut state = self.state.lock().unwrap();
        state.next_revision += 1;
        let revision = format!("{}-{}", repo.name, state.next_revision);
        let history = state.repos.entry(repo.name.clone()).or_default();
        history.snapshots.insert(revision.clone(), content);
        history.revisions.push(revision);
    }

    /// Create a tag at HEAD directly, as an earlier release would have
    pub fn add_tag(&self, repo: &str, tag: &str) {
        let mut state = self.state.lock().unwrap();
        let history = state.repos.get_mut(repo).unwrap();
        let head = history.revisions.last().unwrap().clone();
        history.tags.insert(tag.to_string(), head);
    }

    pub fn tags(&self, repo: &str) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state.repos[repo].tags.keys().cloned().collect()
    }

    pub fn head(&self, repo: &str) -> String {
        let state = self.state.lock().unwrap();
        state.repos[repo].revisions.last().unwrap().clone()
    }

    pub fn commit_messages(&self, repo: &str) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state.repos[repo].messages.clone()
    }

    pub fn fail_tags_for(&self, repo: &str) {
        self.state.lock().unwrap().tag_fails.insert(repo.to_string());
    }

    pub fn fail_head_for(&self, repo: &str) {
        self.state.lock().unwrap().head_fails.insert(repo.to_string());
    }

    pub fn pushes(&self) -> Vec<String> {
        self.state.lock().unwrap().pushes.clone()
    }

    fn is_clean(&self, repo: &RepositoryDescriptor) -> Result<bool> {
        let current = std::fs::read(manifest_file(repo))?;
        let state = self.state.lock().unwrap();
        let history = state
            .repos
            .get(&repo.name)
            .ok_or_else(|| not_found(repo, "status", "unknown repository"))?;
        let head = history.revisions.last().and_then(|r| history.snapshots.get(r));
        Ok(head == Some(&current))
    }
}

impl VcsOperations for FakeVcs {
    async fn commit(
        &self,
        repo: &RepositoryDescriptor,
        _paths: &[PathBuf],
        message: &str,
    ) -> Result<bool> {
        if self.is_clean(repo)? {
            return Ok(false);
        }
        let content = std::fs::read(manifest_file(repo))?;
        let mut state = self.state.lock().unwrap();
        state.next_revision += 1;
        let revision = format!("{}-{}", repo.name, state.next_revision);
        let history = state.repos.get_mut(&repo.name).unwrap();
        history.snapshots.insert(revision.clone(), content);
        history.revisions.push(revision);
        history.messages.push(message.to_string());
        Ok(true)
    }

    async fn tag(&self, repo: &RepositoryDescriptor, name: &str, _message: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.tag_fails.contains(&repo.name) {
            return Err(not_found(repo, "tag", "tagging disabled"));
        }
        let history = state.repos.get_mut(&repo.name).unwrap();
        if history.tags.contains_key(name) {
            return Err(not_found(repo, "tag", "tag already exists"));
        }
        let head = history.revisions.last().unwrap().clone();
        history.tags.insert(name.to_string(), head);
        Ok(())
    }

    async fn push(&self, repo: &RepositoryDescriptor) -> Result<()> {
        self.state.lock().unwrap().pushes.push(repo.name.clone());
        Ok(())
    }

    async fn push_tag(&self, repo: &RepositoryDescriptor, name: &str) -> Result<()> {
        self.state
            .lock()
            .unwrap()
            .pushed_tags
            .push((repo.name.clone(), name.to_string()));
        Ok(())
    }

    async fn tag_exists(&self, repo: &RepositoryDescriptor, name: &str) -> Result<bool> {
        let state = self.state.lock().unwrap();
        Ok(state
            .repos
            .get(&repo.name)
            .is_some_and(|h| h.tags.contains_key(name)))
    }

    async fn head_revision(&self, repo: &RepositoryDescriptor) -> Result<String> {
        let state = self.state.lock().unwrap();
        if state.head_fails.contains(&repo.name) {
            return Err(not_found(repo, "rev-parse", "HEAD unreadable"));
        }
        state
            .repos
            .get(&repo.name)
            .and_then(|h| h.revisions.last().cloned())
            .ok_or_else(|| not_found(repo, "rev-parse", "no commits"))
    }

    async fn reset_hard(&self, repo: &RepositoryDescriptor, revision: &str) -> Result<()> {
        let content = {
            let mut state = self.state.lock().unwrap();
            let history = state
                .repos
                .get_mut(&repo.name)
                .ok_or_else(|| not_found(repo, "reset", "unknown repository"))?;
            let position = history
                .revisions
                .iter()
                .position(|r| r == revision)
                .ok_or_else(|| not_found(repo, "reset", "unknown revision"))?;
            history.revisions.truncate(position + 1);
            history.snapshots[revision].clone()
        };
        std::fs::write(manifest_file(repo), content)?;
        Ok(())
    }

    async fn is_ancestor(
        &self,
        repo: &RepositoryDescriptor,
        revision: &str,
        head: &str,
    ) -> Result<bool> {
        let state = self.state.lock().unwrap();
        let history = &state.repos[&repo.name];
        let position = |r: &str| history.revisions.iter().position(|x| x == r);
        Ok(match (position(revision), position(head)) {
            (Some(rev), Some(head)) => rev <= head,
            _ => false,
        })
    }

    async fn working_tree_clean(&self, repo: &RepositoryDescriptor) -> Result<bool> {
        self.is_clean(repo)
    }

    async fn list_tags(&self, repo: &RepositoryDescriptor) -> Result<Vec<String>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .repos
            .get(&repo.name)
            .map(|h| h.tags.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn tag_target(&self, repo: &RepositoryDescriptor, name: &str) -> Result<String> {
        let state = self.state.lock().unwrap();
        state.repos[&repo.name]
            .tags
            .get(name)
            .cloned()
            .ok_or_else(|| not_found(repo, "rev-list", "unknown tag"))
    }

    async fn delete_tag(&self, repo: &RepositoryDescriptor, name: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.repos.get_mut(&repo.name).unwrap().tags.remove(name);
        Ok(())
    }

    async fn latest_tag(&self, repo: &RepositoryDescriptor) -> Result<Option<String>> {
        let state = self.state.lock().unwrap();
        let history = &state.repos[&repo.name];
        Ok(history
            .tags
            .iter()
            .filter_map(|(tag, target)| {
                let position = history.revisions.iter().position(|r| r == target)?;
                Some((position, tag.clone()))
            })
            .max()
            .map(|(_, tag)| tag))
    }
}

#[derive(Default)]
pub struct TestsState {
    /// `(repository, suite)` for every run
    pub runs: Vec<(String, TestSuite)>,
    scripted: HashMap<(String, TestSuite), TestOutcome>,
}

/// Scripted test outcomes, `Passed` unless told otherwise
#[derive(Clone, Default)]
pub struct FakeTests {
    pub state: Arc<Mutex<TestsState>>,
}

impl FakeTests {
    pub fn script(&self, repo: &str, suite: TestSuite, outcome: TestOutcome) {
        self.state
            .lock()
            .unwrap()
            .scripted
            .insert((repo.to_string(), suite), outcome);
    }

    pub fn runs(&self) -> Vec<(String, TestSuite)> {
        self.state.lock().unwrap().runs.clone()
    }
}

impl TestOperations for FakeTests {
    async fn run(&self, repo: &RepositoryDescriptor, suite: TestSuite) -> Result<TestOutcome> {
        let mut state = self.state.lock().unwrap();
        state.runs.push((repo.name.clone(), suite));
        Ok(state
            .scripted
            .get(&(repo.name.clone(), suite))
            .cloned()
            .unwrap_or(TestOutcome::Passed))
    }
}
