//! VcsOperations implementation backed by the git command line.

use crate::error::{MprError, Result, VcsError};
use crate::git::VcsOperations;
use crate::process::{self, CommandOutput};
use crate::workspace::RepositoryDescriptor;
use std::path::PathBuf;
use std::time::Duration;

/// Budget for local git commands
const GIT_TIMEOUT: Duration = Duration::from_secs(120);

/// Budget for commands that talk to a remote
const GIT_REMOTE_TIMEOUT: Duration = Duration::from_secs(300);

/// Git operations using the `git` executable
#[derive(Debug, Clone)]
pub struct GitCli {
    remote: String,
}

impl Default for GitCli {
    fn default() -> Self {
        Self {
            remote: "origin".to_string(),
        }
    }
}

impl GitCli {
    /// Create an adapter pushing to `origin`
    pub fn new() -> Self {
        Self::default()
    }

    async fn raw(
        &self,
        repo: &RepositoryDescriptor,
        args: &[&str],
        timeout: Duration,
    ) -> Result<CommandOutput> {
        if !repo.path.join(".git").exists() {
            return Err(VcsError::NotRepository {
                path: repo.path.clone(),
            }
            .into());
        }
        process::run("git", args, &repo.path, timeout).await
    }

    /// Run git and require a zero exit status
    async fn git(&self, repo: &RepositoryDescriptor, args: &[&str]) -> Result<CommandOutput> {
        self.git_with_timeout(repo, args, GIT_TIMEOUT).await
    }

    async fn git_with_timeout(
        &self,
        repo: &RepositoryDescriptor,
        args: &[&str],
        timeout: Duration,
    ) -> Result<CommandOutput> {
        let output = self.raw(repo, args, timeout).await?;
        if output.success() {
            Ok(output)
        } else {
            Err(failed(repo, args, &output))
        }
    }
}

fn failed(repo: &RepositoryDescriptor, args: &[&str], output: &CommandOutput) -> MprError {
    VcsError::OperationFailed {
        operation: args.first().copied().unwrap_or("git").to_string(),
        repository: repo.name.clone(),
        reason: output.combined().trim().to_string(),
    }
    .into()
}

impl VcsOperations for GitCli {
    async fn commit(
        &self,
        repo: &RepositoryDescriptor,
        paths: &[PathBuf],
        message: &str,
    ) -> Result<bool> {
        let path_args: Vec<String> = paths
            .iter()
            .filter(|p| p.exists())
            .map(|p| {
                p.strip_prefix(&repo.path)
                    .unwrap_or(p)
                    .to_string_lossy()
                    .into_owned()
            })
            .collect();
        if path_args.is_empty() {
            return Ok(false);
        }

        let mut add_args = vec!["add", "--"];
        add_args.extend(path_args.iter().map(String::as_str));
        self.git(repo, &add_args).await?;

        // `diff --cached --quiet` exits 1 when something is staged
        let staged = self
            .raw(repo, &["diff", "--cached", "--quiet"], GIT_TIMEOUT)
            .await?;
        if staged.success() {
            log::debug!("Nothing to commit in '{}'", repo.name);
            return Ok(false);
        }

        self.git(repo, &["commit", "-m", message]).await?;
        Ok(true)
    }

    async fn tag(&self, repo: &RepositoryDescriptor, name: &str, message: &str) -> Result<()> {
        self.git(repo, &["tag", "-a", name, "-m", message]).await?;
        Ok(())
    }

    async fn push(&self, repo: &RepositoryDescriptor) -> Result<()> {
        self.git_with_timeout(repo, &["push", self.remote.as_str(), "HEAD"], GIT_REMOTE_TIMEOUT)
            .await?;
        Ok(())
    }

    async fn push_tag(&self, repo: &RepositoryDescriptor, name: &str) -> Result<()> {
        self.git_with_timeout(repo, &["push", self.remote.as_str(), name], GIT_REMOTE_TIMEOUT)
            .await?;
        Ok(())
    }

    async fn tag_exists(&self, repo: &RepositoryDescriptor, name: &str) -> Result<bool> {
        let output = self.git(repo, &["tag", "--list", name]).await?;
        Ok(output.stdout.lines().any(|line| line.trim() == name))
    }

    async fn head_revision(&self, repo: &RepositoryDescriptor) -> Result<String> {
        let output = self.git(repo, &["rev-parse", "HEAD"]).await?;
        Ok(output.stdout.trim().to_string())
    }

    async fn reset_hard(&self, repo: &RepositoryDescriptor, revision: &str) -> Result<()> {
        self.git(repo, &["reset", "--hard", revision]).await?;
        Ok(())
    }

    async fn is_ancestor(
        &self,
        repo: &RepositoryDescriptor,
        revision: &str,
        head: &str,
    ) -> Result<bool> {
        let args = ["merge-base", "--is-ancestor", revision, head];
        let output = self.raw(repo, &args, GIT_TIMEOUT).await?;
        match output.code {
            Some(0) => Ok(true),
            Some(1) => Ok(false),
            _ => Err(failed(repo, &args, &output)),
        }
    }

    async fn working_tree_clean(&self, repo: &RepositoryDescriptor) -> Result<bool> {
        let output = self.git(repo, &["status", "--porcelain"]).await?;
        Ok(output.stdout.trim().is_empty())
    }

    async fn list_tags(&self, repo: &RepositoryDescriptor) -> Result<Vec<String>> {
        let output = self.git(repo, &["tag", "--list"]).await?;
        Ok(output
            .stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }

    async fn tag_target(&self, repo: &RepositoryDescriptor, name: &str) -> Result<String> {
        let output = self.git(repo, &["rev-list", "-n", "1", name]).await?;
        Ok(output.stdout.trim().to_string())
    }

    async fn delete_tag(&self, repo: &RepositoryDescriptor, name: &str) -> Result<()> {
        self.git(repo, &["tag", "-d", name]).await?;
        Ok(())
    }

    async fn latest_tag(&self, repo: &RepositoryDescriptor) -> Result<Option<String>> {
        let output = self
            .raw(repo, &["describe", "--tags", "--abbrev=0"], GIT_TIMEOUT)
            .await?;
        // describe fails when no tag is reachable
        if output.success() {
            Ok(Some(output.stdout.trim().to_string()))
        } else {
            Ok(None)
        }
    }
}
