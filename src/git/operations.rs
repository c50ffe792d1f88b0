//! Version-control operations needed by releases, rollbacks, and cascades.
//!
//! This module defines the VcsOperations trait. The production implementation
//! is provided by the git_adapter module, which drives the git executable.

use crate::error::Result;
use crate::workspace::RepositoryDescriptor;
use std::future::Future;
use std::path::PathBuf;

/// Name of the release tag for a version
pub fn tag_name(version: &str) -> String {
    format!("v{}", version)
}

/// Annotation message of the release tag for a version
pub fn tag_message(version: &str) -> String {
    format!("Release v{}", version)
}

/// Trait defining every version-control operation the core relies on.
///
/// Each call addresses one repository; implementations hold no per-repository state.
pub trait VcsOperations: Send + Sync {
    /// Stage `paths` and commit them. Returns `false` when nothing was staged.
    fn commit(
        &self,
        repo: &RepositoryDescriptor,
        paths: &[PathBuf],
        message: &str,
    ) -> impl Future<Output = Result<bool>> + Send;

    /// Create an annotated tag on HEAD
    fn tag(
        &self,
        repo: &RepositoryDescriptor,
        name: &str,
        message: &str,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Push the current branch
    fn push(&self, repo: &RepositoryDescriptor) -> impl Future<Output = Result<()>> + Send;

    /// Push a single tag
    fn push_tag(
        &self,
        repo: &RepositoryDescriptor,
        name: &str,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Check if a tag exists locally
    fn tag_exists(
        &self,
        repo: &RepositoryDescriptor,
        name: &str,
    ) -> impl Future<Output = Result<bool>> + Send;

    /// Revision id of HEAD
    fn head_revision(
        &self,
        repo: &RepositoryDescriptor,
    ) -> impl Future<Output = Result<String>> + Send;

    /// Hard-reset the working tree to `revision`
    fn reset_hard(
        &self,
        repo: &RepositoryDescriptor,
        revision: &str,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Whether `revision` is an ancestor of (or equal to) `head`
    fn is_ancestor(
        &self,
        repo: &RepositoryDescriptor,
        revision: &str,
        head: &str,
    ) -> impl Future<Output = Result<bool>> + Send;

    /// Whether the working tree has no uncommitted changes
    fn working_tree_clean(
        &self,
        repo: &RepositoryDescriptor,
    ) -> impl Future<Output = Result<bool>> + Send;

    /// All local tag names
    fn list_tags(
        &self,
        repo: &RepositoryDescriptor,
    ) -> impl Future<Output = Result<Vec<String>>> + Send;

    /// Commit a tag points at
    fn tag_target(
        &self,
        repo: &RepositoryDescriptor,
        name: &str,
    ) -> impl Future<Output = Result<String>> + Send;

    /// Delete a local tag
    fn delete_tag(
        &self,
        repo: &RepositoryDescriptor,
        name: &str,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Most recent tag reachable from HEAD, if any
    fn latest_tag(
        &self,
        repo: &RepositoryDescriptor,
    ) -> impl Future<Output = Result<Option<String>>> + Send;
}
