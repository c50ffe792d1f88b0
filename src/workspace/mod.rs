//! Workspace configuration and dependency management.
//!
//! This module loads `mpr.toml`, resolves repository descriptors, and builds
//! the dependency graph that drives every processing order.

mod analyzer;
mod dependency;

pub use analyzer::{
    BACKUPS_DIR, CONFIG_FILE, HISTORY_FILE, REPOS_DIR, RepositoryConfig, RepositoryDescriptor,
    Settings, SharedWorkspaceInfo, WorkspaceConfig, WorkspaceInfo, WorkspaceSection,
};
pub use dependency::DependencyGraph;
