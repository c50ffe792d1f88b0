//! # mpr
//!
//! Coordinated versioning and staged releases for interdependent Python
//! packages that live in separate repositories of one workspace.
//!
//! ## Features
//!
//! - **Dependency ordering**: repositories are processed dependencies-first; cycles are rejected before anything is written
//! - **Version cascade**: a bump propagates to every transitive dependent, each visited once
//! - **Staged releases**: dev, rc, and prod stages with idempotent production re-runs
//! - **Rollback**: manifests, revisions, lock files, and tags are restored from per-run backups
//!
//! ## Usage
//!
//! ```bash
//! mpr version bump core minor --alpha     # Bump core and cascade to dependents
//! mpr release create --stage prod         # Release every repository
//! mpr release rollback --confirm          # Restore the latest backup
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod cli;
pub mod error;
pub mod git;
pub mod manifest;
pub mod pool;
pub mod ports;
pub mod process;
pub mod release;
pub mod state;
pub mod testing;
pub mod version;
pub mod workspace;

pub use cli::Args;
pub use error::{MprError, Result};
pub use git::{GitCli, VcsOperations};
pub use manifest::{ManifestOperations, PoetryManifest, Requirement};
pub use ports::{Ports, SystemPorts};
pub use release::{ReleaseOrchestrator, ReleaseReport, ReleaseRequest, ReleaseStage};
pub use state::{BackupStore, StateManager};
pub use testing::{PytestRunner, TestOperations};
pub use version::{SemanticVersion, VersionBump, VersionCoordinator};
pub use workspace::{DependencyGraph, RepositoryDescriptor, WorkspaceInfo};
