//! Versioning for workspace repositories.
//!
//! The semantic-version model, the version-history ledger, the dependent
//! cascade, and the coordinator that ties them to the manifest and test ports.

mod bumper;
pub mod cascade;
mod coordinator;
mod history;

pub use bumper::{SemanticVersion, VersionBump, is_compatible};
pub use cascade::{CascadeOutcome, CascadePolicy, CascadeStep};
pub use coordinator::{
    BumpReport, BumpRequest, DependencyStatus, RepositoryVersionStatus, SyncMismatch, SyncReport,
    VersionCoordinator, VersionStatus,
};
pub use history::{VersionHistory, VersionHistoryEntry};
