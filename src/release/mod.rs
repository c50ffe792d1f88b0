//! Stage-aware release orchestration.

mod orchestrator;
mod report;
mod retry;
mod stage;

pub use orchestrator::{ReleaseOrchestrator, ReleaseRequest, RepositoryReleaseStatus, RollbackReport};
pub use retry::{RetryPolicy, retry_with_backoff};
pub use report::{ReleaseReport, ReleaseStatus, RepoOutcome, RepositoryRelease};
pub use stage::ReleaseStage;
