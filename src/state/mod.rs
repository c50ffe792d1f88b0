//! Persisted workspace state.
//!
//! Atomic JSON files plus the pre-release backup and restore machinery.

mod backup;
mod manager;

pub use backup::{
    BackupSet, BackupStore, RepositoryBackup, RestoreReport, create_backups, restore,
};
pub use manager::StateManager;
