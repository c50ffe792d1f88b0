//! Append-only version-history ledger.

use crate::error::Result;
use crate::state::StateManager;
use crate::version::VersionBump;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One recorded bump
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionHistoryEntry {
    /// When the bump happened
    pub timestamp: DateTime<Utc>,
    /// Repository that was bumped
    pub repository: String,
    /// Version before the bump
    pub old_version: String,
    /// Version after the bump
    pub new_version: String,
    /// Requested bump kind
    pub bump_type: VersionBump,
    /// Whether the new version is an alpha
    pub is_alpha: bool,
    /// Dependents moved by the cascade
    #[serde(default)]
    pub dependents_updated: Vec<String>,
}

/// Bounded ledger persisted as a JSON array
#[derive(Debug, Clone)]
pub struct VersionHistory {
    store: StateManager,
    limit: usize,
}

impl VersionHistory {
    /// Ledger at `path` retaining the last `limit` entries
    pub fn new<P: AsRef<Path>>(path: P, limit: usize) -> Self {
        Self {
            store: StateManager::new(path),
            limit,
        }
    }

    /// Every retained entry, oldest first
    pub fn entries(&self) -> Result<Vec<VersionHistoryEntry>> {
        Ok(self.store.load()?.unwrap_or_default())
    }

    /// Append an entry, dropping the oldest beyond the limit
    pub fn append(&self, entry: VersionHistoryEntry) -> Result<()> {
        let mut entries = self.entries()?;
        entries.push(entry);
        if entries.len() > self.limit {
            let excess = entries.len() - self.limit;
            entries.drain(..excess);
        }
        self.store.save(&entries)
    }

    /// The last `count` entries, optionally for one repository, oldest first
    pub fn recent(
        &self,
        count: usize,
        repository: Option<&str>,
    ) -> Result<Vec<VersionHistoryEntry>> {
        let mut matching: Vec<_> = self
            .entries()?
            .into_iter()
            .filter(|e| repository.is_none_or(|r| e.repository == r))
            .collect();
        let skip = matching.len().saturating_sub(count);
        matching.drain(..skip);
        Ok(matching)
    }
}
