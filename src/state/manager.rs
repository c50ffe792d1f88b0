//! Atomic JSON persistence for workspace state files.
//!
//! Writes go to a temporary sibling file that is synced and then renamed over
//! the target, so readers never observe a half-written file. Concurrent
//! invocations against the same workspace are not guarded against.

use crate::error::{Result, StateError};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Reads and writes one JSON state file
#[derive(Debug, Clone)]
pub struct StateManager {
    /// Path to state file
    state_file_path: PathBuf,
}

impl StateManager {
    /// Create a new state manager
    pub fn new<P: AsRef<Path>>(state_file_path: P) -> Self {
        Self {
            state_file_path: state_file_path.as_ref().to_path_buf(),
        }
    }

    /// Serialize `state` and atomically replace the file
    pub fn save<T: Serialize>(&self, state: &T) -> Result<()> {
        let serialized =
            serde_json::to_string_pretty(state).map_err(|e| StateError::SaveFailed {
                reason: format!("Failed to serialize state: {}", e),
            })?;

        if let Some(parent) = self.state_file_path.parent() {
            fs::create_dir_all(parent).map_err(|e| StateError::SaveFailed {
                reason: format!("Failed to create {}: {}", parent.display(), e),
            })?;
        }

        let temp_file_path = self.state_file_path.with_extension("tmp");
        {
            let mut file =
                fs::File::create(&temp_file_path).map_err(|e| StateError::SaveFailed {
                    reason: format!("Failed to create temp file: {}", e),
                })?;

            file.write_all(serialized.as_bytes())
                .map_err(|e| StateError::SaveFailed {
                    reason: format!("Failed to write state: {}", e),
                })?;

            file.sync_all().map_err(|e| StateError::SaveFailed {
                reason: format!("Failed to sync file: {}", e),
            })?;
        }

        fs::rename(&temp_file_path, &self.state_file_path).map_err(|e| StateError::SaveFailed {
            reason: format!("Failed to rename temp file: {}", e),
        })?;

        Ok(())
    }

    /// Load the file, `None` when it does not exist
    pub fn load<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        let content = match fs::read_to_string(&self.state_file_path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(StateError::LoadFailed {
                    reason: format!(
                        "Failed to read {}: {}",
                        self.state_file_path.display(),
                        e
                    ),
                }
                .into());
            }
        };

        let state = serde_json::from_str(&content).map_err(|e| StateError::Corrupted {
            reason: format!("{}: {}", self.state_file_path.display(), e),
        })?;
        Ok(Some(state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/state.json");
        let manager = StateManager::new(&path);
        assert!(manager.load::<Vec<u32>>().unwrap().is_none());

        manager.save(&vec![1u32, 2, 3]).unwrap();
        assert!(path.is_file());
        assert!(!dir.path().join("nested/state.tmp").exists());
        assert_eq!(manager.load::<Vec<u32>>().unwrap(), Some(vec![1, 2, 3]));

        manager.save(&vec![4u32]).unwrap();
        assert_eq!(manager.load::<Vec<u32>>().unwrap(), Some(vec![4]));
    }

    #[test]
    fn corrupted_file_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{not json").unwrap();
        let err = StateManager::new(&path).load::<Vec<u32>>().unwrap_err();
        assert!(err.to_string().contains("corrupted"));
    }
}
