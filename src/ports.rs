//! The external collaborators the core drives, bundled for sharing.

use crate::git::{GitCli, VcsOperations};
use crate::manifest::{ManifestOperations, PoetryManifest};
use crate::testing::{PytestRunner, TestOperations};
use crate::workspace::Settings;
use std::sync::Arc;
use std::time::Duration;

/// Manifest, version-control, and test collaborators
pub struct Ports<M, V, T> {
    /// Manifest reads and edits
    pub manifest: Arc<M>,
    /// Version control
    pub vcs: Arc<V>,
    /// Test execution
    pub tests: Arc<T>,
}

impl<M, V, T> Clone for Ports<M, V, T> {
    fn clone(&self) -> Self {
        Self {
            manifest: Arc::clone(&self.manifest),
            vcs: Arc::clone(&self.vcs),
            tests: Arc::clone(&self.tests),
        }
    }
}

impl<M, V, T> Ports<M, V, T>
where
    M: ManifestOperations,
    V: VcsOperations,
    T: TestOperations,
{
    /// Bundle three collaborators
    pub fn new(manifest: M, vcs: V, tests: T) -> Self {
        Self {
            manifest: Arc::new(manifest),
            vcs: Arc::new(vcs),
            tests: Arc::new(tests),
        }
    }
}

/// Collaborators backed by poetry, git, and pytest
pub type SystemPorts = Ports<PoetryManifest, GitCli, PytestRunner>;

impl SystemPorts {
    /// Wire the real command-line tools; `settings.timeout` bounds each test run
    pub fn system(settings: &Settings) -> Self {
        Ports::new(
            PoetryManifest::new(),
            GitCli::new(),
            PytestRunner::new().with_timeout(Duration::from_secs(settings.timeout)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_comes_from_settings() {
        let settings = Settings {
            timeout: 42,
            ..Settings::default()
        };
        let ports = SystemPorts::system(&settings);
        assert_eq!(ports.tests.timeout(), Duration::from_secs(42));

        let defaults = SystemPorts::system(&Settings::default());
        assert_eq!(defaults.tests.timeout(), Duration::from_secs(3600));
    }
}
