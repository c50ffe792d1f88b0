//! Comprehensive error types for mpr operations.
//!
//! This module defines all error types with actionable error messages and recovery suggestions.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for mpr operations
pub type Result<T> = std::result::Result<T, MprError>;

/// Main error type for all mpr operations
#[derive(Error, Debug)]
pub enum MprError {
    /// Workspace configuration errors (fatal before any mutation)
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Version management errors
    #[error("Version error: {0}")]
    Version(#[from] VersionError),

    /// Manifest read/write errors
    #[error("Manifest error: {0}")]
    Manifest(#[from] ManifestError),

    /// External tool errors (poetry, pytest, ...)
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    /// Git operation errors
    #[error("Git error: {0}")]
    Vcs(#[from] VcsError),

    /// Test suite errors
    #[error("Test error: {0}")]
    Test(#[from] TestError),

    /// Persisted state errors (backups, version history)
    #[error("State error: {0}")]
    State(#[from] StateError),

    /// CLI argument errors
    #[error("CLI error: {0}")]
    Cli(#[from] CliError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML editing errors
    #[error("TOML edit error: {0}")]
    TomlEdit(#[from] toml_edit::TomlError),

    /// Generic errors from anyhow
    #[error("{0}")]
    Anyhow(#[from] anyhow::Error),
}

/// Workspace configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// No configuration file found while walking up from the start directory
    #[error("Could not find mpr.toml. Please run from within an mpr workspace.")]
    RootNotFound,

    /// Configuration file could not be parsed
    #[error("Invalid configuration at {path}: {reason}")]
    Invalid {
        /// Path to the configuration file
        path: PathBuf,
        /// Reason for the error
        reason: String,
    },

    /// Repository not declared in the configuration
    #[error("Repository '{name}' not found in configuration")]
    RepositoryNotFound {
        /// Repository name
        name: String,
    },

    /// Repository declared but its checkout is missing
    #[error("Repository '{name}' does not exist at {path}")]
    RepositoryMissing {
        /// Repository name
        name: String,
        /// Expected checkout path
        path: PathBuf,
    },

    /// Repository declared more than once
    #[error("Repository '{name}' is declared more than once")]
    DuplicateRepository {
        /// Repository name
        name: String,
    },

    /// Circular dependency detected
    #[error("Circular dependency detected involving '{node}'")]
    CircularDependency {
        /// Repository on which the cycle was re-entered
        node: String,
    },

    /// Per-repository version override names a repository outside the release set
    #[error("Repository '{name}' specified in versions but not in release list")]
    VersionOutsideTargets {
        /// Repository name
        name: String,
    },
}

/// Version management errors
#[derive(Error, Debug)]
pub enum VersionError {
    /// Invalid version format
    #[error("Invalid version '{version}': {reason}")]
    InvalidVersion {
        /// Version string
        version: String,
        /// Reason for the error
        reason: String,
    },

    /// Version parsing failed
    #[error("Failed to parse version '{version}': {source}")]
    ParseFailed {
        /// Version string
        version: String,
        /// Parsing error
        #[source]
        source: semver::Error,
    },

    /// Manifest has no usable version
    #[error("Could not determine current version for '{repository}'")]
    Unavailable {
        /// Repository name
        repository: String,
    },
}

/// Manifest errors
#[derive(Error, Debug)]
pub enum ManifestError {
    /// Manifest file missing
    #[error("Missing pyproject.toml at {path}")]
    Missing {
        /// Path where the manifest was expected
        path: PathBuf,
    },

    /// Manifest could not be parsed or edited
    #[error("Failed to update pyproject.toml at {path}: {reason}")]
    UpdateFailed {
        /// Path to the manifest
        path: PathBuf,
        /// Reason for the error
        reason: String,
    },

    /// Requirement names a package the manifest does not declare
    #[error("Dependency '{package}' not declared in manifest of '{repository}'")]
    DependencyNotDeclared {
        /// Repository name
        repository: String,
        /// Package name
        package: String,
    },
}

/// External tool errors
#[derive(Error, Debug)]
pub enum ToolError {
    /// Executable not on PATH
    #[error("Executable '{program}' not found on PATH")]
    NotFound {
        /// Program name
        program: String,
    },

    /// Command exited with nonzero status
    #[error("Command '{command}' failed (exit code {code:?}): {stderr}")]
    Failed {
        /// Command line
        command: String,
        /// Exit code if the process exited normally
        code: Option<i32>,
        /// Captured stderr
        stderr: String,
    },

    /// Command exceeded its time budget
    #[error("Command '{command}' timed out after {}s", timeout.as_secs())]
    Timeout {
        /// Command line
        command: String,
        /// Budget that was exceeded
        timeout: Duration,
    },

    /// Both lock regeneration forms failed
    #[error("Lock regeneration failed for '{repository}': {reason}")]
    LockFailed {
        /// Repository name
        repository: String,
        /// Reason reported by the last attempt
        reason: String,
    },
}

/// Git operation errors
#[derive(Error, Debug)]
pub enum VcsError {
    /// Not a git repository
    #[error("'{path}' is not a git repository")]
    NotRepository {
        /// Path that was inspected
        path: PathBuf,
    },

    /// A git command failed
    #[error("git {operation} failed in '{repository}': {reason}")]
    OperationFailed {
        /// Operation that failed
        operation: String,
        /// Repository name
        repository: String,
        /// Reason for the error
        reason: String,
    },
}

/// Test suite errors
#[derive(Error, Debug)]
pub enum TestError {
    /// Test suite reported failures
    #[error("Tests failed for '{repository}'")]
    Failed {
        /// Repository name
        repository: String,
        /// Captured output
        output: String,
    },

    /// Test suite exceeded its time budget
    #[error("Tests timed out for '{repository}'")]
    Timeout {
        /// Repository name
        repository: String,
    },

    /// Integration suite failed for one or more repositories
    #[error("Integration tests failed for: {repositories:?}")]
    IntegrationFailed {
        /// Repositories whose integration suite failed
        repositories: Vec<String>,
    },
}

/// Persisted state errors
#[derive(Error, Debug)]
pub enum StateError {
    /// No backup folder available
    #[error("No backup found to rollback")]
    NoBackup,

    /// State file corrupted
    #[error("State file corrupted: {reason}")]
    Corrupted {
        /// Reason for the error
        reason: String,
    },

    /// Failed to save state
    #[error("Failed to save state: {reason}")]
    SaveFailed {
        /// Reason for the error
        reason: String,
    },

    /// Failed to load state
    #[error("Failed to load state: {reason}")]
    LoadFailed {
        /// Reason for the error
        reason: String,
    },
}

/// CLI-specific errors
#[derive(Error, Debug)]
pub enum CliError {
    /// Invalid command line arguments
    #[error("Invalid arguments: {reason}")]
    InvalidArguments {
        /// Reason for the error
        reason: String,
    },

    /// User declined a confirmation prompt
    #[error("Operation cancelled: {operation}")]
    Cancelled {
        /// Operation that was cancelled
        operation: String,
    },
}

impl MprError {
    /// Get actionable recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            MprError::Config(ConfigError::RootNotFound) => vec![
                "Navigate to a directory containing mpr.toml".to_string(),
                "Or pass --workspace <DIR> / set MPR_WORKSPACE".to_string(),
            ],
            MprError::Config(ConfigError::CircularDependency { node }) => vec![
                format!("Review the dependencies declared for '{}'", node),
                "Remove circular dependencies by restructuring repository relationships"
                    .to_string(),
            ],
            MprError::Config(ConfigError::RepositoryMissing { name, .. }) => vec![
                format!("Clone '{}' into the repos/ directory", name),
            ],
            MprError::Version(VersionError::Unavailable { repository }) => vec![
                format!(
                    "Set [tool.poetry].version in {}/pyproject.toml",
                    repository
                ),
            ],
            MprError::Tool(ToolError::NotFound { program }) => vec![
                format!("Install '{}' and make sure it is on PATH", program),
            ],
            MprError::Tool(ToolError::LockFailed { repository, .. }) => vec![
                format!("Run 'poetry lock --regenerate' in {} manually", repository),
                "Check that every dependency version is resolvable".to_string(),
            ],
            MprError::State(StateError::NoBackup) => vec![
                "Backups are written by 'mpr release create' (non dry-run)".to_string(),
            ],
            _ => vec!["Check the error message above for specific details".to_string()],
        }
    }

    /// Check if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            MprError::Config(_)
                | MprError::Cli(_)
                | MprError::Tool(ToolError::NotFound { .. })
                | MprError::Vcs(VcsError::NotRepository { .. })
                | MprError::Version(VersionError::InvalidVersion { .. })
                | MprError::Version(VersionError::ParseFailed { .. })
                | MprError::Test(TestError::Timeout { .. })
        )
    }
}
