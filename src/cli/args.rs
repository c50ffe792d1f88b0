//! Command line argument parsing.

use crate::error::Result;
use crate::release::ReleaseStage;
use crate::version::VersionBump;
use crate::workspace::{SharedWorkspaceInfo, WorkspaceInfo};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

/// Coordinated versioning and staged releases for multi-repository Poetry workspaces
#[derive(Parser, Debug)]
#[command(name = "mpr", version, about, long_about = None)]
pub struct Args {
    /// Workspace root (defaults to the nearest directory containing mpr.toml)
    #[arg(long, global = true, env = "MPR_WORKSPACE", value_name = "DIR")]
    pub workspace: Option<PathBuf>,

    /// Show debug-level detail
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Command to run
    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Staged releases across repositories
    Release {
        /// Release action
        #[command(subcommand)]
        action: ReleaseCommand,
    },
    /// Version bumps and dependency synchronization
    Version {
        /// Version action
        #[command(subcommand)]
        action: VersionCommand,
    },
}

/// `mpr release ...`
#[derive(Subcommand, Debug)]
pub enum ReleaseCommand {
    /// Release repositories at a stage
    Create {
        /// Release stage
        #[arg(long, value_enum)]
        stage: ReleaseStage,

        /// Repositories to release, comma separated (default: all)
        #[arg(long, value_delimiter = ',')]
        repositories: Vec<String>,

        /// Base version for every released repository
        #[arg(long)]
        version: Option<String>,

        /// Per-repository base versions as a JSON object
        #[arg(long, value_name = "JSON")]
        repo_versions: Option<String>,

        /// Show what would be released without changing anything
        #[arg(long)]
        dry_run: bool,

        /// Skip unit and integration tests
        #[arg(long)]
        skip_tests: bool,

        /// Continue past failures and never roll back
        #[arg(long)]
        force: bool,

        /// Release independent repositories concurrently (dev stage only)
        #[arg(long)]
        parallel: bool,
    },
    /// Current version, last tag, and pending changes per repository
    Status,
    /// Restore every repository from the latest backup
    Rollback {
        /// Skip the confirmation prompt
        #[arg(long)]
        confirm: bool,
    },
}

/// `mpr version ...`
#[derive(Subcommand, Debug)]
pub enum VersionCommand {
    /// Bump one repository and cascade to its dependents
    Bump {
        /// Repository to bump
        repository: String,

        /// Bump kind
        #[arg(value_enum)]
        bump_type: VersionBump,

        /// Produce an alpha pre-release
        #[arg(long)]
        alpha: bool,

        /// Show the new versions without changing anything
        #[arg(long)]
        dry_run: bool,

        /// Leave dependents alone
        #[arg(long)]
        no_update_dependents: bool,

        /// Bump kind for dependents
        #[arg(long, value_enum, default_value = "patch")]
        dependents_bump: VersionBump,

        /// Skip running the affected repositories' tests
        #[arg(long)]
        no_validate: bool,
    },
    /// Versions, requirements, and recent history
    Status {
        /// Limit to one repository
        #[arg(long)]
        repository: Option<String>,

        /// List each repository's dependents
        #[arg(long)]
        show_dependents: bool,
    },
    /// Point every managed requirement at the dependency's current version
    Sync {
        /// Show mismatches without changing anything
        #[arg(long)]
        dry_run: bool,

        /// Apply without asking
        #[arg(long)]
        force: bool,
    },
}

impl Command {
    /// Command name for messages
    pub fn name(&self) -> &'static str {
        match self {
            Command::Release { action } => match action {
                ReleaseCommand::Create { .. } => "release create",
                ReleaseCommand::Status => "release status",
                ReleaseCommand::Rollback { .. } => "release rollback",
            },
            Command::Version { action } => match action {
                VersionCommand::Bump { .. } => "version bump",
                VersionCommand::Status { .. } => "version status",
                VersionCommand::Sync { .. } => "version sync",
            },
        }
    }
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

/// Configuration derived from command line arguments
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    output: super::OutputManager,
    workspace_root: Option<PathBuf>,
}

impl From<&Args> for RuntimeConfig {
    fn from(args: &Args) -> Self {
        Self {
            output: super::OutputManager::new(args.verbose, args.quiet),
            workspace_root: args.workspace.clone(),
        }
    }
}

impl RuntimeConfig {
    /// Get a reference to the output manager
    pub fn output(&self) -> &super::OutputManager {
        &self.output
    }

    /// Load the workspace named by `--workspace`, or discover it from the current directory
    pub fn load_workspace(&self) -> Result<SharedWorkspaceInfo> {
        let info = match &self.workspace_root {
            Some(root) => WorkspaceInfo::load(root)?,
            None => WorkspaceInfo::analyze(std::env::current_dir()?)?,
        };
        Ok(Arc::new(info))
    }

    /// Print message
    pub fn println(&self, message: &str) {
        let _ = self.output.println(message);
    }

    /// Print message only in verbose mode
    pub fn verbose_println(&self, message: &str) {
        let _ = self.output.verbose(message);
    }

    /// Print error message (always shown)
    pub fn error_println(&self, message: &str) {
        self.output.error(message);
    }

    /// Print warning message
    pub fn warning_println(&self, message: &str) {
        let _ = self.output.warn(message);
    }

    /// Print success message
    pub fn success_println(&self, message: &str) {
        let _ = self.output.success(message);
    }

    /// Print a section header
    pub fn section(&self, title: &str) {
        let _ = self.output.section(title);
    }

    /// Print indented text
    pub fn indent(&self, message: &str) {
        let _ = self.output.indent(message);
    }

    /// Check if verbose output is enabled
    pub fn is_verbose(&self) -> bool {
        self.output.is_verbose()
    }

    /// Check if quiet mode is enabled
    pub fn is_quiet(&self) -> bool {
        self.output.is_quiet()
    }
}
