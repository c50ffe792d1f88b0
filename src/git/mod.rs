//! Git operations for release workflows.
//!
//! The core talks to version control through [`VcsOperations`]; [`GitCli`]
//! implements it on top of the git executable.

mod git_adapter;
mod operations;

pub use git_adapter::GitCli;
pub use operations::{VcsOperations, tag_message, tag_name};
