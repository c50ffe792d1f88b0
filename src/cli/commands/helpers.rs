//! Shared helper functions for command execution.

use crate::cli::RuntimeConfig;
use crate::error::{CliError, MprError, Result};
use std::collections::BTreeMap;

/// Parse `--repo-versions` JSON into a repository → version map
pub(super) fn parse_repo_versions(json: Option<&str>) -> Result<BTreeMap<String, String>> {
    let Some(json) = json else {
        return Ok(BTreeMap::new());
    };
    serde_json::from_str(json).map_err(|e| {
        CliError::InvalidArguments {
            reason: format!(
                "--repo-versions must be a JSON object of repository to version: {}",
                e
            ),
        }
        .into()
    })
}

/// Ask the user a yes/no question on stdin
pub(super) fn prompt_confirmation(prompt: &str) -> std::io::Result<bool> {
    use std::io::Write;

    print!("{} [y/N]: ", prompt);
    std::io::stdout().flush()?;

    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;

    let response = input.trim().to_lowercase();
    Ok(matches!(response.as_str(), "y" | "yes"))
}

/// Print an error with its recovery suggestions
pub(super) fn report_error(config: &RuntimeConfig, command: &str, error: &MprError) {
    config.error_println(&format!("Command '{}' failed: {}", command, error));

    let suggestions = error.recovery_suggestions();
    if !suggestions.is_empty() {
        config.println("\n💡 Recovery suggestions:");
        for suggestion in suggestions {
            config.println(&format!("  • {}", suggestion));
        }
    }
}
