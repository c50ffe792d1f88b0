//! External command execution with timeouts.
//!
//! Every external tool (git, poetry, pytest) runs through [`run`], which locates
//! the executable on PATH, captures both output streams, and kills the child if
//! it outlives its budget.

use crate::error::{Result, ToolError};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::Command;

/// Grace period for reaping a killed child
const REAP_TIMEOUT: Duration = Duration::from_secs(10);

/// Captured result of a finished command
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Exit code, `None` when terminated by a signal
    pub code: Option<i32>,
    /// Captured stdout
    pub stdout: String,
    /// Captured stderr
    pub stderr: String,
}

impl CommandOutput {
    /// Whether the command exited with status 0
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Stdout and stderr joined, for failure reports
    pub fn combined(&self) -> String {
        match (self.stdout.trim().is_empty(), self.stderr.trim().is_empty()) {
            (_, true) => self.stdout.clone(),
            (true, false) => self.stderr.clone(),
            (false, false) => format!("{}\n{}", self.stdout, self.stderr),
        }
    }
}

/// Check whether an executable is available on PATH
pub fn is_available(program: &str) -> bool {
    which::which(program).is_ok()
}

fn display_command(program: &str, args: &[&str]) -> String {
    std::iter::once(program)
        .chain(args.iter().copied())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Run `program args...` in `cwd`, returning its output whatever the exit code.
///
/// Fails with [`ToolError::NotFound`] when the executable is not on PATH and
/// with [`ToolError::Timeout`] when it runs longer than `timeout`.
pub async fn run(
    program: &str,
    args: &[&str],
    cwd: &Path,
    timeout: Duration,
) -> Result<CommandOutput> {
    let command = display_command(program, args);
    let executable = which::which(program).map_err(|_| ToolError::NotFound {
        program: program.to_string(),
    })?;

    log::debug!("Running '{}' in {}", command, cwd.display());

    let mut child = Command::new(executable)
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| ToolError::Failed {
            command: command.clone(),
            code: None,
            stderr: e.to_string(),
        })?;

    // Drain both pipes concurrently so a chatty child never blocks on a full buffer
    let stdout_task = child.stdout.take().map(|mut out| {
        tokio::spawn(async move {
            let mut buf = Vec::new();
            let _ = out.read_to_end(&mut buf).await;
            buf
        })
    });
    let stderr_task = child.stderr.take().map(|mut err| {
        tokio::spawn(async move {
            let mut buf = Vec::new();
            let _ = err.read_to_end(&mut buf).await;
            buf
        })
    });

    let status = match tokio::time::timeout(timeout, child.wait()).await {
        Ok(Ok(status)) => status,
        Ok(Err(e)) => {
            return Err(ToolError::Failed {
                command,
                code: None,
                stderr: e.to_string(),
            }
            .into());
        }
        Err(_elapsed) => {
            log::warn!("'{}' timed out, terminating process", command);
            if let Err(e) = child.kill().await {
                log::warn!("Failed to kill '{}': {}", command, e);
            }
            let _ = tokio::time::timeout(REAP_TIMEOUT, child.wait()).await;
            return Err(ToolError::Timeout { command, timeout }.into());
        }
    };

    let stdout = match stdout_task {
        Some(task) => task.await.unwrap_or_default(),
        None => Vec::new(),
    };
    let stderr = match stderr_task {
        Some(task) => task.await.unwrap_or_default(),
        None => Vec::new(),
    };

    Ok(CommandOutput {
        code: status.code(),
        stdout: String::from_utf8_lossy(&stdout).into_owned(),
        stderr: String::from_utf8_lossy(&stderr).into_owned(),
    })
}

/// Like [`run`], but a nonzero exit becomes [`ToolError::Failed`]
pub async fn run_checked(
    program: &str,
    args: &[&str],
    cwd: &Path,
    timeout: Duration,
) -> Result<CommandOutput> {
    let output = run(program, args, cwd, timeout).await?;
    if output.success() {
        Ok(output)
    } else {
        Err(ToolError::Failed {
            command: display_command(program, args),
            code: output.code,
            stderr: output.stderr.trim().to_string(),
        }
        .into())
    }
}
