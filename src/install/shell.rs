// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Install command execution.
//!
//! Install scripts and README commands run inside the working copy with the
//! user's terminal attached, so their output and any prompts they show reach
//! the user directly. Each run is bounded by the install timeout.

use async_trait::async_trait;
use std::{path::Path, time::Duration};
use tokio::process::Command;
use tracing::{debug, instrument};

/// Layer of indirection for running install commands.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run script through bash inside working directory.
    async fn run_script(&self, dir: &Path, script: &Path, args: &[&str]) -> Result<()>;

    /// Run single shell command line inside working directory.
    async fn run_line(&self, dir: &Path, line: &str) -> Result<()>;
}

/// Run commands on actual host.
#[derive(Debug, Clone)]
pub struct SystemShell {
    timeout: Duration,
}

impl SystemShell {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    async fn syscall_interactive(&self, mut command: Command, display: String) -> Result<()> {
        command.kill_on_drop(true);
        let mut child = command.spawn().map_err(|source| ShellError::Spawn {
            source,
            command: display.clone(),
        })?;

        let waited = tokio::time::timeout(self.timeout, child.wait()).await;
        let status = match waited {
            Ok(status) => status.map_err(|source| ShellError::Spawn {
                source,
                command: display.clone(),
            })?,
            Err(_) => {
                let _ = child.kill().await;
                return Err(ShellError::Timeout {
                    command: display,
                    timeout: self.timeout,
                });
            }
        };

        if !status.success() {
            return Err(ShellError::Failed {
                command: display,
                code: status.code(),
            });
        }

        Ok(())
    }
}

#[async_trait]
impl CommandRunner for SystemShell {
    #[instrument(skip(self), level = "debug")]
    async fn run_script(&self, dir: &Path, script: &Path, args: &[&str]) -> Result<()> {
        let mut command = Command::new("bash");
        command.arg(script).args(args).current_dir(dir);
        let shown = format!("bash {} {}", script.display(), args.join(" "));
        debug!("run {shown}");

        self.syscall_interactive(command, shown).await
    }

    #[instrument(skip(self), level = "debug")]
    async fn run_line(&self, dir: &Path, line: &str) -> Result<()> {
        let mut command = Command::new("sh");
        command.arg("-c").arg(line).current_dir(dir);

        self.syscall_interactive(command, line.to_string()).await
    }
}

/// Install command error types.
#[derive(Debug, thiserror::Error)]
pub enum ShellError {
    /// Command could not be started.
    #[error("failed to run {command:?}")]
    Spawn {
        #[source]
        source: std::io::Error,
        command: String,
    },

    /// Command did not finish in time.
    #[error("{command:?} did not finish within {timeout:?}")]
    Timeout { command: String, timeout: Duration },

    /// Command exited with failure.
    #[error("{command:?} failed with exit code {code:?}")]
    Failed { command: String, code: Option<i32> },
}

/// Friendly result alias :3
type Result<T, E = ShellError> = std::result::Result<T, E>;
