// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Read-only probes of the host system.
//!
//! Probing covers locating executables on `PATH`, asking them for their
//! version, and asking whichever package manager happens to be installed
//! what version it would hand out. Nothing here mutates the host.

use crate::version::UNKNOWN;

use async_trait::async_trait;
use std::{
    path::{Path, PathBuf},
    process::Stdio,
    time::Duration,
};
use tokio::process::Command;
use tracing::{debug, instrument};

/// Package manager that can be asked about candidate versions.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PackageManager {
    /// Distribution family label.
    pub source: &'static str,

    /// Query program.
    pub program: &'static str,

    /// Arguments placed before the package name.
    pub args: &'static [&'static str],

    /// Line prefix that carries the version after a colon.
    pub marker: &'static str,
}

/// Package managers probed in order, first usable answer wins.
pub const PACKAGE_MANAGERS: &[PackageManager] = &[
    PackageManager {
        source: "arch",
        program: "pacman",
        args: &["-Si"],
        marker: "Version",
    },
    PackageManager {
        source: "debian",
        program: "apt-cache",
        args: &["policy"],
        marker: "Candidate",
    },
    PackageManager {
        source: "fedora",
        program: "dnf",
        args: &["info"],
        marker: "Version",
    },
    PackageManager {
        source: "void",
        program: "xbps-query",
        args: &["-R"],
        marker: "pkgver",
    },
    PackageManager {
        source: "gentoo",
        program: "eix",
        args: &["-e"],
        marker: "Available versions",
    },
];

/// Captured output of finished subprocess.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

/// Layer of indirection for read-only host queries.
#[async_trait]
pub trait SystemProbe: Send + Sync {
    /// Locate executable on `PATH`.
    fn locate(&self, program: &str) -> Option<PathBuf>;

    /// Run program to completion and capture its output.
    async fn run(&self, program: &Path, args: &[String]) -> Result<CommandOutput>;
}

/// Probe the actual host through subprocesses.
#[derive(Debug, Clone)]
pub struct HostProbe {
    timeout: Duration,
}

impl HostProbe {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl SystemProbe for HostProbe {
    fn locate(&self, program: &str) -> Option<PathBuf> {
        which::which(program).ok()
    }

    #[instrument(skip(self), level = "debug")]
    async fn run(&self, program: &Path, args: &[String]) -> Result<CommandOutput> {
        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| ProbeError::Timeout {
                program: program.to_path_buf(),
                timeout: self.timeout,
            })?
            .map_err(|source| ProbeError::Spawn {
                source,
                program: program.to_path_buf(),
            })?;

        Ok(CommandOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(output.stdout.as_slice()).into_owned(),
            stderr: String::from_utf8_lossy(output.stderr.as_slice()).into_owned(),
        })
    }
}

/// Ask executable for its version through `--version`.
///
/// Takes first non-empty line of stdout, then stderr. Yields `"unknown"` if
/// the executable cannot be run or prints nothing.
pub async fn local_version(probe: &dyn SystemProbe, executable: &Path) -> String {
    match probe.run(executable, &["--version".to_string()]).await {
        Ok(output) => first_line(&output.stdout)
            .or_else(|| first_line(&output.stderr))
            .unwrap_or_else(|| UNKNOWN.to_string()),
        Err(error) => {
            debug!("{error}");
            UNKNOWN.to_string()
        }
    }
}

/// Ask installed package managers for candidate version of package.
///
/// Returns version with package manager source label, or `("unknown",
/// "none")` if no package manager gave a usable answer.
pub async fn package_version(probe: &dyn SystemProbe, package: &str) -> (String, String) {
    for manager in PACKAGE_MANAGERS {
        let Some(program) = probe.locate(manager.program) else {
            continue;
        };

        let args = manager
            .args
            .iter()
            .map(ToString::to_string)
            .chain([package.to_string()])
            .collect::<Vec<_>>();
        match probe.run(&program, &args).await {
            Ok(output) => {
                if let Some(version) = marker_value(&output.stdout, manager.marker) {
                    return (version, manager.source.to_string());
                }
            }
            Err(error) => debug!("{error}"),
        }
    }

    (UNKNOWN.to_string(), "none".to_string())
}

fn first_line(text: &str) -> Option<String> {
    text.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(ToString::to_string)
}

/// Extract value following colon of first line starting with marker.
pub(crate) fn marker_value(text: &str, marker: &str) -> Option<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| line.starts_with(marker))
        .filter_map(|line| line.split_once(':').map(|(_, value)| value.trim()))
        .find(|value| !value.is_empty() && *value != "(none)")
        .map(ToString::to_string)
}

/// Host probe error types.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    /// Program could not be started.
    #[error("failed to run {:?}", program.display())]
    Spawn {
        #[source]
        source: std::io::Error,
        program: PathBuf,
    },

    /// Program did not finish in time.
    #[error("{:?} did not finish within {timeout:?}", program.display())]
    Timeout { program: PathBuf, timeout: Duration },
}

/// Friendly result alias :3
type Result<T, E = ProbeError> = std::result::Result<T, E>;
