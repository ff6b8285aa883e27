// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Working copy cloning.
//!
//! Dotfiles get cloned into the work directory before any install tier sees
//! them. Cloning always starts from scratch: a stale working copy left over
//! from an earlier install is removed first, so every install works from
//! exactly what the remote currently has.

use auth_git2::{GitAuthenticator, Prompter};
use git2::{build::RepoBuilder, Config, FetchOptions, RemoteCallbacks};
use indicatif::{ProgressBar, ProgressStyle};
use inquire::{Password, Text};
use std::{
    fs::remove_dir_all,
    path::{Path, PathBuf},
    time,
};
use tracing::{info, instrument, warn};

/// What to clone, and where to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloneRequest {
    pub url: String,
    pub branch: String,
    pub path: PathBuf,

    /// Only fetch the latest N commits.
    pub depth: Option<i32>,
}

/// Clone working copy of remote repository.
///
/// Any existing directory at the target path is removed first. Progress of
/// the clone is displayed through given progress bar. If credentials are
/// required, the user will be prompted for them, blocking the progress bar
/// while they type.
///
/// # Errors
///
/// - Return [`CloneError::Remove`] if stale working copy cannot be removed.
/// - Return [`CloneError::Git2`] if libgit2 operations fail.
#[instrument(skip(bar), level = "debug")]
pub fn clone_working_copy(request: &CloneRequest, bar: ProgressBar) -> Result<PathBuf> {
    if request.path.exists() {
        info!("removing stale working copy at {}", request.path.display());
        remove_dir_all(&request.path).map_err(|source| CloneError::Remove {
            source,
            path: request.path.clone(),
        })?;
    }

    let style = ProgressStyle::with_template(
        "{elapsed_precise:.green}  {msg:<50}  [{wide_bar:.yellow/blue}]",
    )?
    .progress_chars("-Cco.");
    bar.set_style(style);
    bar.set_message(request.url.clone());
    bar.enable_steady_tick(time::Duration::from_millis(100));

    let prompter = IndicatifPrompter::new(bar);
    let authenticator = GitAuthenticator::default().set_prompter(prompter.clone());
    let config = Config::open_default()?;

    let mut throttle = time::Instant::now();
    let mut rc = RemoteCallbacks::new();
    rc.credentials(authenticator.credentials(&config));
    rc.transfer_progress(|progress| {
        let stats = progress.to_owned();
        let bar_size = stats.total_objects() as u64;
        let bar_pos = stats.received_objects() as u64;
        if throttle.elapsed() > time::Duration::from_millis(10) {
            throttle = time::Instant::now();
            prompter.bar.set_length(bar_size);
            prompter.bar.set_position(bar_pos);
        }
        true
    });

    let mut fo = FetchOptions::new();
    fo.remote_callbacks(rc);
    if let Some(depth) = request.depth {
        fo.depth(depth);
    }

    let result = RepoBuilder::new()
        .branch(&request.branch)
        .fetch_options(fo)
        .clone(&request.url, &request.path);
    prompter.bar.finish_and_clear();
    result?;

    info!("cloned {} ({}) into {}", request.url, request.branch, request.path.display());
    Ok(request.path.clone())
}

/// Clone on blocking thread so the async runtime keeps going.
///
/// # Errors
///
/// - Return [`CloneError::Join`] if blocking thread dies.
/// - Any error of [`clone_working_copy`].
pub async fn clone_in_background(request: CloneRequest, bar: ProgressBar) -> Result<PathBuf> {
    tokio::task::spawn_blocking(move || clone_working_copy(&request, bar)).await?
}

/// Git2 authentication prompter for progress bar.
#[derive(Debug, Clone)]
pub struct IndicatifPrompter {
    pub(crate) bar: ProgressBar,
}

impl IndicatifPrompter {
    /// Construct new progress bar authenticator.
    pub fn new(bar: ProgressBar) -> Self {
        Self { bar }
    }
}

impl Prompter for IndicatifPrompter {
    #[instrument(skip(self, url, _config), level = "debug")]
    fn prompt_username_password(
        &mut self,
        url: &str,
        _config: &git2::Config,
    ) -> Option<(String, String)> {
        info!("authentication required at {url}");
        self.bar.suspend(|| -> Option<(String, String)> {
            let username = Text::new("username").prompt().ok()?;
            let password = ask_password()?;
            Some((username, password))
        })
    }

    #[instrument(skip(self, username, url, _config), level = "debug")]
    fn prompt_password(
        &mut self,
        username: &str,
        url: &str,
        _config: &git2::Config,
    ) -> Option<String> {
        info!("authentication required at {url} for user {username}");
        self.bar.suspend(ask_password)
    }

    #[instrument(skip(self, ssh_key_path, _config), level = "debug")]
    fn prompt_ssh_key_passphrase(
        &mut self,
        ssh_key_path: &Path,
        _config: &git2::Config,
    ) -> Option<String> {
        info!(
            "authentication required with ssh key at {}",
            ssh_key_path.display()
        );
        self.bar.suspend(ask_password)
    }
}

fn ask_password() -> Option<String> {
    Password::new("password")
        .without_confirmation()
        .prompt()
        .map_err(|error| warn!("password prompt failed: {error}"))
        .ok()
}

/// Clone error types.
#[derive(Debug, thiserror::Error)]
pub enum CloneError {
    /// Stale working copy could not be removed.
    #[error("failed to remove stale working copy at {:?}", path.display())]
    Remove {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Blocking clone thread died.
    #[error(transparent)]
    Join(#[from] tokio::task::JoinError),

    /// Style template cannot be set for progress bars.
    #[error(transparent)]
    IndicatifStyleTemplate(#[from] indicatif::style::TemplateError),

    /// Operations from libgit2 fail.
    #[error(transparent)]
    Git2(#[from] git2::Error),
}

/// Friendly result alias :3
type Result<T, E = CloneError> = std::result::Result<T, E>;
