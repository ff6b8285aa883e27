// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Text completion capability.
//!
//! Some install tiers ask a language model to read a README or a file tree
//! and suggest what to do. Hyprrelease never talks to a model directly, it
//! shells out to whatever runner the user has installed:
//!
//! 1. A __local model__ run through `llama-cli` against a `*.gguf` artifact
//!    found by scanning the configured model directories.
//! 2. A __command-line client__ like `ollama` that manages its own models.
//!
//! Availability is probed at call time, not at startup, so installing a
//! runner halfway through a session just works.

pub mod model;

use crate::config::{ClientSettings, LocalModelSettings};

use async_trait::async_trait;
use std::{
    ffi::OsStr,
    path::{Path, PathBuf},
    process::Stdio,
    time::Duration,
};
use tokio::process::Command;
use tracing::{debug, instrument, warn};

/// Something that can complete a text prompt.
#[async_trait]
pub trait TextCompletion: Send + Sync {
    /// Short backend name for logging.
    fn name(&self) -> &str;

    /// Backend can currently be used.
    fn is_available(&self) -> bool;

    /// Complete prompt, returning trimmed answer.
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Local model inference through runner program.
#[derive(Debug, Clone)]
pub struct LocalModel {
    settings: LocalModelSettings,
    timeout: Duration,
}

impl LocalModel {
    pub fn new(settings: LocalModelSettings, timeout: Duration) -> Self {
        Self { settings, timeout }
    }

    /// Find model artifact to run.
    ///
    /// Scans model directories in order. Preferred model wins if present
    /// anywhere, otherwise the first artifact by name in the first directory
    /// that has any.
    pub fn find_model(&self) -> Option<PathBuf> {
        let found = self
            .settings
            .model_dirs
            .iter()
            .flat_map(|dir| scan_models(dir))
            .collect::<Vec<_>>();

        if let Some(preferred) = &self.settings.preferred_model {
            let hit = found
                .iter()
                .find(|path| path.file_name().is_some_and(|name| name == OsStr::new(preferred)));
            if let Some(hit) = hit {
                return Some(hit.clone());
            }
        }

        found.into_iter().next()
    }
}

#[async_trait]
impl TextCompletion for LocalModel {
    fn name(&self) -> &str {
        "local model"
    }

    fn is_available(&self) -> bool {
        which::which(&self.settings.runner).is_ok() && self.find_model().is_some()
    }

    #[instrument(skip(self, prompt), level = "debug")]
    async fn complete(&self, prompt: &str) -> Result<String> {
        let model = self
            .find_model()
            .ok_or_else(|| CompletionError::Unavailable("no model artifact found".into()))?;
        let runner = which::which(&self.settings.runner).map_err(|_| {
            CompletionError::Unavailable(format!("{} not found", self.settings.runner))
        })?;
        let model = model.to_string_lossy().into_owned();
        let args = substitute(
            &self.settings.args,
            &[("{model}", model.as_str()), ("{prompt}", prompt)],
        );

        run_completion(&runner, &args, self.timeout).await
    }
}

/// Completion through external command-line client.
#[derive(Debug, Clone)]
pub struct CliClient {
    settings: ClientSettings,
    timeout: Duration,
}

impl CliClient {
    pub fn new(settings: ClientSettings, timeout: Duration) -> Self {
        Self { settings, timeout }
    }
}

#[async_trait]
impl TextCompletion for CliClient {
    fn name(&self) -> &str {
        &self.settings.program
    }

    fn is_available(&self) -> bool {
        which::which(&self.settings.program).is_ok()
    }

    #[instrument(skip(self, prompt), level = "debug")]
    async fn complete(&self, prompt: &str) -> Result<String> {
        let program = which::which(&self.settings.program).map_err(|_| {
            CompletionError::Unavailable(format!("{} not found", self.settings.program))
        })?;
        let args = substitute(&self.settings.args, &[("{prompt}", prompt)]);

        run_completion(&program, &args, self.timeout).await
    }
}

/// Ordered fallback over several completion backends.
///
/// The first available backend that produces a non-empty answer wins.
#[derive(Default)]
pub struct CompletionChain {
    backends: Vec<Box<dyn TextCompletion>>,
}

impl CompletionChain {
    pub fn new(backends: Vec<Box<dyn TextCompletion>>) -> Self {
        Self { backends }
    }
}

#[async_trait]
impl TextCompletion for CompletionChain {
    fn name(&self) -> &str {
        "completion chain"
    }

    fn is_available(&self) -> bool {
        self.backends.iter().any(|backend| backend.is_available())
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        for backend in self.backends.iter().filter(|backend| backend.is_available()) {
            match backend.complete(prompt).await {
                Ok(answer) if !answer.is_empty() => return Ok(answer),
                Ok(_) => warn!("{} gave an empty answer", backend.name()),
                Err(error) => warn!("{} failed: {error}", backend.name()),
            }
        }

        Err(CompletionError::Unavailable(
            "no text completion backend produced an answer".into(),
        ))
    }
}

fn scan_models(dir: &Path) -> Vec<PathBuf> {
    let pattern = glob::Pattern::escape(&dir.to_string_lossy()) + "/*.gguf";
    debug!("scan for models at {}", Path::new(&pattern).display());

    let Ok(paths) = glob::glob(&pattern) else {
        return Vec::new();
    };

    let mut models = paths
        .filter_map(|entry| entry.ok())
        .filter(|path| path.is_file())
        .collect::<Vec<_>>();
    models.sort();
    models
}

fn substitute(template: &[String], vars: &[(&str, &str)]) -> Vec<String> {
    template
        .iter()
        .map(|arg| {
            vars.iter()
                .fold(arg.clone(), |arg, (key, value)| arg.replace(key, value))
        })
        .collect()
}

async fn run_completion(program: &Path, args: &[String], timeout: Duration) -> Result<String> {
    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .kill_on_drop(true);

    let output = tokio::time::timeout(timeout, command.output())
        .await
        .map_err(|_| CompletionError::Timeout(timeout))?
        .map_err(|source| CompletionError::Spawn {
            source,
            program: program.to_path_buf(),
        })?;

    if !output.status.success() {
        return Err(CompletionError::Failed {
            program: program.to_path_buf(),
            stderr: String::from_utf8_lossy(output.stderr.as_slice()).trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(output.stdout.as_slice()).trim().to_string())
}

/// Text completion error types.
#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    /// No backend can be used.
    #[error("text completion unavailable: {0}")]
    Unavailable(String),

    /// Backend program could not be started.
    #[error("failed to run {:?}", program.display())]
    Spawn {
        #[source]
        source: std::io::Error,
        program: PathBuf,
    },

    /// Backend program exited with failure.
    #[error("{:?} failed: {stderr}", program.display())]
    Failed { program: PathBuf, stderr: String },

    /// Backend took too long.
    #[error("text completion timed out after {0:?}")]
    Timeout(Duration),
}

/// Friendly result alias :3
type Result<T, E = CompletionError> = std::result::Result<T, E>;
