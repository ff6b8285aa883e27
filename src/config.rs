// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout of the hyprrelease configuration file to simplify
//! the process of deserialization. Every field is optional, missing fields
//! fall back to sane defaults. Every path-like field undergoes shell
//! expansion, so `~/.config/hypr` and `$XDG_CONFIG_HOME/hypr` both work.
//!
//! # General Layout
//!
//! ```toml
//! target_dir = "~/.config/hypr"
//! work_dir = "~/.cache/hyprrelease/dotfiles"
//! release_metadata = ["~/.config/hypr-release/hyprland-release", "/etc/hyprland-release"]
//! copy_extensions = ["conf", "sh", "png"]
//!
//! [ai.local]
//! model_dirs = ["/usr/share/hypr-release/ai/LLM"]
//! runner = "llama-cli"
//!
//! [ai.client]
//! program = "ollama"
//! args = ["run", "mistral", "{prompt}"]
//!
//! [[dotfile]]
//! name = "my-dots"
//! author = "me"
//! repository = "https://github.com/me/dots"
//! branch = "main"
//! ```

use crate::{path, registry::RegistryEntry};

use serde::{Deserialize, Serialize};
use std::{
    fs::read_to_string,
    io::ErrorKind,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

/// Default GitHub REST API endpoint.
pub const DEFAULT_GITHUB_API: &str = "https://api.github.com";

/// Hyprrelease settings.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Directory dotfiles get installed into.
    pub target_dir: PathBuf,

    /// Directory that holds working copies of cloned dotfiles.
    pub work_dir: PathBuf,

    /// Preference order of release identity metadata files.
    pub release_metadata: Vec<PathBuf>,

    /// Preference order of system component metadata files.
    pub system_metadata: Vec<PathBuf>,

    /// Base URL of GitHub REST API.
    pub github_api: String,

    /// Maximum number of hosted releases to query.
    pub hosted_release_limit: usize,

    /// Seconds before a network request is abandoned.
    pub network_timeout_secs: u64,

    /// Seconds before a read-only subprocess is abandoned.
    pub command_timeout_secs: u64,

    /// Seconds before an install script or install command is abandoned.
    pub install_timeout_secs: u64,

    /// Clone only the latest N commits of a dotfile repository.
    pub clone_depth: Option<i32>,

    /// File extensions copied by the default copy tier.
    pub copy_extensions: Vec<String>,

    /// Maximum characters of text sent to text completion backends.
    pub max_prompt_chars: usize,

    /// Text completion settings.
    pub ai: AiSettings,

    /// Extra registry entries.
    #[serde(rename = "dotfile")]
    pub dotfiles: Vec<RegistryEntry>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            target_dir: path::default_target_dir()
                .unwrap_or_else(|_| PathBuf::from(".config/hypr")),
            work_dir: path::default_work_dir()
                .unwrap_or_else(|_| std::env::temp_dir().join("hyprrelease-dotfiles")),
            release_metadata: path::default_release_metadata_paths(),
            system_metadata: path::default_system_metadata_paths(),
            github_api: DEFAULT_GITHUB_API.into(),
            hosted_release_limit: 3,
            network_timeout_secs: 30,
            command_timeout_secs: 15,
            install_timeout_secs: 900,
            clone_depth: None,
            copy_extensions: ["conf", "ini", "json", "jsonc", "toml", "css", "lua", "sh", "png"]
                .into_iter()
                .map(String::from)
                .collect(),
            max_prompt_chars: 12_000,
            ai: AiSettings::default(),
            dotfiles: Vec::new(),
        }
    }
}

impl Settings {
    /// Load settings from configuration file.
    ///
    /// A missing configuration file is not an error, default settings are
    /// used instead.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::Read`] if file exists but cannot be read.
    /// - Return [`ConfigError::Deserialize`] if file cannot be parsed.
    /// - Return [`ConfigError::ShellExpansion`] if a path cannot be expanded.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        match read_to_string(path.as_ref()) {
            Ok(data) => data.parse(),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Read {
                source: err,
                path: path.as_ref().to_path_buf(),
            }),
        }
    }

    pub fn network_timeout(&self) -> Duration {
        Duration::from_secs(self.network_timeout_secs)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    pub fn install_timeout(&self) -> Duration {
        Duration::from_secs(self.install_timeout_secs)
    }

    fn expand_paths(&mut self) -> Result<()> {
        self.target_dir = expand(&self.target_dir)?;
        self.work_dir = expand(&self.work_dir)?;
        self.release_metadata = self
            .release_metadata
            .iter()
            .map(expand)
            .collect::<Result<_>>()?;
        self.system_metadata = self
            .system_metadata
            .iter()
            .map(expand)
            .collect::<Result<_>>()?;
        self.ai.local.model_dirs = self
            .ai
            .local
            .model_dirs
            .iter()
            .map(expand)
            .collect::<Result<_>>()?;

        Ok(())
    }
}

impl FromStr for Settings {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut settings: Settings = toml::de::from_str(data)?;

        // INVARIANT: Perform shell expansion on every path field.
        settings.expand_paths()?;

        // INVARIANT: Extensions are compared without leading dot.
        for ext in settings.copy_extensions.iter_mut() {
            *ext = ext.trim_start_matches('.').to_lowercase();
        }

        Ok(settings)
    }
}

/// Text completion settings.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AiSettings {
    /// Local model runner.
    pub local: LocalModelSettings,

    /// External command-line client.
    pub client: ClientSettings,

    /// Models that can be downloaded into the first model directory.
    pub models: Vec<ModelSource>,
}

/// Local model runner settings.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LocalModelSettings {
    /// Directories scanned for `*.gguf` model artifacts, in order.
    pub model_dirs: Vec<PathBuf>,

    /// Model file name to prefer when several are found.
    pub preferred_model: Option<String>,

    /// Program that runs model inference.
    pub runner: String,

    /// Runner arguments, `{model}` and `{prompt}` get substituted.
    pub args: Vec<String>,
}

impl Default for LocalModelSettings {
    fn default() -> Self {
        Self {
            model_dirs: path::default_model_dirs(),
            preferred_model: Some("mistral-7b.Q4_K_M.gguf".into()),
            runner: "llama-cli".into(),
            args: ["-m", "{model}", "-p", "{prompt}", "-n", "512", "-no-cnv", "--no-display-prompt"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

/// External command-line client settings.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientSettings {
    /// Client program to invoke.
    pub program: String,

    /// Client arguments, `{prompt}` gets substituted.
    pub args: Vec<String>,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            program: "ollama".into(),
            args: ["run", "mistral", "{prompt}"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

/// Downloadable model artifact.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct ModelSource {
    /// File name of the model artifact.
    pub name: String,

    /// URL to download artifact from.
    pub url: String,

    /// URL of published SHA-256 checksum.
    pub sha256_url: String,
}

fn expand(path: impl AsRef<Path>) -> Result<PathBuf> {
    let expanded = shellexpand::full(path.as_ref().to_string_lossy().as_ref())?.into_owned();
    Ok(PathBuf::from(expanded))
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Configuration file exists but cannot be read.
    #[error("failed to read configuration file at {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to perform shell expansion on configuration.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;

    #[sealed_test(env = [("BLAH", "/home/blah")])]
    fn deserialize_settings_expands_paths() -> anyhow::Result<()> {
        let result: Settings = r#"
            target_dir = "$BLAH/.config/hypr"
            work_dir = "/tmp/dotfiles"
            release_metadata = ["$BLAH/release", "/etc/hyprland-release"]
            system_metadata = ["$BLAH/system"]
            copy_extensions = [".conf", "SH"]

            [ai.local]
            model_dirs = ["$BLAH/models"]

            [[dotfile]]
            name = "foo"
            author = "bar"
            repository = "https://blah.org/bar/foo.git"
            branch = "main"
        "#
        .parse()?;

        assert_eq!(result.target_dir, PathBuf::from("/home/blah/.config/hypr"));
        assert_eq!(result.work_dir, PathBuf::from("/tmp/dotfiles"));
        assert_eq!(
            result.release_metadata,
            vec![
                PathBuf::from("/home/blah/release"),
                PathBuf::from("/etc/hyprland-release")
            ]
        );
        assert_eq!(result.system_metadata, vec![PathBuf::from("/home/blah/system")]);
        assert_eq!(result.copy_extensions, vec!["conf".to_string(), "sh".to_string()]);
        assert_eq!(result.ai.local.model_dirs, vec![PathBuf::from("/home/blah/models")]);
        assert_eq!(result.ai.local.runner, "llama-cli");
        assert_eq!(
            result.dotfiles,
            vec![RegistryEntry {
                name: "foo".into(),
                author: "bar".into(),
                repository: "https://blah.org/bar/foo.git".into(),
                branch: "main".into(),
                has_releases: false,
                description: String::new(),
            }]
        );

        Ok(())
    }

    #[test]
    fn empty_settings_use_defaults() -> anyhow::Result<()> {
        let result: Settings = "".parse()?;
        let expect = Settings::default();

        assert_eq!(result.github_api, expect.github_api);
        assert_eq!(result.hosted_release_limit, 3);
        assert_eq!(result.copy_extensions, expect.copy_extensions);
        assert_eq!(result.ai.client.program, "ollama");

        Ok(())
    }

    #[test]
    fn missing_settings_file_uses_defaults() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let result = Settings::load(dir.path().join("nope.toml"))?;
        assert_eq!(result.hosted_release_limit, 3);
        Ok(())
    }
}
