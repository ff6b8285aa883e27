// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Tiered installation.
//!
//! Community dotfiles install themselves in wildly different ways. Some ship
//! an install script, some describe the steps in their README, and some just
//! expect you to copy files around. Hyprrelease tries a fixed list of
//! __install tiers__ in order of decreasing trust, and stops at the first
//! tier that succeeds:
//!
//! 1. __script__: run the install script shipped with the dotfiles.
//! 2. __readme__: extract install commands from the README, either through
//!    text completion or a plain heuristic, and run them after confirmation.
//! 3. __select__: ask text completion which files are worth copying, and copy
//!    them after confirmation.
//! 4. __copy__: copy every file with an allow-listed extension.
//!
//! Only the failure of the last tier is ever reported to the caller. Earlier
//! failures are logged and recorded in the [`InstallSummary`].
//!
//! # Safety
//!
//! Commands pulled out of a README, especially ones suggested by a language
//! model, are untrusted. Every such command passes through
//! [`crate::safety::is_dangerous`] first, and flagged commands are skipped.
//! This is a best-effort textual filter, not a sandbox.

pub mod copy;
pub mod prompt;
pub mod readme;
pub mod script;
pub mod select;
pub mod shell;

use crate::{ai::TextCompletion, config::Settings};
use copy::CopyTier;
use prompt::Prompt;
use readme::ReadmeTier;
use script::ScriptTier;
use select::SelectTier;
use shell::CommandRunner;

use async_trait::async_trait;
use ignore::WalkBuilder;
use serde::Serialize;
use std::{
    fs::{copy as copy_file, create_dir_all},
    path::{Component, Path, PathBuf},
    sync::Arc,
};
use tracing::{info, instrument, warn};

/// Everything an install tier gets to work with.
pub struct InstallContext<'a> {
    /// Cloned dotfile repository.
    pub working_copy: &'a Path,

    /// Directory to install into.
    pub target_dir: &'a Path,

    pub prompt: &'a dyn Prompt,
    pub shell: &'a dyn CommandRunner,
    pub completion: &'a dyn TextCompletion,
}

/// Command that was refused by the safety filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedCommand {
    pub command: String,
    pub reason: String,
}

/// What a successful tier did.
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TierOutcome {
    /// Short human readable account.
    pub detail: String,

    /// Files installed, relative to target directory.
    pub copied: Vec<PathBuf>,

    /// Commands that ran successfully.
    pub commands_run: Vec<String>,

    /// Commands refused by safety filter.
    pub skipped: Vec<SkippedCommand>,
}

/// Result of a successful installation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallSummary {
    /// Name of tier that succeeded.
    pub tier: String,
    pub outcome: TierOutcome,

    /// Tiers that were tried before, with their reasons for failing.
    pub failed_tiers: Vec<(String, String)>,
}

/// One strategy of installing dotfiles.
#[async_trait]
pub trait InstallTier: Send + Sync {
    fn name(&self) -> &str;

    /// Try to install working copy into target directory.
    async fn attempt(&self, ctx: &InstallContext<'_>) -> Result<TierOutcome, TierError>;
}

/// Install dotfiles through ordered list of tiers.
pub struct Installer {
    tiers: Vec<Box<dyn InstallTier>>,
    prompt: Arc<dyn Prompt>,
    shell: Arc<dyn CommandRunner>,
    completion: Arc<dyn TextCompletion>,
}

impl Installer {
    /// Construct new installer without any tiers.
    pub fn new(
        prompt: Arc<dyn Prompt>,
        shell: Arc<dyn CommandRunner>,
        completion: Arc<dyn TextCompletion>,
    ) -> Self {
        Self {
            tiers: Vec::new(),
            prompt,
            shell,
            completion,
        }
    }

    /// Construct new installer with the standard tier list.
    pub fn standard(
        settings: &Settings,
        prompt: Arc<dyn Prompt>,
        shell: Arc<dyn CommandRunner>,
        completion: Arc<dyn TextCompletion>,
    ) -> Self {
        Self::new(prompt, shell, completion)
            .with_tier(ScriptTier::default())
            .with_tier(ReadmeTier::new(settings.max_prompt_chars))
            .with_tier(SelectTier::new(settings.max_prompt_chars))
            .with_tier(CopyTier::new(settings.copy_extensions.clone()))
    }

    /// Append tier to end of tier list.
    pub fn with_tier(mut self, tier: impl InstallTier + 'static) -> Self {
        self.tiers.push(Box::new(tier));
        self
    }

    pub fn tier_names(&self) -> Vec<&str> {
        self.tiers.iter().map(|tier| tier.name()).collect()
    }

    /// Install working copy into target directory.
    ///
    /// Tries each tier in order until one succeeds.
    ///
    /// # Errors
    ///
    /// - Return [`InstallError::Exhausted`] with the last tier's failure if
    ///   every tier failed.
    /// - Return [`InstallError::NoTiers`] if there is nothing to try.
    #[instrument(skip(self), level = "debug")]
    pub async fn install(&self, working_copy: &Path, target_dir: &Path) -> Result<InstallSummary> {
        let ctx = InstallContext {
            working_copy,
            target_dir,
            prompt: self.prompt.as_ref(),
            shell: self.shell.as_ref(),
            completion: self.completion.as_ref(),
        };

        let mut failed_tiers = Vec::new();
        let mut last_error = None;
        for tier in &self.tiers {
            info!("trying {} tier", tier.name());
            match tier.attempt(&ctx).await {
                Ok(outcome) => {
                    info!("{} tier succeeded: {}", tier.name(), outcome.detail);
                    return Ok(InstallSummary {
                        tier: tier.name().to_string(),
                        outcome,
                        failed_tiers,
                    });
                }
                Err(error) => {
                    warn!("{} tier failed: {error}", tier.name());
                    failed_tiers.push((tier.name().to_string(), error.to_string()));
                    last_error = Some((tier.name().to_string(), error));
                }
            }
        }

        match last_error {
            Some((tier, source)) => Err(InstallError::Exhausted { tier, source }),
            None => Err(InstallError::NoTiers),
        }
    }
}

/// List regular files below root as relative paths, excluding `.git`.
///
/// Nothing is ignored by `.gitignore` rules, dotfiles are hidden files by
/// nature after all. Paths are sorted by file name per directory.
pub(crate) fn relative_files(root: &Path) -> Result<Vec<PathBuf>, TierError> {
    let walker = WalkBuilder::new(root)
        .hidden(false)
        .ignore(false)
        .git_ignore(false)
        .git_exclude(false)
        .git_global(false)
        .parents(false)
        .filter_entry(|entry| entry.file_name() != ".git")
        .sort_by_file_name(|a, b| a.cmp(b))
        .build();

    let mut files = Vec::new();
    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_some_and(|kind| kind.is_file()) {
            continue;
        }

        if let Ok(relative) = entry.path().strip_prefix(root) {
            files.push(relative.to_path_buf());
        }
    }

    Ok(files)
}

/// Copy file from source tree into target tree, preserving relative path.
pub(crate) fn copy_relative(
    source_root: &Path,
    target_root: &Path,
    relative: &Path,
) -> Result<PathBuf, TierError> {
    let source = source_root.join(relative);
    let target = target_root.join(relative);
    if let Some(parent) = target.parent() {
        create_dir_all(parent).map_err(|err| TierError::Io {
            source: err,
            path: parent.to_path_buf(),
        })?;
    }

    copy_file(&source, &target).map_err(|err| TierError::Io {
        source: err,
        path: source.clone(),
    })?;

    Ok(relative.to_path_buf())
}

/// Relative path that stays inside its root.
pub(crate) fn is_contained(path: &Path) -> bool {
    !path.as_os_str().is_empty()
        && path
            .components()
            .all(|component| matches!(component, Component::Normal(_) | Component::CurDir))
}

/// Clean line-oriented answer into list of entries.
///
/// Drops blank lines, comment lines, and Markdown code fences. Strips shell
/// prompt markers and list bullets.
pub(crate) fn answer_lines(answer: &str) -> Vec<String> {
    let mut lines = Vec::new();
    for line in answer.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with("```") {
            continue;
        }

        let line = line
            .strip_prefix("$ ")
            .or_else(|| line.strip_prefix("- "))
            .or_else(|| line.strip_prefix("* "))
            .unwrap_or(line)
            .trim()
            .trim_matches('`');
        if !line.is_empty() && !lines.iter().any(|seen| seen == line) {
            lines.push(line.to_string());
        }
    }

    lines
}

/// Truncate text to at most `max` characters.
pub(crate) fn bounded(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}

/// Install tier error types.
#[derive(Debug, thiserror::Error)]
pub enum TierError {
    /// Tier has nothing to work with in this working copy.
    #[error("not applicable: {0}")]
    NotApplicable(String),

    /// User declined to go ahead.
    #[error("aborted by user")]
    UserAborted,

    /// Tier needs text completion, but none is available.
    #[error("text completion unavailable: {0}")]
    AiUnavailable(String),

    /// Tier ran, but did not achieve anything.
    #[error("{0}")]
    Failed(String),

    /// Tier did not copy a single file.
    #[error("no files were copied")]
    NothingCopied,

    /// File tree could not be walked.
    #[error(transparent)]
    Walk(#[from] ignore::Error),

    /// File system operation failed.
    #[error("file system operation failed at {:?}", path.display())]
    Io {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
}

/// Installation error types.
#[derive(Debug, thiserror::Error)]
pub enum InstallError {
    /// Every tier failed, last failure attached.
    #[error("every install tier failed, last was {tier}")]
    Exhausted {
        tier: String,
        #[source]
        source: TierError,
    },

    /// Installer has no tiers.
    #[error("no install tiers configured")]
    NoTiers,
}

/// Friendly result alias :3
type Result<T, E = InstallError> = std::result::Result<T, E>;

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::ai::CompletionError;
    use shell::ShellError;
    use simple_test_case::test_case;
    use std::{fs::write, sync::Mutex};

    /// Prompt that gives a fixed answer and remembers what it was asked.
    #[derive(Default)]
    pub(crate) struct ScriptedPrompt {
        pub(crate) answer: bool,
        pub(crate) asked: Mutex<Vec<Vec<String>>>,
    }

    impl ScriptedPrompt {
        pub(crate) fn answering(answer: bool) -> Self {
            Self {
                answer,
                asked: Mutex::new(Vec::new()),
            }
        }
    }

    impl Prompt for ScriptedPrompt {
        fn confirm(&self, _message: &str, items: &[String]) -> bool {
            if let Ok(mut asked) = self.asked.lock() {
                asked.push(items.to_vec());
            }
            self.answer
        }

        fn text(&self, _message: &str, default: &str) -> Option<String> {
            Some(default.to_string())
        }
    }

    /// Shell that records commands, failing the ones listed.
    #[derive(Default)]
    pub(crate) struct RecordingShell {
        pub(crate) fail: Vec<String>,
        pub(crate) ran: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CommandRunner for RecordingShell {
        async fn run_script(
            &self,
            _dir: &Path,
            script: &Path,
            args: &[&str],
        ) -> Result<(), ShellError> {
            let name = script
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            let command = format!("bash {name} {}", args.join(" "));
            self.record(command)
        }

        async fn run_line(&self, _dir: &Path, line: &str) -> Result<(), ShellError> {
            self.record(line.to_string())
        }
    }

    impl RecordingShell {
        pub(crate) fn failing(commands: &[&str]) -> Self {
            Self {
                fail: commands.iter().map(ToString::to_string).collect(),
                ran: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn ran(&self) -> Vec<String> {
            self.ran.lock().map(|ran| ran.clone()).unwrap_or_default()
        }

        fn record(&self, command: String) -> Result<(), ShellError> {
            if let Ok(mut ran) = self.ran.lock() {
                ran.push(command.clone());
            }

            if self.fail.contains(&command) {
                return Err(ShellError::Failed {
                    command,
                    code: Some(1),
                });
            }

            Ok(())
        }
    }

    /// Text completion with canned answer.
    pub(crate) struct CannedCompletion(pub(crate) Option<&'static str>);

    #[async_trait]
    impl TextCompletion for CannedCompletion {
        fn name(&self) -> &str {
            "canned"
        }

        fn is_available(&self) -> bool {
            self.0.is_some()
        }

        async fn complete(&self, _prompt: &str) -> Result<String, CompletionError> {
            self.0
                .map(String::from)
                .ok_or_else(|| CompletionError::Unavailable("canned".into()))
        }
    }

    pub(crate) fn context<'a>(
        working_copy: &'a Path,
        target_dir: &'a Path,
        prompt: &'a dyn Prompt,
        shell: &'a dyn CommandRunner,
        completion: &'a dyn TextCompletion,
    ) -> InstallContext<'a> {
        InstallContext {
            working_copy,
            target_dir,
            prompt,
            shell,
            completion,
        }
    }

    struct FixedTier {
        name: &'static str,
        succeed: bool,
    }

    #[async_trait]
    impl InstallTier for FixedTier {
        fn name(&self) -> &str {
            self.name
        }

        async fn attempt(&self, _ctx: &InstallContext<'_>) -> Result<TierOutcome, TierError> {
            if self.succeed {
                Ok(TierOutcome {
                    detail: format!("{} did it", self.name),
                    ..Default::default()
                })
            } else {
                Err(TierError::Failed(format!("{} gave up", self.name)))
            }
        }
    }

    fn installer() -> Installer {
        Installer::new(
            Arc::new(ScriptedPrompt::answering(false)),
            Arc::new(RecordingShell::default()),
            Arc::new(CannedCompletion(None)),
        )
    }

    #[tokio::test]
    async fn first_successful_tier_wins() -> anyhow::Result<()> {
        let installer = installer()
            .with_tier(FixedTier {
                name: "first",
                succeed: false,
            })
            .with_tier(FixedTier {
                name: "second",
                succeed: true,
            })
            .with_tier(FixedTier {
                name: "third",
                succeed: true,
            });

        let summary = installer.install(Path::new("/src"), Path::new("/dst")).await?;

        assert_eq!(summary.tier, "second");
        assert_eq!(
            summary.failed_tiers,
            vec![("first".to_string(), "first gave up".to_string())]
        );
        Ok(())
    }

    #[tokio::test]
    async fn only_last_failure_surfaces() {
        let installer = installer()
            .with_tier(FixedTier {
                name: "first",
                succeed: false,
            })
            .with_tier(FixedTier {
                name: "last",
                succeed: false,
            });

        let result = installer.install(Path::new("/src"), Path::new("/dst")).await;

        assert!(matches!(
            result,
            Err(InstallError::Exhausted { tier, source: TierError::Failed(reason) })
                if tier == "last" && reason == "last gave up"
        ));
    }

    #[tokio::test]
    async fn no_tiers_is_error() {
        let result = installer().install(Path::new("/src"), Path::new("/dst")).await;
        assert!(matches!(result, Err(InstallError::NoTiers)));
    }

    #[test]
    fn standard_tier_order() {
        let settings = Settings::default();
        let installer = Installer::standard(
            &settings,
            Arc::new(ScriptedPrompt::answering(false)),
            Arc::new(RecordingShell::default()),
            Arc::new(CannedCompletion(None)),
        );
        assert_eq!(installer.tier_names(), vec!["script", "readme", "select", "copy"]);
    }

    #[tokio::test]
    async fn bare_tree_falls_through_to_copy() -> anyhow::Result<()> {
        let src = tempfile::tempdir()?;
        let dst = tempfile::tempdir()?;
        std::fs::create_dir_all(src.path().join("hypr"))?;
        write(src.path().join("hypr/hyprland.conf"), "monitor=,preferred,auto,1")?;
        write(src.path().join("notes.txt"), "not a dotfile")?;
        let prompt = Arc::new(ScriptedPrompt::answering(true));
        let shell = Arc::new(RecordingShell::default());
        let installer = Installer::standard(
            &Settings::default(),
            prompt.clone(),
            shell.clone(),
            Arc::new(CannedCompletion(None)),
        );

        let summary = installer.install(src.path(), dst.path()).await?;

        assert_eq!(summary.tier, "copy");
        assert_eq!(
            summary
                .failed_tiers
                .iter()
                .map(|(name, _)| name.as_str())
                .collect::<Vec<_>>(),
            vec!["script", "readme", "select"]
        );
        assert!(dst.path().join("hypr/hyprland.conf").is_file());
        assert!(!dst.path().join("notes.txt").exists());
        assert!(shell.ran().is_empty());
        assert!(prompt.asked.lock().map(|asked| asked.is_empty()).unwrap_or(false));
        Ok(())
    }

    #[test]
    fn relative_files_skip_git_directory() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        std::fs::create_dir_all(dir.path().join(".git/objects"))?;
        std::fs::create_dir_all(dir.path().join("hypr/scripts"))?;
        write(dir.path().join(".git/HEAD"), "ref: refs/heads/main")?;
        write(dir.path().join(".gitignore"), "*.conf")?;
        write(dir.path().join("hypr/hyprland.conf"), "")?;
        write(dir.path().join("hypr/scripts/wall.sh"), "")?;

        let result = relative_files(dir.path())?;

        assert_eq!(
            result,
            vec![
                PathBuf::from(".gitignore"),
                PathBuf::from("hypr/hyprland.conf"),
                PathBuf::from("hypr/scripts/wall.sh"),
            ]
        );
        Ok(())
    }

    #[test_case("hypr/hyprland.conf", true; "plain relative")]
    #[test_case("./waybar/config.jsonc", true; "current dir prefix")]
    #[test_case("/etc/passwd", false; "absolute")]
    #[test_case("../outside.conf", false; "parent escape")]
    #[test_case("hypr/../../outside.conf", false; "nested escape")]
    #[test_case("", false; "empty")]
    #[test]
    fn path_containment(path: &str, expect: bool) {
        assert_eq!(is_contained(Path::new(path)), expect);
    }

    #[test]
    fn clean_answer_lines() {
        let answer = "Here you go:\n```bash\n$ git clone https://x/y\n# comment\n- ./install.sh\n`make install`\n./install.sh\n```\n";
        assert_eq!(
            answer_lines(answer),
            vec!["Here you go:", "git clone https://x/y", "./install.sh", "make install"]
        );
    }

    #[test]
    fn bounded_truncates_on_char_boundary() {
        assert_eq!(bounded("héllo", 2), "hé");
        assert_eq!(bounded("hi", 10), "hi");
    }
}
