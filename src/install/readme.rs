// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! README driven installation.
//!
//! Plenty of dotfiles document their install steps in the README instead of
//! shipping a script. This tier pulls shell commands out of the README,
//! shows them to the user, and runs the ones that pass the safety filter.
//! Text completion is used for extraction when available. Otherwise a plain
//! heuristic picks lines that look like install steps.

use super::{
    answer_lines, bounded, InstallContext, InstallTier, SkippedCommand, TierError, TierOutcome,
};
use crate::{ai::TextCompletion, safety::is_dangerous};

use async_trait::async_trait;
use std::{
    fs::read_to_string,
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument, warn};

/// README file names, tried in order.
const README_CANDIDATES: &[&str] = &["README.md", "README", "readme.md", "readme"];

/// Line fragments that mark an install step.
const INSTALL_MARKERS: &[&str] = &["git clone", "./install", "make install"];

/// Extract install commands from README and run them.
#[derive(Debug, Clone)]
pub struct ReadmeTier {
    max_prompt_chars: usize,
}

impl ReadmeTier {
    pub fn new(max_prompt_chars: usize) -> Self {
        Self { max_prompt_chars }
    }

    async fn extract_commands(&self, completion: &dyn TextCompletion, readme: &str) -> Vec<String> {
        if completion.is_available() {
            let prompt = format!(
                "Below is the README of a Hyprland dotfiles repository. Emit the shell \
                 commands needed to install these dotfiles, one per line, no prose, no \
                 explanations, no Markdown.\n\n{}",
                bounded(readme, self.max_prompt_chars)
            );

            match completion.complete(&prompt).await {
                Ok(answer) => {
                    let commands = answer_lines(&answer);
                    if !commands.is_empty() {
                        return commands;
                    }
                    debug!("text completion found no commands, falling back to heuristic");
                }
                Err(error) => warn!("text completion failed, falling back to heuristic: {error}"),
            }
        }

        heuristic_commands(readme)
    }
}

#[async_trait]
impl InstallTier for ReadmeTier {
    fn name(&self) -> &str {
        "readme"
    }

    #[instrument(skip(self, ctx), level = "debug")]
    async fn attempt(&self, ctx: &InstallContext<'_>) -> Result<TierOutcome, TierError> {
        let readme = find_readme(ctx.working_copy)
            .ok_or_else(|| TierError::NotApplicable("no README found".into()))?;
        let text = read_to_string(&readme).map_err(|err| TierError::Io {
            source: err,
            path: readme.clone(),
        })?;

        let commands = self.extract_commands(ctx.completion, &text).await;
        if commands.is_empty() {
            return Err(TierError::NotApplicable(
                "no install commands found in README".into(),
            ));
        }

        if !ctx
            .prompt
            .confirm("Run these install commands from the README?", &commands)
        {
            return Err(TierError::UserAborted);
        }

        let mut outcome = TierOutcome::default();
        for command in commands {
            if is_dangerous(&command) {
                warn!("skipping dangerous command: {command}");
                outcome.skipped.push(SkippedCommand {
                    command,
                    reason: "matched safety deny-list".into(),
                });
                continue;
            }

            info!("running {command}");
            match ctx.shell.run_line(ctx.working_copy, &command).await {
                Ok(()) => outcome.commands_run.push(command),
                Err(error) => warn!("README command failed: {error}"),
            }
        }

        if outcome.commands_run.is_empty() {
            return Err(TierError::Failed("no README command succeeded".into()));
        }

        outcome.detail = format!(
            "ran {} README commands, skipped {}",
            outcome.commands_run.len(),
            outcome.skipped.len()
        );

        Ok(outcome)
    }
}

fn find_readme(working_copy: &Path) -> Option<PathBuf> {
    README_CANDIDATES
        .iter()
        .map(|name| working_copy.join(name))
        .find(|path| path.is_file())
}

/// Pick README lines that look like install steps.
pub(crate) fn heuristic_commands(readme: &str) -> Vec<String> {
    let mut commands: Vec<String> = Vec::new();
    for line in readme.lines() {
        let line = line.trim();
        let line = line.strip_prefix("$ ").unwrap_or(line).trim();
        if INSTALL_MARKERS.iter().any(|marker| line.contains(marker))
            && !commands.iter().any(|seen| seen == line)
        {
            commands.push(line.to_string());
        }
    }

    commands
}
