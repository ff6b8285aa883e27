// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use super::{
    answer_lines, bounded, copy_relative, is_contained, relative_files, InstallContext,
    InstallTier, TierError, TierOutcome,
};

use async_trait::async_trait;
use std::path::Path;
use tracing::{debug, instrument};

/// Let text completion pick which files to copy.
///
/// The relative file tree of the working copy is handed to text completion,
/// which answers with the configuration files and scripts worth installing.
/// Entries that do not name a regular file inside the working copy are
/// skipped without complaint.
#[derive(Debug, Clone)]
pub struct SelectTier {
    max_prompt_chars: usize,
}

impl SelectTier {
    pub fn new(max_prompt_chars: usize) -> Self {
        Self { max_prompt_chars }
    }
}

#[async_trait]
impl InstallTier for SelectTier {
    fn name(&self) -> &str {
        "select"
    }

    #[instrument(skip(self, ctx), level = "debug")]
    async fn attempt(&self, ctx: &InstallContext<'_>) -> Result<TierOutcome, TierError> {
        if !ctx.completion.is_available() {
            return Err(TierError::AiUnavailable(
                "no text completion backend installed".into(),
            ));
        }

        let listing = relative_files(ctx.working_copy)?
            .iter()
            .map(|path| path.display().to_string())
            .collect::<Vec<_>>()
            .join("\n");
        let prompt = format!(
            "Below is the file listing of a Hyprland dotfiles repository. List only the \
             configuration files and scripts that belong in the Hyprland configuration \
             directory, one relative path per line, no prose. Exclude license, readme, \
             cache, media, and binary files.\n\n{}",
            bounded(&listing, self.max_prompt_chars)
        );

        let answer = ctx
            .completion
            .complete(&prompt)
            .await
            .map_err(|error| TierError::AiUnavailable(error.to_string()))?;
        let selected = answer_lines(&answer);
        if selected.is_empty() {
            return Err(TierError::NothingCopied);
        }

        if !ctx.prompt.confirm("Copy these files?", &selected) {
            return Err(TierError::UserAborted);
        }

        let mut outcome = TierOutcome::default();
        for entry in &selected {
            let relative = Path::new(entry);
            if !is_contained(relative) || !ctx.working_copy.join(relative).is_file() {
                debug!("skipping {entry}");
                continue;
            }

            outcome
                .copied
                .push(copy_relative(ctx.working_copy, ctx.target_dir, relative)?);
        }

        if outcome.copied.is_empty() {
            return Err(TierError::NothingCopied);
        }

        outcome.detail = format!("copied {} selected files", outcome.copied.len());
        Ok(outcome)
    }
}
