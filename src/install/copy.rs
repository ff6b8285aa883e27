// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use super::{copy_relative, relative_files, InstallContext, InstallTier, TierError, TierOutcome};

use async_trait::async_trait;
use tracing::{debug, instrument};

/// Copy every file with an allow-listed extension.
///
/// Last resort tier. Asks nothing, runs nothing, and only fails if the file
/// system does.
#[derive(Debug, Clone)]
pub struct CopyTier {
    extensions: Vec<String>,
}

impl CopyTier {
    /// Construct new copy tier.
    ///
    /// Extensions are matched case-insensitively, with or without a leading
    /// dot.
    pub fn new(extensions: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            extensions: extensions
                .into_iter()
                .map(|ext| ext.into().trim_start_matches('.').to_lowercase())
                .collect(),
        }
    }

    fn is_allowed(&self, path: &std::path::Path) -> bool {
        path.extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .is_some_and(|ext| self.extensions.contains(&ext))
    }
}

#[async_trait]
impl InstallTier for CopyTier {
    fn name(&self) -> &str {
        "copy"
    }

    #[instrument(skip(self, ctx), level = "debug")]
    async fn attempt(&self, ctx: &InstallContext<'_>) -> Result<TierOutcome, TierError> {
        let mut outcome = TierOutcome::default();
        for relative in relative_files(ctx.working_copy)? {
            if !self.is_allowed(&relative) {
                debug!("skipping {}", relative.display());
                continue;
            }

            outcome
                .copied
                .push(copy_relative(ctx.working_copy, ctx.target_dir, &relative)?);
        }

        outcome.detail = format!("copied {} files", outcome.copied.len());
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::install::tests::{context, CannedCompletion, RecordingShell, ScriptedPrompt};
    use pretty_assertions::assert_eq;
    use std::{
        fs::{create_dir_all, read_to_string, write},
        path::PathBuf,
    };

    #[tokio::test]
    async fn copies_only_allow_listed_extensions() -> anyhow::Result<()> {
        let src = tempfile::tempdir()?;
        let dst = tempfile::tempdir()?;
        create_dir_all(src.path().join("hypr/scripts"))?;
        create_dir_all(src.path().join(".git"))?;
        write(src.path().join("hypr/hyprland.conf"), "monitor=,preferred,auto,1")?;
        write(src.path().join("hypr/wall.png"), "png")?;
        write(src.path().join("hypr/wall.jpg"), "jpg")?;
        write(src.path().join("hypr/scripts/start.SH"), "exec waybar")?;
        write(src.path().join("blob.bin"), "bin")?;
        write(src.path().join(".git/config.conf"), "nope")?;
        let prompt = ScriptedPrompt::answering(false);
        let shell = RecordingShell::default();
        let completion = CannedCompletion(None);
        let ctx = context(src.path(), dst.path(), &prompt, &shell, &completion);

        let outcome = CopyTier::new(["conf", ".sh"]).attempt(&ctx).await?;

        assert_eq!(
            outcome.copied,
            vec![
                PathBuf::from("hypr/hyprland.conf"),
                PathBuf::from("hypr/scripts/start.SH")
            ]
        );
        assert_eq!(
            read_to_string(dst.path().join("hypr/hyprland.conf"))?,
            "monitor=,preferred,auto,1"
        );
        assert!(!dst.path().join("hypr/wall.png").exists());
        assert!(!dst.path().join("hypr/wall.jpg").exists());
        assert!(!dst.path().join("blob.bin").exists());
        assert!(!dst.path().join(".git").exists());
        assert!(shell.ran().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn empty_working_copy_still_succeeds() -> anyhow::Result<()> {
        let src = tempfile::tempdir()?;
        let dst = tempfile::tempdir()?;
        let prompt = ScriptedPrompt::answering(false);
        let shell = RecordingShell::default();
        let completion = CannedCompletion(None);
        let ctx = context(src.path(), dst.path(), &prompt, &shell, &completion);

        let outcome = CopyTier::new(["conf"]).attempt(&ctx).await?;

        assert!(outcome.copied.is_empty());
        Ok(())
    }
}
