// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use super::{InstallContext, InstallTier, TierError, TierOutcome};

use async_trait::async_trait;
use tracing::{info, instrument, warn};

/// Run install script shipped with dotfiles.
///
/// Candidates are tried in order, each one as `bash <script> install` inside
/// the working copy. The first script that exits cleanly wins.
#[derive(Debug, Clone)]
pub struct ScriptTier {
    candidates: Vec<String>,
}

impl ScriptTier {
    pub fn new(candidates: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            candidates: candidates.into_iter().map(Into::into).collect(),
        }
    }
}

impl Default for ScriptTier {
    fn default() -> Self {
        Self::new(["hyprrelease.sh", "install.sh"])
    }
}

#[async_trait]
impl InstallTier for ScriptTier {
    fn name(&self) -> &str {
        "script"
    }

    #[instrument(skip(self, ctx), level = "debug")]
    async fn attempt(&self, ctx: &InstallContext<'_>) -> Result<TierOutcome, TierError> {
        let mut failures = Vec::new();
        for candidate in &self.candidates {
            let script = ctx.working_copy.join(candidate);
            if !script.is_file() {
                continue;
            }

            info!("running install script {candidate}");
            match ctx.shell.run_script(ctx.working_copy, &script, &["install"]).await {
                Ok(()) => {
                    return Ok(TierOutcome {
                        detail: format!("ran {candidate}"),
                        commands_run: vec![format!("bash {candidate} install")],
                        ..Default::default()
                    })
                }
                Err(error) => {
                    warn!("install script {candidate} failed: {error}");
                    failures.push(error.to_string());
                }
            }
        }

        if failures.is_empty() {
            return Err(TierError::NotApplicable("no install script found".into()));
        }

        Err(TierError::Failed(format!(
            "no install script succeeded: {}",
            failures.join("; ")
        )))
    }
}
