// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Top-level workflows.
//!
//! The [`Manager`] ties every other module together into the operations a
//! user actually asks for: check a version, audit the system, install a
//! dotfile bundle, update it, and so on. It owns all external capabilities
//! behind trait objects, so each one can be swapped out wholesale.

use crate::{
    ai::{
        model::{fetch_model, ModelError, ModelFetch},
        CliClient, CompletionChain, LocalModel, TextCompletion,
    },
    audit::{
        probe::{HostProbe, SystemProbe},
        AuditError, AuditReport, ComponentAuditor, ComponentRecord,
    },
    clone::{clone_in_background, CloneError, CloneRequest},
    config::Settings,
    install::{
        prompt::{InquirePrompter, Prompt},
        shell::{CommandRunner, SystemShell},
        InstallError, InstallSummary, Installer,
    },
    registry::{Registry, RegistryEntry, RegistryError},
    store::{export_json, MetadataSnapshot, MetadataStore, StoreError},
    version::{
        channel::{classify, ChannelStatus},
        releases::{GitHubReleases, HostedReleases, ReleaseError},
        vcs::{Git2Vcs, VersionControl},
        Resolution, ResolveError, VersionResolver,
    },
};

use indicatif::ProgressBar;
use serde::Serialize;
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::{info, instrument, warn};

/// Outcome of installing a dotfile bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallReport {
    pub name: String,
    pub branch: String,
    pub working_copy: PathBuf,
    pub summary: InstallSummary,
    pub resolution: Resolution,
    pub channel: ChannelStatus,

    /// Release metadata file written, if any could be.
    pub metadata_path: Option<PathBuf>,
}

/// Outcome of an update check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateReport {
    pub components: Vec<ComponentRecord>,
    pub audit: AuditReport,
    pub updates_available: bool,

    /// Resolution of existing working copy, if there is one.
    pub resolution: Option<Resolution>,

    /// Reinstall outcome, if user asked for one.
    pub reinstalled: Option<InstallReport>,
}

/// Entry point for every hyprrelease workflow.
pub struct Manager {
    settings: Settings,
    registry: Arc<Registry>,
    releases: Arc<dyn HostedReleases>,
    vcs: Arc<dyn VersionControl>,
    probe: Arc<dyn SystemProbe>,
    prompt: Arc<dyn Prompt>,
    shell: Arc<dyn CommandRunner>,
    completion: Arc<dyn TextCompletion>,
    show_progress: bool,
}

impl Manager {
    /// Construct new manager that talks to the actual host.
    ///
    /// The built-in registry is extended with the dotfiles listed in the
    /// settings. Hosted release queries are authenticated with the
    /// `GITHUB_TOKEN` environment variable when it is set.
    ///
    /// # Errors
    ///
    /// - Return [`ManagerError::Registry`] if built-in registry is malformed.
    /// - Return [`ManagerError::Release`] if HTTP client cannot be built.
    pub fn new(settings: Settings) -> Result<Self> {
        let registry = Registry::builtin()?.extended_with(settings.dotfiles.clone());
        let releases = GitHubReleases::new(&settings.github_api, settings.network_timeout())?
            .with_token(std::env::var("GITHUB_TOKEN").ok());
        let completion = CompletionChain::new(vec![
            Box::new(LocalModel::new(settings.ai.local.clone(), settings.install_timeout())),
            Box::new(CliClient::new(settings.ai.client.clone(), settings.install_timeout())),
        ]);

        Ok(Self {
            registry: Arc::new(registry),
            releases: Arc::new(releases),
            vcs: Arc::new(Git2Vcs::new(settings.network_timeout())),
            probe: Arc::new(HostProbe::new(settings.command_timeout())),
            prompt: Arc::new(InquirePrompter),
            shell: Arc::new(SystemShell::new(settings.install_timeout())),
            completion: Arc::new(completion),
            show_progress: true,
            settings,
        })
    }

    pub fn with_registry(mut self, registry: Registry) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    pub fn with_releases(mut self, releases: Arc<dyn HostedReleases>) -> Self {
        self.releases = releases;
        self
    }

    pub fn with_vcs(mut self, vcs: Arc<dyn VersionControl>) -> Self {
        self.vcs = vcs;
        self
    }

    pub fn with_probe(mut self, probe: Arc<dyn SystemProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn with_prompt(mut self, prompt: Arc<dyn Prompt>) -> Self {
        self.prompt = prompt;
        self
    }

    pub fn with_shell(mut self, shell: Arc<dyn CommandRunner>) -> Self {
        self.shell = shell;
        self
    }

    pub fn with_completion(mut self, completion: Arc<dyn TextCompletion>) -> Self {
        self.completion = completion;
        self
    }

    /// Show or hide clone progress bars.
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// All registry entries.
    pub fn list(&self) -> Vec<RegistryEntry> {
        self.registry.iter().cloned().collect()
    }

    /// Path of working copy for named dotfile.
    ///
    /// # Errors
    ///
    /// - Return [`ManagerError::Registry`] if `name` is not in the registry.
    pub fn working_copy(&self, name: &str) -> Result<PathBuf> {
        let entry = self.registry.get(name)?;
        Ok(self.settings.work_dir.join(&entry.name))
    }

    /// Resolve version pair of installed dotfile.
    ///
    /// # Errors
    ///
    /// - Return [`ManagerError::Resolve`] if `name` is not in the registry.
    pub async fn check_version(&self, name: &str) -> Result<Resolution> {
        let working_copy = self.working_copy(name)?;
        Ok(self.resolver().resolve(name, &working_copy).await?)
    }

    /// Classify release channel of installed dotfile.
    ///
    /// # Errors
    ///
    /// - Return [`ManagerError::Resolve`] if branch of working copy cannot
    ///   be read.
    pub async fn check_channel(&self, name: &str) -> Result<ChannelStatus> {
        let working_copy = self.working_copy(name)?;
        Ok(self.resolver().check_channel(name, &working_copy).await?)
    }

    /// Audit system components, or every component if `names` is empty.
    ///
    /// # Errors
    ///
    /// - Return [`ManagerError::Audit`] if a name is not a known component.
    pub async fn audit(&self, names: &[String]) -> Result<(Vec<ComponentRecord>, AuditReport)> {
        Ok(self.auditor().audit(names).await?)
    }

    /// Clone and install named dotfile, then record its release identity.
    ///
    /// Installs `branch` if given. Otherwise the user is asked, with the
    /// registry's default branch offered as the answer.
    ///
    /// # Errors
    ///
    /// - Return [`ManagerError::Registry`] if `name` is not in the registry.
    /// - Return [`ManagerError::Clone`] if the clone fails.
    /// - Return [`ManagerError::Install`] if every install tier fails.
    #[instrument(skip(self), level = "debug")]
    pub async fn install(&self, name: &str, branch: Option<String>) -> Result<InstallReport> {
        let entry = self.registry.get(name)?;
        let branch = branch
            .or_else(|| self.prompt.text("Branch to install", &entry.branch))
            .map(|branch| branch.trim().to_string())
            .filter(|branch| !branch.is_empty())
            .unwrap_or_else(|| entry.branch.clone());

        let working_copy = self.settings.work_dir.join(&entry.name);
        let request = CloneRequest {
            url: entry.repository.clone(),
            branch: branch.clone(),
            path: working_copy.clone(),
            depth: self.settings.clone_depth,
        };
        info!("installing {} from {} ({branch})", entry.name, entry.repository);
        clone_in_background(request, self.progress_bar()).await?;

        let summary = self
            .installer()
            .install(&working_copy, &self.settings.target_dir)
            .await?;
        let (resolution, channel, metadata_path) =
            self.record_release(&entry, &working_copy, &branch).await?;

        Ok(InstallReport {
            name: entry.name,
            branch,
            working_copy,
            summary,
            resolution,
            channel,
            metadata_path,
        })
    }

    /// Check for updates of system components and installed dotfile.
    ///
    /// Refreshes both metadata files along the way. Offers a reinstall at
    /// the end, which the user has to explicitly accept.
    ///
    /// # Errors
    ///
    /// - Return [`ManagerError::Registry`] if `name` is not in the registry.
    /// - Any error of [`Manager::install`] if a reinstall was accepted.
    #[instrument(skip(self), level = "debug")]
    pub async fn update(&self, name: &str) -> Result<UpdateReport> {
        let entry = self.registry.get(name)?;
        let (components, audit) = self.audit(&[]).await?;
        let updates_available = AuditReport::updates_available(&components);
        if updates_available {
            info!("system component updates are available");
        }

        let working_copy = self.settings.work_dir.join(&entry.name);
        let mut resolution = None;
        let mut branch = entry.branch.clone();
        if working_copy.exists() {
            if let Err(error) = self.vcs.fetch(&working_copy).await {
                warn!("cannot fetch {}: {error}", entry.name);
            }

            if let Ok(current) = self.vcs.current_branch(&working_copy).await {
                branch = current;
            }

            let (resolved, _, _) = self.record_release(&entry, &working_copy, &branch).await?;
            resolution = Some(resolved);
        } else {
            warn!("{} has no working copy at {}", entry.name, working_copy.display());
        }

        let mut summary = vec![format!("dotfiles: {} ({branch})", entry.name)];
        if let Some(resolution) = &resolution {
            summary.push(format!("version: {}", resolution.pair));
            summary.push(format!("commits behind: {}", resolution.commits_behind));
        }
        summary.extend(
            components
                .iter()
                .filter(|record| record.update_available)
                .map(|record| {
                    format!(
                        "{} {} -> {}",
                        record.name, record.version, record.remote_version
                    )
                }),
        );

        let reinstalled = if self.prompt.confirm("Reinstall dotfiles?", &summary) {
            Some(self.install(&entry.name, Some(branch)).await?)
        } else {
            None
        };

        Ok(UpdateReport {
            components,
            audit,
            updates_available,
            resolution,
            reinstalled,
        })
    }

    /// Merge both metadata files into JSON document.
    ///
    /// # Errors
    ///
    /// - Return [`ManagerError::Store`] if a metadata file cannot be read.
    pub fn export_json(&self) -> Result<String> {
        Ok(export_json(&self.release_store(), &self.system_store())?)
    }

    /// Download configured model artifacts into first model directory.
    ///
    /// # Errors
    ///
    /// - Return [`ManagerError::NoModelDir`] if no model directory is set.
    /// - Return [`ManagerError::Model`] if a download fails verification.
    #[instrument(skip(self), level = "debug")]
    pub async fn fetch_models(&self) -> Result<Vec<ModelFetch>> {
        let dir = self
            .settings
            .ai
            .local
            .model_dirs
            .first()
            .ok_or(ManagerError::NoModelDir)?;
        let client = reqwest::Client::builder()
            .user_agent(concat!("hyprrelease/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(self.settings.network_timeout())
            .build()
            .map_err(ReleaseError::from)?;

        let mut fetched = Vec::new();
        for source in &self.settings.ai.models {
            fetched.push(fetch_model(&client, source, dir, self.progress_bar()).await?);
        }

        Ok(fetched)
    }

    async fn record_release(
        &self,
        entry: &RegistryEntry,
        working_copy: &Path,
        branch: &str,
    ) -> Result<(Resolution, ChannelStatus, Option<PathBuf>)> {
        let resolver = self.resolver();
        let resolution = resolver.resolve(&entry.name, working_copy).await?;
        let channel = match resolver.check_channel(&entry.name, working_copy).await {
            Ok(channel) => channel,
            Err(error) => {
                warn!("cannot read branch of working copy: {error}");
                classify(branch, entry.has_releases)
            }
        };

        let snapshot = MetadataSnapshot::new("Hyprland Release Metadata")
            .with("HYPRLAND_DOTFILES_NAME", entry.name.as_str())
            .with("HYPRLAND_DOTFILES_AUTHOR", entry.author.as_str())
            .with("HYPRLAND_DOTFILES_BRANCH", branch)
            .with("HYPRLAND_VERSION_MAIN", resolution.pair.main.as_str())
            .with("HYPRLAND_VERSION_BUILD", resolution.pair.build.as_str())
            .with("HYPRLAND_BRANCH", channel.branch.as_str())
            .with("HYPRLAND_RELEASE_CHANNEL", channel.channel.as_str())
            .with("HYPRLAND_COMMITS_BEHIND", resolution.commits_behind.to_string())
            .with("HYPRLAND_REMOTE_URL", entry.repository.as_str())
            .with(
                "HYPRLAND_INSTALL_DATE",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            );

        let metadata_path = match self.release_store().write_snapshot(&snapshot) {
            Ok(path) => Some(path),
            Err(error) => {
                warn!("{error}");
                None
            }
        };

        Ok((resolution, channel, metadata_path))
    }

    fn resolver(&self) -> VersionResolver {
        VersionResolver::new(self.registry.clone(), self.releases.clone(), self.vcs.clone())
            .with_release_limit(self.settings.hosted_release_limit)
    }

    fn auditor(&self) -> ComponentAuditor {
        ComponentAuditor::new(
            self.probe.clone(),
            self.releases.clone(),
            self.vcs.clone(),
            self.system_store(),
        )
    }

    fn installer(&self) -> Installer {
        Installer::standard(
            &self.settings,
            self.prompt.clone(),
            self.shell.clone(),
            self.completion.clone(),
        )
    }

    fn release_store(&self) -> MetadataStore {
        MetadataStore::new(self.settings.release_metadata.clone())
    }

    fn system_store(&self) -> MetadataStore {
        MetadataStore::new(self.settings.system_metadata.clone())
    }

    fn progress_bar(&self) -> ProgressBar {
        if self.show_progress {
            ProgressBar::new(0)
        } else {
            ProgressBar::hidden()
        }
    }
}

/// Workflow error types.
#[derive(Debug, thiserror::Error)]
pub enum ManagerError {
    /// No directory to store model artifacts in.
    #[error("no model directory configured")]
    NoModelDir,

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Audit(#[from] AuditError),

    #[error(transparent)]
    Clone(#[from] CloneError),

    #[error(transparent)]
    Install(#[from] InstallError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Release(#[from] ReleaseError),
}

/// Friendly result alias :3
type Result<T, E = ManagerError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::install::tests::{CannedCompletion, RecordingShell, ScriptedPrompt};
    use pretty_assertions::assert_eq;

    fn settings(root: &Path) -> Settings {
        let mut settings = Settings {
            target_dir: root.join("target"),
            work_dir: root.join("work"),
            release_metadata: vec![root.join("meta/hyprland-release")],
            system_metadata: vec![root.join("meta/hyprland-system-release")],
            ..Settings::default()
        };
        settings.ai.local.model_dirs = Vec::new();
        settings
    }

    fn manager(root: &Path) -> anyhow::Result<Manager> {
        Ok(Manager::new(settings(root))?
            .with_prompt(Arc::new(ScriptedPrompt::answering(false)))
            .with_shell(Arc::new(RecordingShell::default()))
            .with_completion(Arc::new(CannedCompletion(None)))
            .with_progress(false))
    }

    #[test]
    fn list_includes_builtin_and_configured_dotfiles() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let mut settings = settings(dir.path());
        settings.dotfiles.push(RegistryEntry {
            name: "my-dots".into(),
            author: "me".into(),
            repository: "https://github.com/me/dots".into(),
            branch: "main".into(),
            has_releases: false,
            description: String::new(),
        });

        let manager = Manager::new(settings)?;
        let names = manager
            .list()
            .into_iter()
            .map(|entry| entry.name)
            .collect::<Vec<_>>();

        assert_eq!(names.len(), 8);
        assert_eq!(names.last().map(String::as_str), Some("my-dots"));
        assert_eq!(manager.working_copy("MY-DOTS")?, dir.path().join("work/my-dots"));
        Ok(())
    }

    #[tokio::test]
    async fn install_unknown_dotfile_is_not_found() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let result = manager(dir.path())?.install("nope", None).await;
        assert!(matches!(result, Err(ManagerError::Registry(RegistryError::NotFound(_)))));
        Ok(())
    }

    #[tokio::test]
    async fn fetch_models_without_model_dir_fails() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let result = manager(dir.path())?.fetch_models().await;
        assert!(matches!(result, Err(ManagerError::NoModelDir)));
        Ok(())
    }

    #[test]
    fn export_json_without_metadata_is_empty() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let json: serde_json::Value = serde_json::from_str(&manager(dir.path())?.export_json()?)?;
        assert_eq!(
            json,
            serde_json::json!({"release_meta": {}, "system_meta": {}})
        );
        Ok(())
    }
}
