// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! System component auditing.
//!
//! Dotfiles are only as good as the Hyprland stack they configure. The
//! auditor inspects each core component installed on the host, compares it
//! against what upstream and the local package manager offer, and records the
//! outcome in the system components metadata file.
//!
//! # Partial Results
//!
//! Auditing never gives up halfway. A component that is not installed gets
//! skipped, a remote that cannot be reached yields `"unknown"`, and a metadata
//! file that cannot be written is noted in the [`AuditReport`]. The only hard
//! error is asking for a component that hyprrelease does not know about.

pub mod probe;

use crate::{
    store::{MetadataSnapshot, MetadataStore},
    version::{
        date_stamp, releases::HostedReleases, same_version, vcs::VersionControl, UNKNOWN,
    },
};
use probe::{local_version, package_version, SystemProbe};

use futures::future::join_all;
use serde::Serialize;
use std::{path::PathBuf, sync::Arc};
use tracing::{debug, info, instrument, warn};

/// Core component of the Hyprland stack.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Component {
    /// Executable name.
    pub name: &'static str,

    /// Package that ships the executable.
    pub package: &'static str,

    /// Upstream repository slug.
    pub slug: &'static str,
}

impl Component {
    pub fn repository_url(&self) -> String {
        format!("https://github.com/{}.git", self.slug)
    }
}

/// Audited components, in reporting order.
pub const COMPONENTS: &[Component] = &[
    Component {
        name: "hyprland",
        package: "hyprland",
        slug: "hyprwm/Hyprland",
    },
    Component {
        name: "hyprctl",
        package: "hyprland",
        slug: "hyprwm/Hyprland",
    },
    Component {
        name: "hyprpaper",
        package: "hyprpaper",
        slug: "hyprwm/hyprpaper",
    },
    Component {
        name: "hypridle",
        package: "hypridle",
        slug: "hyprwm/hypridle",
    },
    Component {
        name: "hyprlock",
        package: "hyprlock",
        slug: "hyprwm/hyprlock",
    },
];

/// Audited state of one installed component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComponentRecord {
    pub name: String,
    pub version: String,
    pub path: PathBuf,
    pub remote_version: String,
    pub package_version: String,
    pub update_available: bool,

    /// Upstream repository the remote version came from.
    pub source: String,

    /// Package manager the package version came from.
    pub package_source: String,
}

impl ComponentRecord {
    fn metadata_prefix(&self) -> String {
        format!("HYPRLAND_{}", self.name.to_uppercase().replace('-', "_"))
    }
}

/// Side notes of an audit.
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditReport {
    /// Components skipped because they are not installed.
    pub skipped: Vec<String>,

    /// Metadata file the records were persisted to.
    pub persisted_to: Option<PathBuf>,

    /// Reason records could not be persisted.
    pub persistence_error: Option<String>,
}

impl AuditReport {
    pub fn updates_available(records: &[ComponentRecord]) -> bool {
        records.iter().any(|record| record.update_available)
    }
}

/// Audit core Hyprland components installed on host.
#[derive(Clone)]
pub struct ComponentAuditor {
    probe: Arc<dyn SystemProbe>,
    releases: Arc<dyn HostedReleases>,
    vcs: Arc<dyn VersionControl>,
    store: MetadataStore,
}

impl ComponentAuditor {
    pub fn new(
        probe: Arc<dyn SystemProbe>,
        releases: Arc<dyn HostedReleases>,
        vcs: Arc<dyn VersionControl>,
        store: MetadataStore,
    ) -> Self {
        Self {
            probe,
            releases,
            vcs,
            store,
        }
    }

    /// Audit named components, or every known component if `names` is empty.
    ///
    /// Components are audited concurrently, but records come back in the
    /// order of [`COMPONENTS`]. The whole record set is written to the system
    /// components metadata file afterwards.
    ///
    /// # Errors
    ///
    /// - Return [`AuditError::UnknownComponent`] if any name is not a known
    ///   component. Nothing is probed in that case.
    #[instrument(skip(self), level = "debug")]
    pub async fn audit(&self, names: &[String]) -> Result<(Vec<ComponentRecord>, AuditReport)> {
        let selected = select_components(names)?;
        let audits = selected.iter().map(|component| self.audit_component(component));
        let outcomes = join_all(audits).await;

        let mut report = AuditReport::default();
        let mut records = Vec::new();
        for (component, outcome) in selected.iter().zip(outcomes) {
            match outcome {
                Some(record) => records.push(record),
                None => report.skipped.push(component.name.to_string()),
            }
        }

        match self.store.write_snapshot(&snapshot(&records)) {
            Ok(path) => report.persisted_to = Some(path),
            Err(error) => {
                warn!("{error}");
                report.persistence_error = Some(error.to_string());
            }
        }

        Ok((records, report))
    }

    async fn audit_component(&self, component: &Component) -> Option<ComponentRecord> {
        let Some(path) = self.probe.locate(component.name) else {
            info!("{} is not installed, skipping", component.name);
            return None;
        };

        let (version, remote_version, (package_version, package_source)) = tokio::join!(
            local_version(self.probe.as_ref(), &path),
            self.remote_version(component),
            package_version(self.probe.as_ref(), component.package),
        );

        let update_available = is_update(&version, &remote_version)
            || is_update(&version, &package_version);
        debug!(
            "{}: local {version}, remote {remote_version}, package {package_version}",
            component.name
        );

        Some(ComponentRecord {
            name: component.name.to_string(),
            version,
            path,
            remote_version,
            package_version,
            update_available,
            source: component.slug.to_string(),
            package_source,
        })
    }

    async fn remote_version(&self, component: &Component) -> String {
        match self.releases.latest_tag(component.slug).await {
            Ok(Some(tag)) => return tag,
            Ok(None) => debug!("{} has no hosted releases", component.slug),
            Err(error) => debug!("cannot query hosted releases of {}: {error}", component.slug),
        }

        match self.vcs.list_remote_tags(&component.repository_url()).await {
            Ok(tags) => last_tag(&tags).unwrap_or_else(|| UNKNOWN.to_string()),
            Err(error) => {
                debug!("cannot list remote tags of {}: {error}", component.slug);
                UNKNOWN.to_string()
            }
        }
    }
}

fn select_components(names: &[String]) -> Result<Vec<Component>> {
    if names.is_empty() {
        return Ok(COMPONENTS.to_vec());
    }

    for name in names {
        if !COMPONENTS
            .iter()
            .any(|component| component.name.eq_ignore_ascii_case(name))
        {
            return Err(AuditError::UnknownComponent(name.clone()));
        }
    }

    Ok(COMPONENTS
        .iter()
        .filter(|component| names.iter().any(|name| component.name.eq_ignore_ascii_case(name)))
        .copied()
        .collect())
}

fn is_update(local: &str, remote: &str) -> bool {
    remote != UNKNOWN && !same_version(local, remote)
}

/// Last path segment of last advertised tag, peeled suffix removed.
pub(crate) fn last_tag(tags: &[String]) -> Option<String> {
    let last = tags.last()?;
    let segment = last.rsplit('/').next().unwrap_or(last.as_str());
    let segment = segment.strip_suffix("^{}").unwrap_or(segment);
    (!segment.is_empty()).then(|| segment.to_string())
}

fn snapshot(records: &[ComponentRecord]) -> MetadataSnapshot {
    let mut snapshot = MetadataSnapshot::new("Hyprland System Components Metadata")
        .with("HYPRLAND_SYSTEM_CHECK_DATE", date_stamp());

    for record in records {
        let prefix = record.metadata_prefix();
        snapshot.insert(format!("{prefix}_VERSION"), record.version.as_str());
        snapshot.insert(format!("{prefix}_REMOTE_VERSION"), record.remote_version.as_str());
        snapshot.insert(format!("{prefix}_PACKAGE_VERSION"), record.package_version.as_str());
        snapshot.insert(format!("{prefix}_PACKAGE_SOURCE"), record.package_source.as_str());
        snapshot.insert(format!("{prefix}_PATH"), record.path.display().to_string());
        snapshot.insert(format!("{prefix}_UPDATE"), record.update_available.to_string());
        snapshot.insert(format!("{prefix}_SOURCE"), record.source.as_str());
    }

    snapshot
}

/// Component audit error types.
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    /// Requested component is not in the component table.
    #[error("unknown component {0:?}")]
    UnknownComponent(String),
}

/// Friendly result alias :3
type Result<T, E = AuditError> = std::result::Result<T, E>;
