// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Version resolution.
//!
//! Figuring out which version of a dotfile bundle is installed is harder than
//! it sounds. Some bundles publish hosted releases, some only push tags, and
//! some do neither. Hyprrelease consults every source it has, treats each one
//! as unreliable, and merges whatever answers come back into a
//! [`VersionPair`].
//!
//! # Version Pair
//!
//! A version pair carries a human readable `main` version, and a `build`
//! identifier that pinpoints the exact commit. They are resolved as follows:
//!
//! | Hosted release | VCS descriptor | main       | build      |
//! |----------------|----------------|------------|------------|
//! | yes            | yes            | tag        | descriptor |
//! | yes            | no             | tag        | `YYYYMMDD` |
//! | no             | yes            | descriptor | descriptor |
//! | no             | no             | `unknown`  | `unknown`  |

pub mod channel;
pub mod releases;
pub mod vcs;

use crate::registry::Registry;
use channel::{classify, ChannelStatus};
use releases::HostedReleases;
use vcs::{VcsError, VersionControl};

use regex::Regex;
use serde::Serialize;
use std::{
    fmt,
    path::Path,
    sync::{Arc, LazyLock},
};
use tracing::{debug, instrument, warn};

/// Sentinel for version information that could not be determined.
pub const UNKNOWN: &str = "unknown";

static DOTTED_VERSION: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"v?(\d+\.\d+(?:\.\d+)?)").unwrap()
});

/// Human version paired with exact build identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionPair {
    pub main: String,
    pub build: String,
}

impl VersionPair {
    pub fn new(main: impl Into<String>, build: impl Into<String>) -> Self {
        Self {
            main: main.into(),
            build: build.into(),
        }
    }

    pub fn unknown() -> Self {
        Self::new(UNKNOWN, UNKNOWN)
    }

    pub fn is_unknown(&self) -> bool {
        self.main == UNKNOWN && self.build == UNKNOWN
    }
}

impl fmt::Display for VersionPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.main, self.build)
    }
}

/// Number of commits a working copy trails its remote.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum Drift {
    Known(usize),
    Unknown,
}

impl fmt::Display for Drift {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Known(count) => write!(f, "{count}"),
            Self::Unknown => f.write_str(UNKNOWN),
        }
    }
}

/// Result of version resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub pair: VersionPair,
    pub commits_behind: Drift,
}

/// Resolve versions and channels of installed dotfiles.
#[derive(Clone)]
pub struct VersionResolver {
    registry: Arc<Registry>,
    releases: Arc<dyn HostedReleases>,
    vcs: Arc<dyn VersionControl>,
    release_limit: usize,
}

impl VersionResolver {
    pub fn new(
        registry: Arc<Registry>,
        releases: Arc<dyn HostedReleases>,
        vcs: Arc<dyn VersionControl>,
    ) -> Self {
        Self {
            registry,
            releases,
            vcs,
            release_limit: 3,
        }
    }

    /// Cap number of hosted releases queried.
    pub fn with_release_limit(mut self, limit: usize) -> Self {
        self.release_limit = limit.max(1);
        self
    }

    /// Resolve version pair and drift of working copy for named dotfile.
    ///
    /// Every source is consulted on a best-effort basis. Failures of hosted
    /// release queries or version control queries only degrade the answer,
    /// they never abort resolution.
    ///
    /// # Errors
    ///
    /// - Return [`ResolveError::NotFound`] if `name` is not in the registry.
    #[instrument(skip(self, working_copy), level = "debug")]
    pub async fn resolve(&self, name: &str, working_copy: &Path) -> Result<Resolution> {
        let entry = self
            .registry
            .get(name)
            .map_err(|_| ResolveError::NotFound(name.to_string()))?;

        let hosted = async {
            let slug = entry.slug()?;
            match self.releases.list_releases(&slug, self.release_limit).await {
                Ok(releases) => releases.into_iter().next().map(|release| release.tag),
                Err(error) => {
                    warn!("cannot query hosted releases of {slug}: {error}");
                    None
                }
            }
        };
        let descriptor = async {
            match self.vcs.describe(working_copy).await {
                Ok(descriptor) => Some(descriptor),
                Err(error) => {
                    warn!("cannot describe {:?}: {error}", working_copy.display());
                    None
                }
            }
        };
        let drift = async {
            match self.vcs.commits_behind(working_copy, &entry.branch).await {
                Ok(count) => Drift::Known(count),
                Err(error) => {
                    debug!("cannot count commits behind: {error}");
                    Drift::Unknown
                }
            }
        };

        let (hosted, descriptor, commits_behind) = tokio::join!(hosted, descriptor, drift);
        let pair = merge_pair(hosted, descriptor);
        debug!("resolved {name} to {pair}, {commits_behind} commits behind");

        Ok(Resolution {
            pair,
            commits_behind,
        })
    }

    /// Classify release channel of working copy for named dotfile.
    ///
    /// # Errors
    ///
    /// - Return [`ResolveError::NotFound`] if `name` is not in the registry.
    /// - Return [`ResolveError::Vcs`] if current branch cannot be read.
    #[instrument(skip(self, working_copy), level = "debug")]
    pub async fn check_channel(&self, name: &str, working_copy: &Path) -> Result<ChannelStatus> {
        let entry = self
            .registry
            .get(name)
            .map_err(|_| ResolveError::NotFound(name.to_string()))?;
        let branch = self.vcs.current_branch(working_copy).await?;

        Ok(classify(branch, entry.has_releases))
    }
}

fn merge_pair(hosted: Option<String>, descriptor: Option<String>) -> VersionPair {
    match (hosted, descriptor) {
        (Some(tag), Some(descriptor)) => VersionPair::new(tag, descriptor),
        (Some(tag), None) => VersionPair::new(tag, date_stamp()),
        (None, Some(descriptor)) => VersionPair::new(descriptor.clone(), descriptor),
        (None, None) => VersionPair::unknown(),
    }
}

/// Current local date as `YYYYMMDD`.
pub fn date_stamp() -> String {
    chrono::Local::now().format("%Y%m%d").to_string()
}

/// Extract dotted version number from arbitrary version string.
///
/// `"Hyprland 0.41.2 built from branch"` yields `Some("0.41.2")`.
pub fn extract_version(text: impl AsRef<str>) -> Option<String> {
    DOTTED_VERSION
        .captures(text.as_ref())
        .and_then(|captures| captures.get(1))
        .map(|found| found.as_str().to_string())
}

/// Check if two version strings name the same version.
///
/// Compares extracted dotted version numbers when both strings carry one,
/// otherwise compares raw trimmed strings.
pub fn same_version(left: impl AsRef<str>, right: impl AsRef<str>) -> bool {
    let (left, right) = (left.as_ref().trim(), right.as_ref().trim());
    match (extract_version(left), extract_version(right)) {
        (Some(left), Some(right)) => left == right,
        _ => left == right,
    }
}

/// Version resolution error types.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// Dotfile is not in the registry.
    #[error("dotfile {0:?} not found in registry")]
    NotFound(String),

    /// Working copy could not be queried.
    #[error(transparent)]
    Vcs(#[from] VcsError),
}

/// Friendly result alias :3
type Result<T, E = ResolveError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::RegistryEntry;
    use async_trait::async_trait;
    use releases::{HostedRelease, ReleaseError};
    use simple_test_case::test_case;

    struct StubReleases(Option<Vec<&'static str>>);

    #[async_trait]
    impl HostedReleases for StubReleases {
        async fn list_releases(
            &self,
            _slug: &str,
            limit: usize,
        ) -> Result<Vec<HostedRelease>, ReleaseError> {
            match &self.0 {
                Some(tags) => Ok(tags
                    .iter()
                    .take(limit)
                    .map(|tag| HostedRelease {
                        tag: tag.to_string(),
                        ..Default::default()
                    })
                    .collect()),
                None => Err(ReleaseError::InvalidResponse("offline".into())),
            }
        }
    }

    struct StubVcs {
        descriptor: Option<&'static str>,
        branch: &'static str,
        behind: Option<usize>,
    }

    #[async_trait]
    impl VersionControl for StubVcs {
        async fn describe(&self, _: &Path) -> Result<String, VcsError> {
            self.descriptor
                .map(String::from)
                .ok_or(VcsError::UnbornHead)
        }

        async fn current_branch(&self, _: &Path) -> Result<String, VcsError> {
            Ok(self.branch.into())
        }

        async fn commits_behind(&self, _: &Path, fallback: &str) -> Result<usize, VcsError> {
            self.behind
                .ok_or_else(|| VcsError::NoUpstream(fallback.into()))
        }

        async fn list_remote_tags(&self, _: &str) -> Result<Vec<String>, VcsError> {
            Ok(Vec::new())
        }

        async fn fetch(&self, _: &Path) -> Result<(), VcsError> {
            Ok(())
        }
    }

    fn resolver(releases: StubReleases, vcs: StubVcs) -> VersionResolver {
        let registry = Registry::new([RegistryEntry {
            name: "ML4W-Dotfiles".into(),
            author: "mylinuxforwork".into(),
            repository: "https://github.com/mylinuxforwork/dotfiles".into(),
            branch: "main".into(),
            has_releases: true,
            description: String::new(),
        }]);
        VersionResolver::new(Arc::new(registry), Arc::new(releases), Arc::new(vcs))
    }

    fn vcs(descriptor: Option<&'static str>, behind: Option<usize>) -> StubVcs {
        StubVcs {
            descriptor,
            branch: "feature/testing-ui",
            behind,
        }
    }

    #[tokio::test]
    async fn hosted_tag_with_descriptor() -> anyhow::Result<()> {
        let resolver = resolver(
            StubReleases(Some(vec!["v2.1.0", "v2.0.5"])),
            vcs(Some("v2.0.5-3-gabc1234"), Some(4)),
        );

        let result = resolver.resolve("ml4w-dotfiles", Path::new("/tmp")).await?;

        assert_eq!(result.pair, VersionPair::new("v2.1.0", "v2.0.5-3-gabc1234"));
        assert_eq!(result.commits_behind, Drift::Known(4));
        Ok(())
    }

    #[tokio::test]
    async fn empty_hosted_releases_use_descriptor_twice() -> anyhow::Result<()> {
        let resolver = resolver(StubReleases(Some(vec![])), vcs(Some("abc1234"), None));

        let result = resolver.resolve("ML4W-Dotfiles", Path::new("/tmp")).await?;

        assert_eq!(result.pair, VersionPair::new("abc1234", "abc1234"));
        assert_eq!(result.commits_behind, Drift::Unknown);
        Ok(())
    }

    #[tokio::test]
    async fn failed_hosted_query_uses_descriptor_twice() -> anyhow::Result<()> {
        let resolver = resolver(StubReleases(None), vcs(Some("v1.0.0"), Some(0)));

        let result = resolver.resolve("ML4W-Dotfiles", Path::new("/tmp")).await?;

        assert_eq!(result.pair, VersionPair::new("v1.0.0", "v1.0.0"));
        Ok(())
    }

    #[tokio::test]
    async fn hosted_tag_without_descriptor_uses_date_stamp() -> anyhow::Result<()> {
        let resolver = resolver(StubReleases(Some(vec!["2.9.9"])), vcs(None, None));

        let result = resolver.resolve("ML4W-Dotfiles", Path::new("/tmp")).await?;

        assert_eq!(result.pair.main, "2.9.9");
        assert_eq!(result.pair.build.len(), 8);
        assert!(result.pair.build.chars().all(|c| c.is_ascii_digit()));
        Ok(())
    }

    #[tokio::test]
    async fn nothing_known_is_unknown_pair() -> anyhow::Result<()> {
        let resolver = resolver(StubReleases(None), vcs(None, None));

        let result = resolver.resolve("ML4W-Dotfiles", Path::new("/tmp")).await?;

        assert!(result.pair.is_unknown());
        assert_eq!(result.commits_behind.to_string(), "unknown");
        Ok(())
    }

    #[tokio::test]
    async fn unknown_dotfile_is_not_found() {
        let resolver = resolver(StubReleases(None), vcs(None, None));

        let result = resolver.resolve("nope", Path::new("/tmp")).await;

        assert!(matches!(result, Err(ResolveError::NotFound(name)) if name == "nope"));
    }

    #[tokio::test]
    async fn check_channel_of_working_copy() -> anyhow::Result<()> {
        let resolver = resolver(StubReleases(None), vcs(None, None));

        let result = resolver.check_channel("ML4W-Dotfiles", Path::new("/tmp")).await?;

        assert_eq!(result.channel, "testing");
        assert!(result.matched);
        assert_eq!(result.source.label(), "hosted releases");
        Ok(())
    }

    #[test_case("Hyprland 0.41.2 built from branch main", "v0.41.2", true; "extracted numbers equal")]
    #[test_case("hyprpaper v0.7.0", "0.7.1", false; "extracted numbers differ")]
    #[test_case("  nightly ", "nightly", true; "raw strings trimmed")]
    #[test_case("nightly", "0.41.2", false; "one side without number")]
    #[test]
    fn compare_versions(left: &str, right: &str, expect: bool) {
        assert_eq!(same_version(left, right), expect);
    }
}
