// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Release channel classification.
//!
//! Dotfile authors rarely declare what kind of release a branch carries, so
//! hyprrelease guesses from the branch name itself. The guess is made by
//! scanning a fixed ordered keyword table, so the same branch always lands
//! in the same channel.

use serde::Serialize;
use std::fmt;

/// Keyword to channel table, scanned in order, first substring match wins.
const CHANNEL_KEYWORDS: &[(&str, &str)] = &[
    ("main", "stable"),
    ("master", "stable"),
    ("stable", "stable"),
    ("release", "stable"),
    ("beta", "beta"),
    ("testing", "testing"),
    ("test", "testing"),
    ("rc", "release-candidate"),
    ("nightly", "nightly"),
    ("dev", "development"),
    ("preview", "preview"),
    ("edge", "unstable"),
];

/// Where channel information is believed to originate from.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum ChannelSource {
    HostedReleases,
    VersionControlBranch,
}

impl ChannelSource {
    pub fn label(&self) -> &'static str {
        match self {
            Self::HostedReleases => "hosted releases",
            Self::VersionControlBranch => "version-control branch",
        }
    }
}

impl fmt::Display for ChannelSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Classified release channel of a branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelStatus {
    pub branch: String,
    pub channel: String,
    pub source: ChannelSource,

    /// Branch name matched a keyword in the channel table.
    pub matched: bool,
}

impl fmt::Display for ChannelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, from {})", self.channel, self.branch, self.source)
    }
}

/// Classify branch into release channel.
///
/// Falls back to `stable` for dotfiles that publish hosted releases, and to
/// `unknown-version` otherwise.
pub fn classify(branch: impl AsRef<str>, has_hosted_releases: bool) -> ChannelStatus {
    let branch = branch.as_ref();
    let lowered = branch.to_lowercase();
    let source = if has_hosted_releases {
        ChannelSource::HostedReleases
    } else {
        ChannelSource::VersionControlBranch
    };

    let found = CHANNEL_KEYWORDS
        .iter()
        .find(|(keyword, _)| lowered.contains(keyword));

    let (channel, matched) = match found {
        Some((_, channel)) => (channel.to_string(), true),
        None if has_hosted_releases => ("stable".to_string(), false),
        None => ("unknown-version".to_string(), false),
    };

    ChannelStatus {
        branch: branch.to_string(),
        channel,
        source,
        matched,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use simple_test_case::test_case;

    #[test_case("main", false, "stable", true; "main branch")]
    #[test_case("MASTER", false, "stable", true; "upper case master")]
    #[test_case("feature/testing-ui", false, "testing", true; "testing feature branch")]
    #[test_case("beta", true, "beta", true; "beta branch")]
    #[test_case("v2-rc1", false, "release-candidate", true; "release candidate")]
    #[test_case("nightly-build", false, "nightly", true; "nightly branch")]
    #[test_case("develop", false, "development", true; "develop branch")]
    #[test_case("edge", false, "unstable", true; "edge branch")]
    #[test_case("wayland-tweaks", true, "stable", false; "no match with releases")]
    #[test_case("wayland-tweaks", false, "unknown-version", false; "no match without releases")]
    #[test]
    fn classify_branch(branch: &str, releases: bool, channel: &str, matched: bool) {
        let result = classify(branch, releases);
        assert_eq!(result.channel, channel);
        assert_eq!(result.matched, matched);
        assert_eq!(result.branch, branch);
    }

    #[test]
    fn earlier_keywords_win() {
        // "release" comes before "rc" and "dev" in the table.
        assert_eq!(classify("release-dev", false).channel, "stable");
    }

    #[test]
    fn classification_is_deterministic() {
        let first = classify("hotfix/preview-2", true);
        for _ in 0..16 {
            assert_eq!(classify("hotfix/preview-2", true), first);
        }
        assert_eq!(first.source.label(), "hosted releases");
        assert_eq!(
            classify("hotfix/preview-2", false).source.label(),
            "version-control branch"
        );
    }
}
