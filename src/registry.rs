// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Dotfile registry.
//!
//! The __registry__ is the table of community dotfiles that hyprrelease knows
//! how to install. A built-in table ships with the binary, and the user may
//! append their own entries through the configuration file.
//!
//! # Immutability
//!
//! The registry is loaded once at startup and never changes afterwards.
//! Lookups hand out owned copies of entries, so callers can freely tweak the
//! copy they get, e.g., override the branch to install, without touching the
//! shared table.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

const BUILTIN_REGISTRY: &str = include_str!("registry.toml");

/// Dotfile entry in the registry.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct RegistryEntry {
    /// Unique name of dotfile bundle.
    pub name: String,

    /// Author or organization maintaining the bundle.
    pub author: String,

    /// URL of remote repository.
    pub repository: String,

    /// Default branch to install from.
    pub branch: String,

    /// Bundle publishes hosted releases.
    #[serde(default)]
    pub has_releases: bool,

    /// One sentence description.
    #[serde(default)]
    pub description: String,
}

impl RegistryEntry {
    /// Extract `owner/repo` slug from repository URL.
    ///
    /// Returns `None` if URL does not contain at least an owner and a
    /// repository name.
    pub fn slug(&self) -> Option<String> {
        repository_slug(&self.repository)
    }
}

/// Extract `owner/repo` slug from a repository URL or slug.
///
/// Accepts `https://host/owner/repo(.git)`, `git@host:owner/repo(.git)`, or
/// a bare `owner/repo`.
pub fn repository_slug(repository: impl AsRef<str>) -> Option<String> {
    let trimmed = repository.as_ref().trim().trim_end_matches('/');
    let trimmed = trimmed.strip_suffix(".git").unwrap_or(trimmed);
    let path = match trimmed.split_once("://") {
        Some((_, rest)) => rest.split_once('/').map(|(_, path)| path)?,
        None => match trimmed.split_once(':') {
            Some((_, path)) => path,
            None => trimmed,
        },
    };

    let mut segments = path.rsplit('/').filter(|segment| !segment.is_empty());
    let repo = segments.next()?;
    let owner = segments.next()?;

    Some(format!("{owner}/{repo}"))
}

/// Immutable table of registry entries.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct Registry {
    entries: Vec<RegistryEntry>,
}

impl Registry {
    /// Construct registry from a listing of entries.
    ///
    /// Later entries replace earlier entries with the same name, compared
    /// case-insensitively.
    pub fn new(entries: impl IntoIterator<Item = RegistryEntry>) -> Self {
        let mut table: Vec<RegistryEntry> = Vec::new();
        for entry in entries {
            match table
                .iter_mut()
                .find(|current| current.name.eq_ignore_ascii_case(&entry.name))
            {
                Some(current) => *current = entry,
                None => table.push(entry),
            }
        }

        Self { entries: table }
    }

    /// Load built-in registry table.
    ///
    /// # Errors
    ///
    /// - Return [`RegistryError::Deserialize`] if the embedded table is
    ///   malformed.
    pub fn builtin() -> Result<Self> {
        BUILTIN_REGISTRY.parse()
    }

    /// Extend registry with extra entries.
    pub fn extended_with(self, extra: impl IntoIterator<Item = RegistryEntry>) -> Self {
        Self::new(self.entries.into_iter().chain(extra))
    }

    /// Lookup entry by name, case-insensitive.
    ///
    /// # Errors
    ///
    /// - Return [`RegistryError::NotFound`] if no entry matches.
    pub fn get(&self, name: impl AsRef<str>) -> Result<RegistryEntry> {
        self.entries
            .iter()
            .find(|entry| entry.name.eq_ignore_ascii_case(name.as_ref()))
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(name.as_ref().to_string()))
    }

    /// Read-only iterator over all entries.
    pub fn iter(&self) -> impl Iterator<Item = &RegistryEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromStr for Registry {
    type Err = RegistryError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        #[derive(Deserialize)]
        struct Layout {
            #[serde(rename = "dotfile", default)]
            dotfiles: Vec<RegistryEntry>,
        }

        let layout: Layout = toml::de::from_str(data)?;
        Ok(Self::new(layout.dotfiles))
    }
}

/// Registry error types.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// No entry matches requested name.
    #[error("dotfile {0:?} not found in registry")]
    NotFound(String),

    /// Registry table cannot be parsed.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),
}

/// Friendly result alias :3
type Result<T, E = RegistryError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use simple_test_case::test_case;

    fn entry(name: &str, branch: &str) -> RegistryEntry {
        RegistryEntry {
            name: name.into(),
            author: "blah".into(),
            repository: format!("https://github.com/blah/{name}"),
            branch: branch.into(),
            has_releases: false,
            description: "blah blah blah".into(),
        }
    }

    #[test]
    fn builtin_registry_parses() -> anyhow::Result<()> {
        let registry = Registry::builtin()?;
        assert_eq!(registry.len(), 7);

        let entry = registry.get("ML4W-Dotfiles")?;
        assert!(entry.has_releases);
        assert_eq!(entry.slug(), Some("mylinuxforwork/dotfiles".into()));

        Ok(())
    }

    #[test]
    fn lookup_is_case_insensitive() -> anyhow::Result<()> {
        let registry = Registry::new([entry("HyDE", "master")]);
        assert_eq!(registry.get("hyde")?.name, "HyDE");
        Ok(())
    }

    #[test]
    fn lookup_unknown_name_is_not_found() {
        let registry = Registry::new([entry("HyDE", "master")]);
        assert!(matches!(
            registry.get("nope"),
            Err(RegistryError::NotFound(name)) if name == "nope"
        ));
    }

    #[test]
    fn lookup_returns_independent_copy() -> anyhow::Result<()> {
        let registry = Registry::new([entry("HyDE", "master")]);

        let mut copy = registry.get("HyDE")?;
        copy.branch = "testing".into();

        assert_eq!(registry.get("HyDE")?.branch, "master");
        Ok(())
    }

    #[test]
    fn extra_entries_replace_builtin_by_name() -> anyhow::Result<()> {
        let registry = Registry::new([entry("HyDE", "master"), entry("foo", "main")])
            .extended_with([entry("hyde", "dev")]);

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get("HyDE")?.branch, "dev");
        Ok(())
    }

    #[test_case("https://github.com/end-4/dots-hyprland", Some("end-4/dots-hyprland"); "https url")]
    #[test_case("https://github.com/end-4/dots-hyprland.git/", Some("end-4/dots-hyprland"); "git suffix")]
    #[test_case("git@github.com:hyprwm/Hyprland.git", Some("hyprwm/Hyprland"); "scp url")]
    #[test_case("hyprwm/hyprpaper", Some("hyprwm/hyprpaper"); "bare slug")]
    #[test_case("https://github.com/", None; "no owner")]
    #[test]
    fn repository_slug_extraction(url: &str, expect: Option<&str>) {
        assert_eq!(repository_slug(url), expect.map(ToString::to_string));
    }
}
