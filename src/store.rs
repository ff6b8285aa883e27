// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Metadata store management.
//!
//! Hyprrelease records what it resolved and installed into small plain text
//! __metadata files__, so other tools (status bars, fetch scripts, etc.) can
//! read them without talking to hyprrelease at all.
//!
//! # Metadata File Layout
//!
//! A metadata file is a flat list of `KEY="value"` lines below a comment
//! header. Blank lines and lines starting with `#` are ignored:
//!
//! ```text
//! # Hyprland Release Metadata
//! HYPRLAND_DOTFILES_NAME="HyDE"
//! HYPRLAND_VERSION_MAIN="v25.9.1"
//! ```
//!
//! There are two well-known metadata files: the __release identity__ of the
//! installed dotfiles, and the versions of __system components__. Each one
//! can live at several paths tried in a fixed preference order, user-scoped
//! path first, system-scoped path as fallback. Every write replaces the
//! whole file, no merging is ever performed.

use indexmap::IndexMap;
use serde::Serialize;
use std::{
    fs::{create_dir_all, read_to_string, write},
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument};

/// Ordered set of named string fields written as one record.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct MetadataSnapshot {
    title: String,
    fields: Vec<(String, String)>,
}

impl MetadataSnapshot {
    /// Construct new empty snapshot with comment header title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            fields: Vec::new(),
        }
    }

    /// Append field to snapshot.
    ///
    /// Replaces the value of an existing field with the same key, keeping its
    /// original position.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(current, _)| *current == key) {
            Some((_, current)) => *current = value,
            None => self.fields.push((key, value)),
        }
    }

    /// Builder flavor of [`MetadataSnapshot::insert`].
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: impl AsRef<str>) -> Option<&str> {
        self.fields
            .iter()
            .find(|(current, _)| current == key.as_ref())
            .map(|(_, value)| value.as_str())
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// Serialize snapshot into metadata file layout.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(format!("# {}\n", self.title).as_str());
        for (key, value) in &self.fields {
            // INVARIANT: One field per line, so newlines cannot survive.
            let value = value.replace(['\r', '\n'], " ");
            out.push_str(format!("{key}=\"{value}\"\n").as_str());
        }

        out
    }
}

/// Parse metadata file content into key-value mapping.
///
/// Lines that do not parse are skipped silently.
pub fn parse_metadata(content: impl AsRef<str>) -> IndexMap<String, String> {
    let mut map = IndexMap::new();
    for line in content.as_ref().lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((key, value)) = line.split_once('=') else {
            debug!("skip malformed metadata line {line:?}");
            continue;
        };

        let key = key.trim().trim_matches('"').trim();
        if key.is_empty() {
            continue;
        }

        let value = value.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|inner| inner.strip_suffix('"'))
            .unwrap_or(value);

        map.insert(key.to_string(), value.to_string());
    }

    map
}

/// Read metadata file at target path.
///
/// Absent file is not an error, `None` is returned so caller can decide how
/// significant that is.
///
/// # Errors
///
/// - Return [`StoreError::Read`] if file exists but cannot be read.
pub fn read_snapshot(path: impl AsRef<Path>) -> Result<Option<IndexMap<String, String>>> {
    match read_to_string(path.as_ref()) {
        Ok(content) => Ok(Some(parse_metadata(content))),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(StoreError::Read {
            source: err,
            path: path.as_ref().to_path_buf(),
        }),
    }
}

/// Metadata file with fixed preference order of candidate paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataStore {
    paths: Vec<PathBuf>,
}

impl MetadataStore {
    /// Construct new metadata store.
    ///
    /// Paths are tried in given order.
    pub fn new(paths: impl IntoIterator<Item = impl Into<PathBuf>>) -> Self {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }

    /// Write snapshot to first writable path.
    ///
    /// Creates parent directories as needed. Returns path that was written.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::Persistence`] if no candidate path is writable.
    #[instrument(skip(self, snapshot), level = "debug")]
    pub fn write_snapshot(&self, snapshot: &MetadataSnapshot) -> Result<PathBuf> {
        let content = snapshot.render();
        for path in &self.paths {
            let attempt = path
                .parent()
                .map_or(Ok(()), create_dir_all)
                .and_then(|_| write(path, content.as_bytes()));

            match attempt {
                Ok(()) => {
                    info!("metadata written to {}", path.display());
                    return Ok(path.clone());
                }
                Err(err) => debug!("cannot write metadata to {}: {err}", path.display()),
            }
        }

        Err(StoreError::Persistence {
            paths: self.paths.clone(),
        })
    }

    /// Read first existing metadata file in preference order.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::Read`] if an existing file cannot be read.
    pub fn read(&self) -> Result<Option<IndexMap<String, String>>> {
        for path in &self.paths {
            if let Some(map) = read_snapshot(path)? {
                return Ok(Some(map));
            }
        }

        Ok(None)
    }
}

/// Combined JSON view over both well-known metadata files.
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetadataExport {
    pub release_meta: IndexMap<String, String>,
    pub system_meta: IndexMap<String, String>,
}

/// Merge release identity and system component metadata into JSON.
///
/// Missing metadata files show up as empty objects.
///
/// # Errors
///
/// - Return [`StoreError::Read`] if an existing file cannot be read.
/// - Return [`StoreError::Json`] if JSON encoding fails.
pub fn export_json(release: &MetadataStore, system: &MetadataStore) -> Result<String> {
    let export = MetadataExport {
        release_meta: release.read()?.unwrap_or_default(),
        system_meta: system.read()?.unwrap_or_default(),
    };

    Ok(serde_json::to_string_pretty(&export)?)
}

/// All possible error types for metadata store interaction.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No candidate path could be written.
    #[error("failed to write metadata to any of {paths:?}")]
    Persistence { paths: Vec<PathBuf> },

    /// Existing metadata file cannot be read.
    #[error("failed to read metadata from {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// JSON export cannot be encoded.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Friendly result alias :3
type Result<T, E = StoreError> = std::result::Result<T, E>;
