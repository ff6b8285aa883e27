// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Model artifact downloads.
//!
//! Model artifacts are large, and a truncated or tampered one makes the local
//! runner produce garbage or worse. Every download is verified against the
//! SHA-256 checksum published next to it before it is moved into place. If
//! the checksum does not match, or cannot be fetched at all, the artifact is
//! deleted.

use crate::config::ModelSource;

use indicatif::{ProgressBar, ProgressStyle};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::{fs, io::AsyncWriteExt};
use tracing::{info, instrument, warn};

/// Outcome of fetching a model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelFetch {
    /// Model was downloaded and verified.
    Downloaded(PathBuf),

    /// Model already existed, nothing was downloaded.
    Present(PathBuf),
}

/// Download model artifact into model directory.
///
/// Existing artifacts are left alone. The artifact is streamed into a
/// `.part` file while hashed, and only renamed into place once its checksum
/// matches the published one.
///
/// # Errors
///
/// - Return [`ModelError::Integrity`] if checksum does not match, or cannot
///   be fetched. The downloaded artifact is removed.
/// - Return [`ModelError::Http`] if artifact cannot be downloaded.
/// - Return [`ModelError::Io`] if artifact cannot be written.
#[instrument(skip(client, source, bar), fields(model = %source.name), level = "debug")]
pub async fn fetch_model(
    client: &reqwest::Client,
    source: &ModelSource,
    dir: &Path,
    bar: ProgressBar,
) -> Result<ModelFetch> {
    let target = dir.join(&source.name);
    if target.exists() {
        info!("model {} already present", source.name);
        return Ok(ModelFetch::Present(target));
    }

    fs::create_dir_all(dir).await.map_err(|err| ModelError::Io {
        source: err,
        path: dir.to_path_buf(),
    })?;

    let partial = dir.join(format!("{}.part", source.name));
    let digest = match download(client, &source.url, &partial, bar).await {
        Ok(digest) => digest,
        Err(error) => {
            let _ = fs::remove_file(&partial).await;
            return Err(error);
        }
    };

    let expected = match fetch_checksum(client, &source.sha256_url).await {
        Ok(expected) => expected,
        Err(error) => {
            warn!("cannot fetch checksum of {}: {error}", source.name);
            let _ = fs::remove_file(&partial).await;
            return Err(ModelError::Integrity {
                name: source.name.clone(),
                reason: "checksum unavailable".into(),
            });
        }
    };

    if !expected.eq_ignore_ascii_case(&digest) {
        let _ = fs::remove_file(&partial).await;
        return Err(ModelError::Integrity {
            name: source.name.clone(),
            reason: format!("expected sha256 {expected}, got {digest}"),
        });
    }

    fs::rename(&partial, &target).await.map_err(|err| ModelError::Io {
        source: err,
        path: target.clone(),
    })?;
    info!("model {} verified and stored at {}", source.name, target.display());

    Ok(ModelFetch::Downloaded(target))
}

async fn download(
    client: &reqwest::Client,
    url: &str,
    path: &Path,
    bar: ProgressBar,
) -> Result<String> {
    let mut response = client.get(url).send().await?.error_for_status()?;

    let style = ProgressStyle::with_template(
        "{elapsed_precise:.green}  {msg:<50}  [{wide_bar:.yellow/blue}] {bytes}/{total_bytes}",
    )?
    .progress_chars("-Cco.");
    bar.set_style(style);
    bar.set_message(url.to_string());
    if let Some(length) = response.content_length() {
        bar.set_length(length);
    }

    let mut file = fs::File::create(path).await.map_err(|err| ModelError::Io {
        source: err,
        path: path.to_path_buf(),
    })?;
    let mut hasher = Sha256::new();

    while let Some(chunk) = response.chunk().await? {
        hasher.update(&chunk);
        file.write_all(&chunk).await.map_err(|err| ModelError::Io {
            source: err,
            path: path.to_path_buf(),
        })?;
        bar.inc(chunk.len() as u64);
    }

    file.flush().await.map_err(|err| ModelError::Io {
        source: err,
        path: path.to_path_buf(),
    })?;
    bar.finish_and_clear();

    Ok(hex::encode(hasher.finalize()))
}

async fn fetch_checksum(client: &reqwest::Client, url: &str) -> Result<String> {
    let body = client.get(url).send().await?.error_for_status()?.text().await?;

    // INVARIANT: Checksum files look like `<hex>  <filename>`.
    body.split_whitespace()
        .next()
        .filter(|digest| digest.len() == 64 && digest.chars().all(|c| c.is_ascii_hexdigit()))
        .map(ToString::to_string)
        .ok_or_else(|| ModelError::Integrity {
            name: url.to_string(),
            reason: "malformed checksum file".into(),
        })
}

/// Model download error types.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// Downloaded artifact could not be verified.
    #[error("integrity check of model {name:?} failed: {reason}")]
    Integrity { name: String, reason: String },

    /// Artifact could not be written.
    #[error("failed to write model to {:?}", path.display())]
    Io {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// HTTP request failed.
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// Style template cannot be set for progress bars.
    #[error(transparent)]
    IndicatifStyleTemplate(#[from] indicatif::style::TemplateError),
}

/// Friendly result alias :3
type Result<T, E = ModelError> = std::result::Result<T, E>;
