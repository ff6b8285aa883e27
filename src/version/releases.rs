// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Hosted release queries.
//!
//! A __hosted release__ is a version entry published through a code hosting
//! platform's release feature, which is distinct from a raw Git tag. Only
//! GitHub is supported for now.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Release entry published on code hosting platform.
#[derive(Default, Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct HostedRelease {
    /// Tag the release was cut from.
    #[serde(rename = "tag_name")]
    pub tag: String,

    /// Human readable title.
    #[serde(default)]
    pub name: Option<String>,

    /// Release notes.
    #[serde(default)]
    pub body: Option<String>,

    /// RFC 3339 publication timestamp.
    #[serde(default)]
    pub published_at: Option<String>,
}

/// Source of hosted releases.
#[async_trait]
pub trait HostedReleases: Send + Sync {
    /// List releases of repository, newest first, capped to `limit` entries.
    async fn list_releases(&self, slug: &str, limit: usize) -> Result<Vec<HostedRelease>>;

    /// Tag of newest release, if any.
    async fn latest_tag(&self, slug: &str) -> Result<Option<String>> {
        Ok(self
            .list_releases(slug, 1)
            .await?
            .into_iter()
            .next()
            .map(|release| release.tag))
    }
}

/// Hosted releases through GitHub REST API.
#[derive(Debug, Clone)]
pub struct GitHubReleases {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl GitHubReleases {
    /// Construct new GitHub release source against target API base URL.
    ///
    /// # Errors
    ///
    /// - Return [`ReleaseError::Network`] if HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("hyprrelease/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
        })
    }

    /// Authenticate requests with API token to lift rate limits.
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|token| !token.trim().is_empty());
        self
    }
}

#[async_trait]
impl HostedReleases for GitHubReleases {
    async fn list_releases(&self, slug: &str, limit: usize) -> Result<Vec<HostedRelease>> {
        let url = format!(
            "{}/repos/{}/releases?per_page={}",
            self.base_url,
            slug,
            limit.max(1)
        );
        debug!("query hosted releases at {url}");

        let mut request = self
            .client
            .get(&url)
            .header("Accept", "application/vnd.github+json");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ReleaseError::NotFound(slug.to_string()));
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS
            || status == reqwest::StatusCode::FORBIDDEN
        {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.parse().ok());
            return Err(ReleaseError::RateLimited {
                retry_after_secs: retry_after,
            });
        }

        if !status.is_success() {
            warn!("GitHub API returned status {status}: {url}");
            return Err(ReleaseError::InvalidResponse(format!(
                "unexpected status: {status}"
            )));
        }

        let mut releases: Vec<HostedRelease> = response.json().await.map_err(|err| {
            warn!("failed to parse GitHub releases response: {err}");
            ReleaseError::InvalidResponse(err.to_string())
        })?;

        // INVARIANT: Never hand back more than asked for.
        releases.truncate(limit);

        Ok(releases)
    }
}

/// Hosted release query error types.
#[derive(Debug, thiserror::Error)]
pub enum ReleaseError {
    /// Request could not be sent or response could not be received.
    #[error(transparent)]
    Network(#[from] reqwest::Error),

    /// Repository does not exist.
    #[error("repository {0:?} not found")]
    NotFound(String),

    /// API refused request due to rate limiting.
    #[error("rate limited, retry after {retry_after_secs:?} seconds")]
    RateLimited { retry_after_secs: Option<u64> },

    /// API answered with something unexpected.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Friendly result alias :3
type Result<T, E = ReleaseError> = std::result::Result<T, E>;
