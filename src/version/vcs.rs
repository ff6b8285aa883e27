// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Version control queries.
//!
//! Everything hyprrelease wants to know about a working copy, or about a
//! remote repository, is asked through the [`VersionControl`] trait. The
//! default implementation talks to libgit2 on a blocking thread, bounded by
//! a timeout so a hung network connection cannot stall an audit.

use async_trait::async_trait;
use git2::{
    BranchType, DescribeFormatOptions, DescribeOptions, Direction, Oid, Reference, Remote,
    Repository,
};
use std::{
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::{debug, instrument};

/// Layer of indirection for version control queries.
#[async_trait]
pub trait VersionControl: Send + Sync {
    /// Describe HEAD through nearest tag.
    ///
    /// Yields nearest tag, commit distance, and abbreviated hash, e.g.,
    /// `v2.0.5-3-gabc1234`. Falls back to bare abbreviated hash when no tags
    /// exist.
    async fn describe(&self, path: &Path) -> Result<String>;

    /// Name of currently checked out branch.
    async fn current_branch(&self, path: &Path) -> Result<String>;

    /// Count commits reachable from remote tracking branch but not from HEAD.
    ///
    /// Uses upstream of current branch, or `origin/<fallback_branch>` if no
    /// upstream is configured.
    async fn commits_behind(&self, path: &Path, fallback_branch: &str) -> Result<usize>;

    /// List tag reference names advertised by remote repository.
    async fn list_remote_tags(&self, url: &str) -> Result<Vec<String>>;

    /// Fetch from origin of working copy.
    async fn fetch(&self, path: &Path) -> Result<()>;
}

/// Version control through libgit2.
#[derive(Debug, Clone)]
pub struct Git2Vcs {
    timeout: Duration,
}

impl Git2Vcs {
    /// Construct new libgit2 backend with timeout for each query.
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    async fn blocking<T, F>(&self, query: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        let task = tokio::task::spawn_blocking(query);
        match tokio::time::timeout(self.timeout, task).await {
            Ok(joined) => joined?,
            Err(_) => Err(VcsError::Timeout(self.timeout)),
        }
    }
}

impl Default for Git2Vcs {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

#[async_trait]
impl VersionControl for Git2Vcs {
    #[instrument(skip(self), level = "debug")]
    async fn describe(&self, path: &Path) -> Result<String> {
        let path = path.to_path_buf();
        self.blocking(move || describe_head(&path)).await
    }

    async fn current_branch(&self, path: &Path) -> Result<String> {
        let path = path.to_path_buf();
        self.blocking(move || {
            let repository = open(&path)?;
            let head = repository.head()?;
            Ok(head.shorthand().unwrap_or("HEAD").to_string())
        })
        .await
    }

    #[instrument(skip(self), level = "debug")]
    async fn commits_behind(&self, path: &Path, fallback_branch: &str) -> Result<usize> {
        let path = path.to_path_buf();
        let fallback = fallback_branch.to_string();
        self.blocking(move || {
            let repository = open(&path)?;
            let head = repository.head()?;
            let local = head.target().ok_or(VcsError::UnbornHead)?;
            let upstream = upstream_target(&repository, &head, &fallback)?;
            let (_, behind) = repository.graph_ahead_behind(local, upstream)?;
            Ok(behind)
        })
        .await
    }

    #[instrument(skip(self), level = "debug")]
    async fn list_remote_tags(&self, url: &str) -> Result<Vec<String>> {
        let url = url.to_string();
        self.blocking(move || {
            let mut remote = Remote::create_detached(url.as_str())?;
            remote.connect(Direction::Fetch)?;
            let tags = remote
                .list()?
                .iter()
                .map(|head| head.name().to_string())
                .filter(|name| name.starts_with("refs/tags/"))
                .collect::<Vec<_>>();
            remote.disconnect()?;
            debug!("remote {url} advertises {} tags", tags.len());
            Ok(tags)
        })
        .await
    }

    #[instrument(skip(self), level = "debug")]
    async fn fetch(&self, path: &Path) -> Result<()> {
        let path = path.to_path_buf();
        self.blocking(move || {
            let repository = open(&path)?;
            let mut remote = repository.find_remote("origin")?;
            remote.fetch(&[] as &[&str], None, None)?;
            Ok(())
        })
        .await
    }
}

fn open(path: &PathBuf) -> Result<Repository> {
    Repository::open(path).map_err(|source| VcsError::Open {
        source,
        path: path.clone(),
    })
}

fn describe_head(path: &PathBuf) -> Result<String> {
    let repository = open(path)?;
    let mut opts = DescribeOptions::new();
    opts.describe_tags().show_commit_oid_as_fallback(true);
    let mut format = DescribeFormatOptions::new();
    format.abbreviated_size(7);

    let described = repository.describe(&opts)?.format(Some(&format))?;
    Ok(described)
}

fn upstream_target(repository: &Repository, head: &Reference<'_>, fallback: &str) -> Result<Oid> {
    if head.is_branch() {
        let upstream = head
            .shorthand()
            .and_then(|name| repository.find_branch(name, BranchType::Local).ok())
            .and_then(|branch| branch.upstream().ok())
            .and_then(|upstream| upstream.get().target());
        if let Some(oid) = upstream {
            return Ok(oid);
        }
    }

    repository
        .refname_to_id(format!("refs/remotes/origin/{fallback}").as_str())
        .map_err(|_| VcsError::NoUpstream(fallback.to_string()))
}

/// Version control error types.
#[derive(Debug, thiserror::Error)]
pub enum VcsError {
    /// Working copy is not a repository.
    #[error("failed to open repository at {:?}", path.display())]
    Open {
        #[source]
        source: git2::Error,
        path: PathBuf,
    },

    /// HEAD does not point at any commit yet.
    #[error("HEAD of working copy has no commits")]
    UnbornHead,

    /// No remote tracking branch to compare against.
    #[error("no upstream branch, and origin/{0} does not exist")]
    NoUpstream(String),

    /// Query took too long.
    #[error("version control query timed out after {0:?}")]
    Timeout(Duration),

    /// Blocking worker died.
    #[error(transparent)]
    Join(#[from] tokio::task::JoinError),

    /// Operations from libgit2 fail.
    #[error(transparent)]
    Git2(#[from] git2::Error),
}

/// Friendly result alias :3
type Result<T, E = VcsError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use git2::{Signature, Time};
    use pretty_assertions::assert_eq;
    use std::fs::write;

    struct Fixture {
        dir: tempfile::TempDir,
        repository: Repository,
    }

    impl Fixture {
        fn new() -> anyhow::Result<Self> {
            let dir = tempfile::tempdir()?;
            let mut opts = git2::RepositoryInitOptions::new();
            opts.initial_head("main");
            let repository = Repository::init_opts(dir.path(), &opts)?;
            Ok(Self { dir, repository })
        }

        fn commit(&self, filename: &str, contents: &str) -> anyhow::Result<Oid> {
            write(self.dir.path().join(filename), contents)?;
            let mut index = self.repository.index()?;
            index.add_path(Path::new(filename))?;
            index.write()?;
            let tree = self.repository.find_tree(index.write_tree()?)?;

            // INVARIANT: Always provide valid signature, CI/CD lacks one.
            let signature = Signature::new("John Doe", "john@doe.com", &Time::new(0, 0))?;
            let parent = match self.repository.head() {
                Ok(head) => Some(head.peel_to_commit()?),
                Err(_) => None,
            };
            let parents = parent.iter().collect::<Vec<_>>();

            Ok(self.repository.commit(
                Some("HEAD"),
                &signature,
                &signature,
                format!("chore: add {filename}").as_str(),
                &tree,
                &parents,
            )?)
        }

        fn tag(&self, name: &str) -> anyhow::Result<()> {
            let head = self.repository.head()?.peel_to_commit()?;
            self.repository.tag_lightweight(name, head.as_object(), false)?;
            Ok(())
        }
    }

    #[tokio::test]
    async fn describe_with_tag_and_distance() -> anyhow::Result<()> {
        let fixture = Fixture::new()?;
        fixture.commit("hyprland.conf", "monitor=,preferred,auto,1")?;
        fixture.tag("v2.0.5")?;
        fixture.commit("keybinds.conf", "bind = SUPER, Q, exec, kitty")?;
        let head = fixture.commit("rules.conf", "windowrule = float, pavucontrol")?;

        let result = Git2Vcs::default().describe(fixture.dir.path()).await?;
        let expect = format!("v2.0.5-2-g{}", &head.to_string()[..7]);

        assert_eq!(result, expect);
        Ok(())
    }

    #[tokio::test]
    async fn describe_without_tags_is_abbreviated_hash() -> anyhow::Result<()> {
        let fixture = Fixture::new()?;
        let head = fixture.commit("hyprland.conf", "monitor=,preferred,auto,1")?;

        let result = Git2Vcs::default().describe(fixture.dir.path()).await?;

        assert_eq!(result, head.to_string()[..7].to_string());
        Ok(())
    }

    #[tokio::test]
    async fn current_branch_is_head_shorthand() -> anyhow::Result<()> {
        let fixture = Fixture::new()?;
        fixture.commit("hyprland.conf", "monitor=,preferred,auto,1")?;

        let result = Git2Vcs::default().current_branch(fixture.dir.path()).await?;

        assert_eq!(result, "main");
        Ok(())
    }

    #[tokio::test]
    async fn commits_behind_fallback_remote_branch() -> anyhow::Result<()> {
        let fixture = Fixture::new()?;
        let base = fixture.commit("hyprland.conf", "monitor=,preferred,auto,1")?;
        fixture.commit("keybinds.conf", "bind = SUPER, Q, exec, kitty")?;
        let remote_tip = fixture.commit("rules.conf", "windowrule = float, pavucontrol")?;

        // INVARIANT: Pretend origin moved ahead by two commits.
        fixture
            .repository
            .reference("refs/remotes/origin/main", remote_tip, true, "fake remote")?;
        fixture
            .repository
            .reference("refs/heads/main", base, true, "rewind local")?;

        let result = Git2Vcs::default()
            .commits_behind(fixture.dir.path(), "main")
            .await?;

        assert_eq!(result, 2);
        Ok(())
    }

    #[tokio::test]
    async fn commits_behind_without_remote_is_error() -> anyhow::Result<()> {
        let fixture = Fixture::new()?;
        fixture.commit("hyprland.conf", "monitor=,preferred,auto,1")?;

        let result = Git2Vcs::default()
            .commits_behind(fixture.dir.path(), "main")
            .await;

        assert!(matches!(result, Err(VcsError::NoUpstream(branch)) if branch == "main"));
        Ok(())
    }

    #[tokio::test]
    async fn describe_non_repository_fails() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let result = Git2Vcs::default().describe(dir.path()).await;
        assert!(matches!(result, Err(VcsError::Open { .. })));
        Ok(())
    }
}
