// src/catalog.rs

//! Git-backed catalog synchronization
//!
//! Each roster is a clone of its catalog repository under `meta/<roster>`.
//! Pulls are forced: the local checkout is a mirror, never a place for
//! hand edits — the one exception being `.cache/*`, which the cache
//! rebuild commits back upstream.

use crate::error::{Error, Result};
use git2::build::RepoBuilder;
use git2::{Cred, FetchOptions, PushOptions, RemoteCallbacks, Repository, ResetType, Signature};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Branch every roster repository is tracked on
const CATALOG_BRANCH: &str = "main";

/// Author identity for cache commits
const CACHE_COMMIT_NAME: &str = "rebuild-cache";
const CACHE_COMMIT_EMAIL: &str = "noreply@neopkg.dev";

/// Pause after each push to let the upstream settle
const PUSH_SETTLE: Duration = Duration::from_secs(3);

/// Divergence report for one roster
#[derive(Debug, Clone)]
pub struct SyncStatus {
    pub roster: String,
    pub need_sync: bool,
    pub local: String,
    pub remote: String,
    /// Set when the check itself failed (missing clone, unreachable remote)
    pub sync_err: Option<String>,
}

/// Capability interface over the catalog repository
///
/// Production wiring uses [`GitCatalog`]; tests substitute an in-memory
/// implementation.
pub trait CatalogSource {
    /// Clone the roster when `dir` does not exist yet
    fn ensure(&self, dir: &Path, url: &str) -> Result<()>;
    /// Compare local HEAD with the remote catalog branch
    fn sync_check(&self, roster: &str, dir: &Path, url: &str) -> Result<SyncStatus>;
    /// Force the local checkout to the remote catalog branch
    fn sync(&self, dir: &Path, url: &str) -> Result<()>;
    /// Commit and push `.cache/*` changes
    fn push_cache(&self, dir: &Path, url: &str) -> Result<()>;
}

/// git2-backed catalog source
pub struct GitCatalog {
    token: Option<String>,
    clone_depth: i32,
}

impl GitCatalog {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token,
            clone_depth: 1,
        }
    }

    /// Full-history clones, for local-path remotes that refuse shallow
    pub fn with_depth(token: Option<String>, clone_depth: i32) -> Self {
        Self { token, clone_depth }
    }

    fn remote_callbacks(&self) -> RemoteCallbacks<'_> {
        let mut callbacks = RemoteCallbacks::new();
        let token = self.token.clone();
        callbacks.credentials(move |_url, username_from_url, _allowed| {
            let user = username_from_url.unwrap_or("git");
            match &token {
                Some(token) => Cred::userpass_plaintext(user, token),
                None => Cred::default(),
            }
        });
        callbacks
    }

    fn fetch_options(&self, depth: i32) -> FetchOptions<'_> {
        let mut opts = FetchOptions::new();
        opts.remote_callbacks(self.remote_callbacks());
        if depth > 0 {
            opts.depth(depth);
        }
        opts
    }

    /// Hash of the remote catalog branch, via a remote ls
    fn remote_head(&self, repo: &Repository, url: &str) -> Result<git2::Oid> {
        let mut remote = repo
            .remote_anonymous(url)
            .map_err(|e| Error::SyncError(format!("remote {url}: {e}")))?;
        let connection = remote
            .connect_auth(git2::Direction::Fetch, Some(self.remote_callbacks()), None)
            .map_err(|e| Error::SyncError(format!("connect {url}: {e}")))?;
        let wanted = format!("refs/heads/{CATALOG_BRANCH}");
        let head = connection
            .list()
            .map_err(|e| Error::SyncError(format!("list {url}: {e}")))?
            .iter()
            .find(|r| r.name() == wanted)
            .map(|r| r.oid());
        head.ok_or_else(|| Error::SyncError(format!("{url} has no {wanted}")))
    }
}

impl CatalogSource for GitCatalog {
    fn ensure(&self, dir: &Path, url: &str) -> Result<()> {
        if dir.exists() {
            Repository::open(dir)
                .map_err(|e| Error::SyncError(format!("open {}: {e}", dir.display())))?;
            return Ok(());
        }
        info!("cloning {url} into {}", dir.display());
        RepoBuilder::new()
            .branch(CATALOG_BRANCH)
            .fetch_options(self.fetch_options(self.clone_depth))
            .clone(url, dir)
            .map_err(|e| Error::SyncError(format!("clone {url}: {e}")))?;
        Ok(())
    }

    fn sync_check(&self, roster: &str, dir: &Path, url: &str) -> Result<SyncStatus> {
        if !dir.exists() {
            return Ok(SyncStatus {
                roster: roster.to_string(),
                need_sync: true,
                local: String::new(),
                remote: String::new(),
                sync_err: Some(format!("{} does not exist", dir.display())),
            });
        }
        let repo = Repository::open(dir)
            .map_err(|e| Error::SyncError(format!("open {}: {e}", dir.display())))?;
        let local = match repo.head().and_then(|h| h.peel_to_commit()) {
            Ok(commit) => commit.id(),
            Err(e) => {
                warn!("{roster} head error: {e}");
                return Ok(SyncStatus {
                    roster: roster.to_string(),
                    need_sync: true,
                    local: String::new(),
                    remote: String::new(),
                    sync_err: Some(e.to_string()),
                });
            }
        };
        let remote = self.remote_head(&repo, url)?;
        let status = SyncStatus {
            roster: roster.to_string(),
            need_sync: local != remote,
            local: local.to_string(),
            remote: remote.to_string(),
            sync_err: None,
        };
        debug!(
            "{roster} need sync:{} local:{} remote:{}",
            status.need_sync, status.local, status.remote
        );
        Ok(status)
    }

    fn sync(&self, dir: &Path, url: &str) -> Result<()> {
        self.ensure(dir, url)?;
        let repo = Repository::open(dir)
            .map_err(|e| Error::SyncError(format!("open {}: {e}", dir.display())))?;

        // Drop any local modification before pulling.
        let head = repo
            .head()
            .and_then(|h| h.peel(git2::ObjectType::Commit))
            .map_err(|e| Error::SyncError(format!("head error: {e}")))?;
        repo.reset(&head, ResetType::Hard, None)
            .map_err(|e| Error::SyncError(format!("reset error: {e}")))?;

        let refspec = format!("refs/heads/{CATALOG_BRANCH}");
        let mut remote = repo
            .find_remote("origin")
            .or_else(|_| repo.remote_anonymous(url))
            .map_err(|e| Error::SyncError(format!("remote {url}: {e}")))?;
        remote
            .fetch(&[refspec.as_str()], Some(&mut self.fetch_options(0)), None)
            .map_err(|e| Error::SyncError(format!("pull error: {e}")))?;

        let fetched = repo
            .find_reference("FETCH_HEAD")
            .and_then(|r| r.peel(git2::ObjectType::Commit))
            .map_err(|e| Error::SyncError(format!("pull error: {e}")))?;
        if fetched.id() == head.id() {
            debug!("{} already up-to-date", dir.display());
            return Ok(());
        }
        repo.reference(&refspec, fetched.id(), true, "catalog sync")
            .map_err(|e| Error::SyncError(format!("pull error: {e}")))?;
        repo.set_head(&refspec)
            .map_err(|e| Error::SyncError(format!("pull error: {e}")))?;
        repo.reset(&fetched, ResetType::Hard, None)
            .map_err(|e| Error::SyncError(format!("pull error: {e}")))?;
        info!("synced {} to {}", dir.display(), fetched.id());
        Ok(())
    }

    fn push_cache(&self, dir: &Path, url: &str) -> Result<()> {
        let repo = Repository::open(dir)
            .map_err(|e| Error::PushError(format!("open {}: {e}", dir.display())))?;

        let clean = repo
            .statuses(None)
            .map(|s| s.is_empty())
            .unwrap_or(true);
        if clean {
            debug!("{} is clean, nothing to push", dir.display());
            return Ok(());
        }

        let mut index = repo
            .index()
            .map_err(|e| Error::PushError(format!("index error: {e}")))?;
        index
            .add_all([".cache"], git2::IndexAddOption::DEFAULT, None)
            .map_err(|e| Error::PushError(format!("add error: {e}")))?;
        index
            .write()
            .map_err(|e| Error::PushError(format!("index write error: {e}")))?;
        let tree_id = index
            .write_tree()
            .map_err(|e| Error::PushError(format!("tree error: {e}")))?;
        let tree = repo
            .find_tree(tree_id)
            .map_err(|e| Error::PushError(format!("tree error: {e}")))?;

        let parent = repo
            .head()
            .and_then(|h| h.peel_to_commit())
            .map_err(|e| Error::PushError(format!("head error: {e}")))?;
        let sig = Signature::now(CACHE_COMMIT_NAME, CACHE_COMMIT_EMAIL)
            .map_err(|e| Error::PushError(format!("signature error: {e}")))?;
        let commit = repo
            .commit(Some("HEAD"), &sig, &sig, "update cache", &tree, &[&parent])
            .map_err(|e| Error::PushError(format!("commit error: {e}")))?;
        info!("committed cache update {commit} in {}", dir.display());

        let mut remote = repo
            .find_remote("origin")
            .or_else(|_| repo.remote_anonymous(url))
            .map_err(|e| Error::PushError(format!("remote {url}: {e}")))?;
        let mut opts = PushOptions::new();
        opts.remote_callbacks(self.remote_callbacks());
        let refspec = format!(
            "refs/heads/{CATALOG_BRANCH}:refs/heads/{CATALOG_BRANCH}"
        );
        remote
            .push(&[refspec.as_str()], Some(&mut opts))
            .map_err(|e| Error::PushError(format!("push error: {e}")))?;
        info!("pushed cache update for {}", dir.display());
        std::thread::sleep(PUSH_SETTLE);
        Ok(())
    }
}
