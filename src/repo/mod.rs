//! Ephemeral git workspaces
//!
//! A [`GitWorkspace`] is a full clone of one Environment's repository in a
//! private temporary directory. The directory is removed when the workspace
//! is dropped, so every exit path of a reconcile attempt cleans up.
//!
//! libgit2 calls block the calling thread, so async callers go through
//! [`blocking`] and [`GitWorkspace::run_blocking`] to keep the executor (and
//! the reconcile timeout) responsive while a remote stalls.

use crate::auth::ResolvedSource;
use crate::error::{Error, Result};
use crate::types::ObjectMeta;
use git2::build::{CheckoutBuilder, RepoBuilder};
use git2::{
    BranchType, FetchOptions, IndexAddOption, PushOptions, RemoteCallbacks, Repository, Signature,
    StatusOptions,
};
use std::path::Path;
use tempfile::TempDir;
use tracing::debug;

/// Remote name every workspace is cloned with
pub const REMOTE: &str = "origin";

/// Commit author identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitIdentity {
    /// Author/committer name
    pub name: String,
    /// Author/committer email
    pub email: String,
}

/// Run blocking git or filesystem work on tokio's blocking pool
///
/// Dropping the returned future does not stop `work`; it runs to completion
/// and its result, workspace included, is dropped on that thread.
pub async fn blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| Error::Internal(format!("blocking task failed: {e}")))?
}

/// Build transport callbacks carrying credentials and host key policy
fn remote_callbacks(source: &ResolvedSource) -> RemoteCallbacks<'_> {
    let mut callbacks = RemoteCallbacks::new();
    // libgit2 re-invokes the credential callback after a rejected attempt
    let mut attempts = 0_u8;
    callbacks.credentials(move |_url, username_from_url, allowed| {
        attempts += 1;
        if attempts > 3 {
            return Err(git2::Error::from_str("authentication rejected by remote"));
        }
        source.credentials.to_cred(username_from_url, allowed)
    });
    callbacks.certificate_check(move |cert, host| source.host_keys.check(cert, host));
    callbacks
}

fn fetch_options(source: &ResolvedSource) -> FetchOptions<'_> {
    let mut options = FetchOptions::new();
    options.remote_callbacks(remote_callbacks(source));
    options
}

/// A cloned repository living in its own temporary directory
pub struct GitWorkspace {
    repo: Repository,
    source: ResolvedSource,
    // Dropped after `repo`
    dir: TempDir,
}

impl std::fmt::Debug for GitWorkspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitWorkspace")
            .field("path", &self.dir.path())
            .field("url", &self.source.url)
            .finish_non_exhaustive()
    }
}

impl GitWorkspace {
    /// Clone `source` at `branch` into a fresh directory under `parent`
    ///
    /// The directory name is prefixed with the owning object's identity so
    /// stray workspaces can be traced back to their reconcile.
    pub fn provision(
        source: ResolvedSource,
        branch: &str,
        parent: &Path,
        owner: &ObjectMeta,
    ) -> Result<Self> {
        std::fs::create_dir_all(parent)?;
        let dir = tempfile::Builder::new()
            .prefix(&format!("{}-{}-", owner.namespace, owner.name))
            .tempdir_in(parent)?;

        debug!(url = %source.url, branch, path = %dir.path().display(), "Cloning");

        let repo = RepoBuilder::new()
            .branch(branch)
            .fetch_options(fetch_options(&source))
            .clone(&source.url, dir.path())
            .map_err(|e| Error::Clone {
                url: source.url.clone(),
                message: e.message().to_string(),
            })?;

        Ok(Self { repo, source, dir })
    }

    /// [`Self::provision`] on the blocking pool
    pub async fn spawn_provision(
        source: ResolvedSource,
        branch: &str,
        parent: &Path,
        owner: &ObjectMeta,
    ) -> Result<Self> {
        let branch = branch.to_string();
        let parent = parent.to_path_buf();
        let owner = owner.clone();
        blocking(move || Self::provision(source, &branch, &parent, &owner)).await
    }

    /// Run `work` against the workspace on the blocking pool, handing it back
    ///
    /// On error the workspace is dropped, removing its directory.
    pub async fn run_blocking<T, F>(self, work: F) -> Result<(Self, T)>
    where
        F: FnOnce(&Self) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        blocking(move || {
            let value = work(&self)?;
            Ok((self, value))
        })
        .await
    }

    /// Working tree root
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Full hex hash of HEAD
    pub fn head_commit(&self) -> Result<String> {
        let commit = self.repo.head()?.peel_to_commit()?;
        Ok(commit.id().to_string())
    }

    /// Short name of the checked-out branch
    pub fn current_branch(&self) -> Result<String> {
        let head = self.repo.head()?;
        head.shorthand()
            .map(ToString::to_string)
            .ok_or_else(|| Error::Internal("HEAD is not a named branch".into()))
    }

    /// Fetch every remote branch into `refs/remotes/origin/*`
    pub fn fetch_all(&self) -> Result<()> {
        let mut remote = self.repo.find_remote(REMOTE)?;
        let mut options = fetch_options(&self.source);
        remote.fetch(
            &[format!("+refs/heads/*:refs/remotes/{REMOTE}/*")],
            Some(&mut options),
            None,
        )?;
        Ok(())
    }

    /// Check out `branch` at its remote tip, discarding local state
    pub fn force_checkout_remote_branch(&self, branch: &str) -> Result<()> {
        let remote_ref = format!("{REMOTE}/{branch}");
        let target = self
            .repo
            .find_branch(&remote_ref, BranchType::Remote)?
            .get()
            .peel_to_commit()?;

        self.repo.branch(branch, &target, true)?;
        self.checkout_branch(branch)?;
        debug!(branch, commit = %target.id(), "Checked out existing branch");
        Ok(())
    }

    /// Create `branch` at HEAD and check it out
    pub fn create_branch(&self, branch: &str) -> Result<()> {
        let head = self.repo.head()?.peel_to_commit()?;
        self.repo.branch(branch, &head, false)?;
        self.checkout_branch(branch)?;
        debug!(branch, commit = %head.id(), "Created branch");
        Ok(())
    }

    fn checkout_branch(&self, branch: &str) -> Result<()> {
        let refname = format!("refs/heads/{branch}");
        let object = self.repo.revparse_single(&refname)?;
        self.repo
            .checkout_tree(&object, Some(CheckoutBuilder::new().force()))?;
        self.repo.set_head(&refname)?;
        Ok(())
    }

    /// Whether the working tree differs from HEAD (untracked files included)
    pub fn is_dirty(&self) -> Result<bool> {
        let mut options = StatusOptions::new();
        options
            .include_untracked(true)
            .recurse_untracked_dirs(true)
            .include_ignored(false);
        let statuses = self.repo.statuses(Some(&mut options))?;
        Ok(!statuses.is_empty())
    }

    /// Stage every change and commit it on the current branch
    pub fn commit_all(&self, message: &str, identity: &CommitIdentity) -> Result<String> {
        self.commit_all_inner(message, identity)
            .map_err(|e| Error::Commit(e.message().to_string()))
    }

    fn commit_all_inner(
        &self,
        message: &str,
        identity: &CommitIdentity,
    ) -> std::result::Result<String, git2::Error> {
        let mut index = self.repo.index()?;
        index.add_all(["*"], IndexAddOption::DEFAULT, None)?;
        index.update_all(["*"], None)?;
        index.write()?;

        let tree = self.repo.find_tree(index.write_tree()?)?;
        let parent = self.repo.head()?.peel_to_commit()?;
        let signature = Signature::now(&identity.name, &identity.email)?;
        let oid = self.repo.commit(
            Some("HEAD"),
            &signature,
            &signature,
            message,
            &tree,
            &[&parent],
        )?;
        Ok(oid.to_string())
    }

    /// Push the current branch to the same-named remote branch
    pub fn push_current_branch(&self) -> Result<()> {
        let branch = self.current_branch()?;
        let refspec = format!("refs/heads/{branch}:refs/heads/{branch}");
        let mut remote = self
            .repo
            .find_remote(REMOTE)
            .map_err(|e| Error::Push(e.message().to_string()))?;

        let mut rejection: Option<String> = None;
        {
            let mut callbacks = remote_callbacks(&self.source);
            callbacks.push_update_reference(|refname, status| {
                if let Some(msg) = status {
                    rejection = Some(format!("{refname}: {msg}"));
                }
                Ok(())
            });
            let mut options = PushOptions::new();
            options.remote_callbacks(callbacks);
            remote
                .push(&[refspec.as_str()], Some(&mut options))
                .map_err(|e| Error::Push(e.message().to_string()))?;
        }

        if let Some(reason) = rejection {
            return Err(Error::Push(reason));
        }
        debug!(branch = %branch, "Pushed");
        Ok(())
    }

    /// Remove the workspace directory now, reporting failures
    pub fn release(self) -> Result<()> {
        let Self { repo, dir, .. } = self;
        drop(repo);
        dir.close()?;
        Ok(())
    }
}
