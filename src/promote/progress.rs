//! Progress callback trait for interface-agnostic updates
//!
//! Lets the CLI (or anything else driving a reconcile) observe the engine
//! as it moves through its phases.

use crate::types::PullRequest;
use async_trait::async_trait;
use std::fmt;

/// Engine phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Cloning source and target repositories
    Provisioning,
    /// Looking up the open pull request
    ResolvingRequest,
    /// Copying paths and committing per operation
    Copying,
    /// Creating or editing the pull request
    SyncingRequest,
    /// Reconcile complete
    Complete,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Provisioning => write!(f, "Cloning environments"),
            Self::ResolvingRequest => write!(f, "Resolving pull request"),
            Self::Copying => write!(f, "Copying"),
            Self::SyncingRequest => write!(f, "Syncing pull request"),
            Self::Complete => write!(f, "Done"),
        }
    }
}

/// What a copy operation did to the promotion branch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationStatus {
    /// Target already matched the source
    Unchanged,
    /// A commit was created and pushed
    Pushed {
        /// New commit hash
        commit: String,
    },
}

/// Progress callback trait
///
/// Implement this trait to receive progress updates during a promotion.
#[async_trait]
pub trait ProgressCallback: Send + Sync {
    /// Called when entering a new phase
    async fn on_phase(&self, phase: Phase);

    /// Called once the promotion branch is known
    async fn on_branch(&self, branch: &str, resumed: bool);

    /// Called after each copy operation
    async fn on_operation(&self, name: &str, status: OperationStatus);

    /// Called when a PR is created
    async fn on_pr_created(&self, pr: &PullRequest);

    /// Called when a PR is updated
    async fn on_pr_updated(&self, pr: &PullRequest);

    /// Called with a general status message
    async fn on_message(&self, message: &str);
}

/// No-op progress callback for testing or when progress isn't needed
pub struct NoopProgress;

#[async_trait]
impl ProgressCallback for NoopProgress {
    async fn on_phase(&self, _phase: Phase) {}
    async fn on_branch(&self, _branch: &str, _resumed: bool) {}
    async fn on_operation(&self, _name: &str, _status: OperationStatus) {}
    async fn on_pr_created(&self, _pr: &PullRequest) {}
    async fn on_pr_updated(&self, _pr: &PullRequest) {}
    async fn on_message(&self, _message: &str) {}
}
