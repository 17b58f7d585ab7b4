//! Promotion reconciliation engine
//!
//! Drives one attempt from readiness check to pull request sync:
//!
//! 1. both Environments must be ready, otherwise the attempt waits
//! 2. source and target are cloned into private workspaces
//! 3. under the target lock, open requests are listed and the recorded one
//!    is resumed if still open
//! 4. each copy operation is applied and, if it changed the tree, committed
//!    and pushed on its own
//! 5. the request is created or retitled when the branch moved
//!
//! Re-running an attempt with nothing left to copy produces no commits and
//! no new request.

use crate::auth::CredentialResolver;
use crate::config::Settings;
use crate::error::Result;
use crate::platform::PlatformConnector;
use crate::promote::branch::acquire_branch;
use crate::promote::copy::execute_step;
use crate::promote::ladder::{ChangeLadder, short_sha};
use crate::promote::plan::{CopyPlan, secure_join};
use crate::promote::progress::{OperationStatus, Phase, ProgressCallback};
use crate::promote::template::{Template, TemplateValues};
use crate::repo::{CommitIdentity, GitWorkspace, blocking};
use crate::store::SecretStore;
use crate::types::{Environment, Promotion, PullRequest, PullRequestEdit, SUCCEEDED_REASON};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, info, warn};

/// Status message when there is nothing to promote
pub const IN_SYNC_MESSAGE: &str = "Source and target environments are in sync, nothing to promote.";
/// Status message while a request awaits review
pub const OPEN_FOR_REVIEW_MESSAGE: &str = "A pull request is open for review.";
/// Status message after opening a request
pub const REQUEST_CREATED_MESSAGE: &str = "New Pull request created successfully";
/// Status message after adding commits to an open request
pub const REQUEST_UPDATED_MESSAGE: &str = "Pushed new commits to PR branch";

/// How an attempt ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromotionOutcome {
    /// An Environment is not ready yet; retry shortly
    AwaitingEnvironments {
        /// Name of the first Environment found not ready
        environment: String,
    },
    /// Nothing changed and no request is open
    InSync,
    /// Nothing changed; the open request is waiting for review
    OpenForReview {
        /// The open request
        request: PullRequest,
    },
    /// Commits were pushed and a new request opened
    RequestCreated {
        /// The new request
        request: PullRequest,
        /// Operations that produced commits
        promoted: Vec<String>,
    },
    /// Commits were pushed onto the open request's branch
    RequestUpdated {
        /// The updated request
        request: PullRequest,
        /// Operations that produced commits
        promoted: Vec<String>,
    },
}

impl PromotionOutcome {
    /// Whether the attempt only waited for readiness
    pub const fn is_waiting(&self) -> bool {
        matches!(self, Self::AwaitingEnvironments { .. })
    }

    /// Human-readable summary, as recorded on the Ready condition
    pub fn message(&self) -> String {
        match self {
            Self::AwaitingEnvironments { environment } => {
                format!("Waiting for environment {environment} to become ready")
            }
            Self::InSync => IN_SYNC_MESSAGE.to_string(),
            Self::OpenForReview { .. } => OPEN_FOR_REVIEW_MESSAGE.to_string(),
            Self::RequestCreated { .. } => REQUEST_CREATED_MESSAGE.to_string(),
            Self::RequestUpdated { .. } => REQUEST_UPDATED_MESSAGE.to_string(),
        }
    }

    /// Record the outcome on the Promotion's status
    ///
    /// A readiness wait leaves conditions untouched.
    pub fn apply(&self, promotion: &mut Promotion) {
        match self {
            Self::AwaitingEnvironments { .. } => {}
            Self::RequestCreated { request, .. } => {
                promotion.status.last_pull_request_number = request.number;
                promotion.status.last_pull_request_url.clone_from(&request.html_url);
                promotion.mark_ready(SUCCEEDED_REASON, &self.message());
            }
            Self::InSync | Self::OpenForReview { .. } | Self::RequestUpdated { .. } => {
                promotion.mark_ready(SUCCEEDED_REASON, &self.message());
            }
        }
    }
}

/// In-process locks serialising writers to one target branch
#[derive(Debug, Clone, Default)]
pub struct TargetLocks {
    inner: Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>,
}

impl TargetLocks {
    /// Create an empty lock table
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock key for the branch a Promotion into `target` merges into
    pub fn key(target: &Environment) -> String {
        format!(
            "{}/{}/{}",
            target.metadata.namespace,
            target.name(),
            target.branch()
        )
    }

    /// Wait for and take the lock named `key`
    pub async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut table = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(table.entry(key.to_string()).or_default())
        };
        lock.lock_owned().await
    }
}

/// Runs promotion attempts
#[derive(Debug)]
pub struct PromotionEngine {
    credentials: CredentialResolver,
    identity: CommitIdentity,
    message: Template,
    title: Template,
    branch: Template,
    workdir: PathBuf,
    locks: TargetLocks,
}

impl PromotionEngine {
    /// Build an engine from operator settings
    pub fn new(settings: &Settings, credentials: CredentialResolver) -> Result<Self> {
        Ok(Self {
            credentials,
            identity: CommitIdentity {
                name: settings.commit.author_name.clone(),
                email: settings.commit.author_email.clone(),
            },
            message: settings.commit.message()?,
            title: settings.commit.title()?,
            branch: settings.commit.branch()?,
            workdir: settings.controller.workdir(),
            locks: TargetLocks::new(),
        })
    }

    /// Credential resolver shared with the Environment reconciler
    pub const fn credentials(&self) -> &CredentialResolver {
        &self.credentials
    }

    /// Parent directory of workspaces
    pub fn workdir(&self) -> &std::path::Path {
        &self.workdir
    }

    /// Run one attempt for `promotion`
    ///
    /// Returns an error for any failed step; workspaces are removed on every
    /// path, and commits already pushed stay on the remote branch.
    #[allow(clippy::too_many_lines)]
    pub async fn promote(
        &self,
        promotion: &Promotion,
        source: &Environment,
        target: &Environment,
        secrets: &dyn SecretStore,
        connector: &dyn PlatformConnector,
        progress: &dyn ProgressCallback,
    ) -> Result<PromotionOutcome> {
        for env in [source, target] {
            if !env.is_ready() {
                info!(environment = env.name(), "Environment not ready, waiting");
                let outcome = PromotionOutcome::AwaitingEnvironments {
                    environment: env.name().to_string(),
                };
                progress.on_message(&outcome.message()).await;
                return Ok(outcome);
            }
        }

        let platform = connector.connect(target, secrets).await?;

        // Provisioning
        progress.on_phase(Phase::Provisioning).await;
        let source_access = self.credentials.resolve(source, secrets).await?;
        let target_access = self.credentials.resolve(target, secrets).await?;
        let source_ws = GitWorkspace::spawn_provision(
            source_access,
            source.branch(),
            &self.workdir,
            &promotion.metadata,
        )
        .await?;
        let target_ws = GitWorkspace::spawn_provision(
            target_access,
            target.branch(),
            &self.workdir,
            &promotion.metadata,
        )
        .await?;
        let source_sha = source_ws.head_commit()?;
        debug!(source_sha = %source_sha, "Cloned environments");

        // Resolving the open request, under the target lock
        progress.on_phase(Phase::ResolvingRequest).await;
        let lock_key = TargetLocks::key(target);
        let guard = self.locks.acquire(&lock_key).await;
        debug!(lock = %lock_key, "Holding target lock");
        let open = platform.list_pull_requests().await?;

        let (mut target_ws, branch) = acquire_branch(
            target_ws,
            platform.as_ref(),
            promotion.status.last_pull_request_number,
            &open,
            &self.branch,
            promotion.name(),
        )
        .await?;
        let recorded = promotion.status.last_pull_request_number;
        if recorded != 0 && !branch.is_resumed() {
            progress
                .on_message(&format!(
                    "Pull request #{recorded} is no longer open, starting a new one"
                ))
                .await;
        }
        progress.on_branch(&branch.name, branch.is_resumed()).await;

        // Copying
        progress.on_phase(Phase::Copying).await;
        let source_root = secure_join(source_ws.path(), &source.spec.path)?;
        let target_root = secure_join(target_ws.path(), &target.spec.path)?;
        let plan = CopyPlan::resolve(&promotion.spec.copy, &source_root, &target_root)?;

        let before = target_ws.head_commit()?;
        let mut ladder = ChangeLadder::new(
            self.message.clone(),
            self.identity.clone(),
            TemplateValues {
                promotion: promotion.name().to_string(),
                source_env: source.name().to_string(),
                target_env: target.name().to_string(),
                source_sha: short_sha(&source_sha).to_string(),
                ..TemplateValues::default()
            },
        );
        for step in plan.steps {
            let name = step.name.clone();
            let (ws, (next, pushed)) = target_ws
                .run_blocking(move |ws| {
                    let mut ladder = ladder;
                    execute_step(&step)?;
                    let pushed = ladder.step(ws, &step.name)?;
                    Ok((ladder, pushed))
                })
                .await?;
            target_ws = ws;
            ladder = next;
            let status = match pushed {
                Some(commit) => OperationStatus::Pushed { commit },
                None => OperationStatus::Unchanged,
            };
            progress.on_operation(&name, status).await;
        }
        let after = target_ws.head_commit()?;
        let promoted = ladder.into_promoted();

        // Syncing the request
        progress.on_phase(Phase::SyncingRequest).await;
        let outcome = if before == after {
            match branch.request {
                Some(request) => PromotionOutcome::OpenForReview { request },
                None => PromotionOutcome::InSync,
            }
        } else {
            let title = self.title.render(&TemplateValues {
                promotion: promotion.name().to_string(),
                operations: promoted.join(", "),
                source_env: source.name().to_string(),
                target_env: target.name().to_string(),
                source_sha: short_sha(&source_sha).to_string(),
                ..TemplateValues::default()
            });

            match branch.request {
                Some(existing) => {
                    let edit = PullRequestEdit { title: Some(title) };
                    let request = platform.edit_pull_request(existing.number, &edit).await?;
                    progress.on_pr_updated(&request).await;
                    PromotionOutcome::RequestUpdated { request, promoted }
                }
                None => {
                    let request = platform
                        .create_pull_request(&title, &branch.name, target.branch(), "")
                        .await?;
                    progress.on_pr_created(&request).await;
                    PromotionOutcome::RequestCreated { request, promoted }
                }
            }
        };
        drop(guard);

        for ws in [source_ws, target_ws] {
            if let Err(e) = blocking(move || ws.release()).await {
                warn!(error = %e, "Failed to remove workspace");
            }
        }

        progress.on_phase(Phase::Complete).await;
        info!(promotion = promotion.name(), outcome = %outcome.message(), "Promotion reconciled");
        Ok(outcome)
    }
}
