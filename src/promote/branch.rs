//! Branch acquisition: resume the open request's branch or start a new one

use crate::error::Result;
use crate::platform::PlatformService;
use crate::promote::template::{Template, TemplateValues};
use crate::repo::GitWorkspace;
use crate::types::PullRequest;
use chrono::{DateTime, Utc};
use tracing::{debug, info};

/// Timestamp format used in fresh branch names (sortable, second precision)
pub const BRANCH_TIMESTAMP_FORMAT: &str = "%Y-%m-%d-%H-%M-%S";

/// Whether `recorded` still names one of the `open` requests
///
/// Zero means no request was ever opened.
pub fn is_request_open(recorded: u64, open: &[PullRequest]) -> bool {
    recorded != 0 && open.iter().any(|pr| pr.number == recorded)
}

/// Branch the promotion commits onto
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquiredBranch {
    /// Local and remote branch name
    pub name: String,
    /// The open request whose branch was resumed
    pub request: Option<PullRequest>,
}

impl AcquiredBranch {
    /// Whether an existing request branch was resumed
    pub const fn is_resumed(&self) -> bool {
        self.request.is_some()
    }
}

/// Render a fresh branch name for `promotion` at `now`
pub fn fresh_branch_name(template: &Template, promotion: &str, now: DateTime<Utc>) -> String {
    template.render(&TemplateValues {
        promotion: promotion.to_string(),
        timestamp: now.format(BRANCH_TIMESTAMP_FORMAT).to_string(),
        ..TemplateValues::default()
    })
}

/// Check out the branch this attempt will commit to
///
/// With an open request, its head branch is fetched and force-checked-out at
/// the remote tip. Otherwise a new branch is created from the target's
/// default branch. Git work runs on the blocking pool and the workspace is
/// handed back with the branch.
pub async fn acquire_branch(
    workspace: GitWorkspace,
    platform: &dyn PlatformService,
    recorded: u64,
    open: &[PullRequest],
    branch_template: &Template,
    promotion: &str,
) -> Result<(GitWorkspace, AcquiredBranch)> {
    if is_request_open(recorded, open) {
        let request = platform.get_pull_request(recorded).await?;
        debug!(pr = request.number, branch = %request.head_ref, "Resuming open request");
        let head_ref = request.head_ref.clone();
        let (workspace, ()) = workspace
            .run_blocking(move |ws| {
                ws.fetch_all()?;
                ws.force_checkout_remote_branch(&head_ref)
            })
            .await?;
        info!(branch = %request.head_ref, pr = request.number, "Resumed promotion branch");
        let acquired = AcquiredBranch {
            name: request.head_ref.clone(),
            request: Some(request),
        };
        return Ok((workspace, acquired));
    }

    if recorded != 0 {
        info!(pr = recorded, "Recorded request is no longer open");
    }
    let name = fresh_branch_name(branch_template, promotion, Utc::now());
    let (workspace, name) = workspace
        .run_blocking(move |ws| ws.create_branch(&name).map(|()| name))
        .await?;
    info!(branch = %name, "Created promotion branch");
    Ok((
        workspace,
        AcquiredBranch {
            name,
            request: None,
        },
    ))
}
