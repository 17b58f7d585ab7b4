//! Change ladder: one commit and push per copy operation that changed the tree

use crate::error::Result;
use crate::promote::template::{Template, TemplateValues};
use crate::repo::{CommitIdentity, GitWorkspace};
use tracing::info;

/// Length of the abbreviated source commit in messages
pub const SHORT_SHA_LEN: usize = 7;

/// Abbreviate a full commit hash
pub fn short_sha(commit: &str) -> &str {
    commit.get(..SHORT_SHA_LEN).unwrap_or(commit)
}

/// Commits the target workspace after each copy step
///
/// Owns its inputs so it can travel with the workspace onto blocking threads.
#[derive(Debug)]
pub struct ChangeLadder {
    message: Template,
    identity: CommitIdentity,
    values: TemplateValues,
    promoted: Vec<String>,
}

impl ChangeLadder {
    /// Start a ladder; `values` carries everything except the operation name
    pub const fn new(message: Template, identity: CommitIdentity, values: TemplateValues) -> Self {
        Self {
            message,
            identity,
            values,
            promoted: Vec::new(),
        }
    }

    /// Commit and push if `operation` left the tree dirty
    ///
    /// Returns the new commit hash, or `None` when there was nothing to commit.
    pub fn step(&mut self, workspace: &GitWorkspace, operation: &str) -> Result<Option<String>> {
        if !workspace.is_dirty()? {
            return Ok(None);
        }

        self.values.operation = operation.to_string();
        let message = self.message.render(&self.values);
        let commit = workspace.commit_all(&message, &self.identity)?;
        workspace.push_current_branch()?;
        info!(operation, commit = %short_sha(&commit), "Committed and pushed");

        self.promoted.push(operation.to_string());
        Ok(Some(commit))
    }

    /// Consume the ladder, returning the promoted operation names
    pub fn into_promoted(self) -> Vec<String> {
        self.promoted
    }
}
