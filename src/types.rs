//! Core types for gitops-promoter
//!
//! Environment and Promotion records mirror Kubernetes-style resources:
//! a `metadata` block, an operator-owned `spec`, and a reconciler-owned
//! `status`. They serialize as camelCase JSON.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Branch checked out when an environment does not name one
pub const DEFAULT_BRANCH: &str = "master";

/// Condition type carried by both resource kinds
pub const READY_CONDITION: &str = "Ready";

/// Reason recorded on a successful reconcile
pub const SUCCEEDED_REASON: &str = "Succeeded";

/// Identity of a stored resource
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    /// Resource name
    pub name: String,
    /// Namespace (defaults to "default")
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Incremented whenever the spec changes
    #[serde(default)]
    pub generation: i64,
}

fn default_namespace() -> String {
    "default".to_string()
}

/// Reference to another resource in the same namespace
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LocalObjectReference {
    /// Referenced resource name
    pub name: String,
}

/// Tri-state condition status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ConditionStatus {
    /// Condition holds
    True,
    /// Condition does not hold
    False,
    /// Not yet determined
    Unknown,
}

/// Observed condition on a resource status
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Condition type, e.g. "Ready"
    #[serde(rename = "type")]
    pub type_: String,
    /// Current status
    pub status: ConditionStatus,
    /// Machine-readable reason code
    pub reason: String,
    /// Human-readable detail
    pub message: String,
    /// When `status` last changed
    pub last_transition_time: DateTime<Utc>,
}

/// Insert or update a condition by type
///
/// The transition time only moves when the status actually changes.
pub fn set_condition(
    conditions: &mut Vec<Condition>,
    type_: &str,
    status: ConditionStatus,
    reason: &str,
    message: &str,
) {
    if let Some(existing) = conditions.iter_mut().find(|c| c.type_ == type_) {
        if existing.status != status {
            existing.status = status;
            existing.last_transition_time = Utc::now();
        }
        existing.reason = reason.to_string();
        existing.message = message.to_string();
        return;
    }

    conditions.push(Condition {
        type_: type_.to_string(),
        status,
        reason: reason.to_string(),
        message: message.to_string(),
        last_transition_time: Utc::now(),
    });
}

/// Find a condition by type
pub fn find_condition<'a>(conditions: &'a [Condition], type_: &str) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.type_ == type_)
}

// ============================================================================
// Environment
// ============================================================================

/// A git-backed environment
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Environment {
    /// Resource identity
    pub metadata: ObjectMeta,
    /// Desired state
    pub spec: EnvironmentSpec,
    /// Observed state
    #[serde(default)]
    pub status: EnvironmentStatus,
}

/// Desired state of an Environment
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentSpec {
    /// Environment directory relative to the repository root
    #[serde(default)]
    pub path: String,
    /// Repository the environment lives in
    pub source: Source,
    /// Secret holding the provider API token under key `token`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_token_secret_ref: Option<LocalObjectReference>,
    /// Git hosting provider name (e.g. "github")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_provider: Option<String>,
}

/// Repository location of an Environment
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    /// Repository URL
    pub url: String,
    /// Git reference to check out
    #[serde(default, rename = "ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<GitRepositoryRef>,
    /// Secret holding an SSH key pair under keys `private`/`public`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_ref: Option<LocalObjectReference>,
}

/// Git reference to resolve and check out
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitRepositoryRef {
    /// Branch name
    #[serde(default)]
    pub branch: String,
}

/// Observed state of an Environment
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentStatus {
    /// Last generation the reconciler acted on
    #[serde(default)]
    pub observed_generation: i64,
    /// Current conditions
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// HEAD commit seen at the last successful clone
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub observed_commit_hash: String,
}

impl Environment {
    /// Resource name
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Branch to clone, defaulting to [`DEFAULT_BRANCH`]
    pub fn branch(&self) -> &str {
        match &self.spec.source.reference {
            Some(r) if !r.branch.is_empty() => &r.branch,
            _ => DEFAULT_BRANCH,
        }
    }

    /// Whether the Ready condition is True
    pub fn is_ready(&self) -> bool {
        find_condition(&self.status.conditions, READY_CONDITION)
            .is_some_and(|c| c.status == ConditionStatus::True)
    }

    /// Mark ready with the observed HEAD commit
    pub fn mark_ready(&mut self, reason: &str, message: &str, commit: &str) {
        self.status.observed_commit_hash = commit.to_string();
        set_condition(
            &mut self.status.conditions,
            READY_CONDITION,
            ConditionStatus::True,
            reason,
            message,
        );
    }

    /// Mark not ready
    pub fn mark_not_ready(&mut self, reason: &str, message: &str) {
        set_condition(
            &mut self.status.conditions,
            READY_CONDITION,
            ConditionStatus::False,
            reason,
            message,
        );
    }
}

// ============================================================================
// Promotion
// ============================================================================

/// A source→target promotion relationship
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Promotion {
    /// Resource identity
    pub metadata: ObjectMeta,
    /// Desired state
    pub spec: PromotionSpec,
    /// Observed state
    #[serde(default)]
    pub status: PromotionStatus,
}

/// Desired state of a Promotion
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromotionSpec {
    /// Environment to promote from
    pub source_environment_ref: LocalObjectReference,
    /// Environment to promote to
    pub target_environment_ref: LocalObjectReference,
    /// Copy operations, applied in declared order
    pub copy: Vec<CopyOperation>,
    /// How changes land on the target
    #[serde(default)]
    pub strategy: Strategy,
}

/// One named path copy
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CopyOperation {
    /// Display name, e.g. "Application Version"
    pub name: String,
    /// Path relative to the source environment root
    pub source: String,
    /// Path relative to the target environment root
    pub target: String,
}

/// Promotion strategy
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum Strategy {
    /// Raise or update a pull request against the target branch
    #[default]
    #[serde(rename = "pull-request")]
    PullRequest,
}

/// Observed state of a Promotion
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromotionStatus {
    /// Last generation the reconciler acted on
    #[serde(default)]
    pub observed_generation: i64,
    /// Current conditions
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// Web URL of the last pull request opened
    #[serde(default, rename = "lastPullRequestUrl", skip_serializing_if = "String::is_empty")]
    pub last_pull_request_url: String,
    /// Number of the last pull request opened; 0 means none
    #[serde(default)]
    pub last_pull_request_number: u64,
}

impl Promotion {
    /// Resource name
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Whether the Ready condition is True
    pub fn is_ready(&self) -> bool {
        find_condition(&self.status.conditions, READY_CONDITION)
            .is_some_and(|c| c.status == ConditionStatus::True)
    }

    /// Message of the Ready condition, if any
    pub fn ready_message(&self) -> Option<&str> {
        find_condition(&self.status.conditions, READY_CONDITION).map(|c| c.message.as_str())
    }

    /// Mark ready
    pub fn mark_ready(&mut self, reason: &str, message: &str) {
        set_condition(
            &mut self.status.conditions,
            READY_CONDITION,
            ConditionStatus::True,
            reason,
            message,
        );
    }

    /// Mark not ready
    pub fn mark_not_ready(&mut self, reason: &str, message: &str) {
        set_condition(
            &mut self.status.conditions,
            READY_CONDITION,
            ConditionStatus::False,
            reason,
            message,
        );
    }
}

// ============================================================================
// Provider-side types
// ============================================================================

/// A pull request / merge request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PullRequest {
    /// PR/MR number
    pub number: u64,
    /// Web URL for the PR/MR
    pub html_url: String,
    /// Base branch name
    pub base_ref: String,
    /// Head branch name
    pub head_ref: String,
    /// PR/MR title
    pub title: String,
}

/// Fields that can be changed on an existing pull request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PullRequestEdit {
    /// New title
    pub title: Option<String>,
}

/// Git hosting provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Platform {
    /// GitHub or GitHub Enterprise
    GitHub,
    /// GitLab or self-hosted GitLab
    GitLab,
}

impl FromStr for Platform {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "github" => Ok(Self::GitHub),
            "gitlab" => Ok(Self::GitLab),
            other => Err(Error::UnknownProvider(other.to_string())),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GitHub => write!(f, "github"),
            Self::GitLab => write!(f, "gitlab"),
        }
    }
}

/// Provider repository coordinates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformConfig {
    /// Platform type
    pub platform: Platform,
    /// Repository owner (user, organization, or GitLab group path)
    pub owner: String,
    /// Repository name
    pub repo: String,
    /// Custom host (None for github.com/gitlab.com)
    pub host: Option<String>,
}
