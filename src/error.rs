//! Error types for gitops-promoter

use std::path::PathBuf;
use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that abort a reconcile attempt
///
/// Every variant is fatal to the current attempt. Retry policy belongs to
/// whatever delivers reconciles (see [`crate::controller`]).
#[derive(Debug, Error)]
pub enum Error {
    /// Credential secret missing, malformed, or not an SSH private key
    #[error("authentication configuration error: {0}")]
    AuthConfiguration(String),

    /// Cloning an environment repository failed
    #[error("failed to clone {url}: {message}")]
    Clone {
        /// Effective clone URL
        url: String,
        /// Underlying transport or git message
        message: String,
    },

    /// Generic git-hosting provider failure
    #[error("provider error: {0}")]
    Provider(String),

    /// GitHub API failure
    #[error("GitHub API error: {0}")]
    GitHubApi(String),

    /// GitLab API failure
    #[error("GitLab API error: {0}")]
    GitLabApi(String),

    /// No provider is registered under this name
    #[error("unknown git provider: {0}")]
    UnknownProvider(String),

    /// A copy path resolves outside its environment root
    #[error("path {path:?} escapes environment root {}", root.display())]
    PathEscape {
        /// Environment root the path was joined onto
        root: PathBuf,
        /// Offending relative path
        path: String,
    },

    /// Copy source does not exist in the source workspace
    #[error("source path {} does not exist", .0.display())]
    SourceNotFound(PathBuf),

    /// Staging or committing in the target workspace failed
    #[error("commit failed: {0}")]
    Commit(String),

    /// Pushing the promotion branch failed or was rejected
    #[error("push failed: {0}")]
    Push(String),

    /// Other libgit2 failures (fetch, checkout, status)
    #[error("git error: {0}")]
    Git(#[from] git2::Error),

    /// Filesystem failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed JSON record
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A referenced resource does not exist
    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        /// Resource kind (Environment, Promotion, Secret)
        kind: &'static str,
        /// Namespace searched
        namespace: String,
        /// Resource name
        name: String,
    },

    /// Resource store failure
    #[error("store error: {0}")]
    Store(String),

    /// Template rendering failure
    #[error("template error: {0}")]
    Template(String),

    /// Invalid operator configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// Parse failure (URLs, fingerprints, provider names)
    #[error("parse error: {0}")]
    Parse(String),

    /// Reconcile exceeded its deadline
    #[error("reconcile timed out after {0}s")]
    Timeout(u64),

    /// Internal invariant violated
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Condition reason code recorded on the resource status
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::AuthConfiguration(_) => "AuthConfigurationError",
            Self::Clone { .. } => "CloneError",
            Self::Provider(_) | Self::GitHubApi(_) | Self::GitLabApi(_) => "ProviderError",
            Self::UnknownProvider(_) => "UnknownProviderError",
            Self::PathEscape { .. } => "PathEscapeError",
            Self::SourceNotFound(_) => "SourceNotFoundError",
            Self::Commit(_) => "CommitError",
            Self::Push(_) => "PushError",
            Self::Git(_) => "GitError",
            Self::Io(_) => "IOError",
            Self::NotFound { .. } => "NotFound",
            Self::Template(_) => "TemplateError",
            Self::Timeout(_) => "Timeout",
            Self::Json(_)
            | Self::Store(_)
            | Self::Config(_)
            | Self::Parse(_)
            | Self::Internal(_) => "InternalError",
        }
    }

    /// Whether this is a resource-store lookup miss
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<octocrab::Error> for Error {
    fn from(err: octocrab::Error) -> Self {
        Self::GitHubApi(err.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self::Provider(err.to_string())
    }
}
