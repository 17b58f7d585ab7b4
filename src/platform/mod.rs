//! Change-request gateways for GitHub and GitLab
//!
//! Provides a unified interface for PR/MR operations across platforms.

mod detection;
mod factory;
mod github;
mod gitlab;

pub use detection::{detect_platform, parse_repo_info};
pub use factory::{PlatformConnector, ProviderRegistry, create_platform_service};
pub use github::GitHubService;
pub use gitlab::GitLabService;

use crate::error::Result;
use crate::types::{PlatformConfig, PullRequest, PullRequestEdit};
use async_trait::async_trait;

/// Platform service trait for PR/MR operations
///
/// Every call goes to the provider; nothing is cached between calls, so
/// each reconcile sees the provider's current view of its requests.
#[async_trait]
pub trait PlatformService: Send + Sync {
    /// List open PRs on the repository
    async fn list_pull_requests(&self) -> Result<Vec<PullRequest>>;

    /// Fetch a single PR by number
    async fn get_pull_request(&self, number: u64) -> Result<PullRequest>;

    /// Open a new PR from `head` into `base`
    async fn create_pull_request(
        &self,
        title: &str,
        head: &str,
        base: &str,
        body: &str,
    ) -> Result<PullRequest>;

    /// Change fields of an existing PR
    async fn edit_pull_request(&self, number: u64, edit: &PullRequestEdit) -> Result<PullRequest>;

    /// Get the platform configuration
    fn config(&self) -> &PlatformConfig;
}
