//! GitHub platform service implementation

use crate::error::{Error, Result};
use crate::platform::PlatformService;
use crate::types::{Platform, PlatformConfig, PullRequest, PullRequestEdit};
use async_trait::async_trait;
use octocrab::Octocrab;
use octocrab::params::State;
use tracing::debug;

/// GitHub service using octocrab
pub struct GitHubService {
    client: Octocrab,
    config: PlatformConfig,
}

impl GitHubService {
    /// Create a new GitHub service
    pub fn new(token: &str, owner: String, repo: String, host: Option<String>) -> Result<Self> {
        let mut builder = Octocrab::builder().personal_token(token.to_string());

        if let Some(ref h) = host {
            let base_url = format!("https://{h}/api/v3");
            builder = builder
                .base_uri(&base_url)
                .map_err(|e| Error::GitHubApi(e.to_string()))?;
        }

        let client = builder.build().map_err(|e| Error::GitHubApi(e.to_string()))?;

        Ok(Self {
            client,
            config: PlatformConfig {
                platform: Platform::GitHub,
                owner,
                repo,
                host,
            },
        })
    }
}

fn to_pull_request(pr: &octocrab::models::pulls::PullRequest) -> PullRequest {
    PullRequest {
        number: pr.number,
        html_url: pr
            .html_url
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default(),
        base_ref: pr.base.ref_field.clone(),
        head_ref: pr.head.ref_field.clone(),
        title: pr.title.as_deref().unwrap_or_default().to_string(),
    }
}

#[async_trait]
impl PlatformService for GitHubService {
    async fn list_pull_requests(&self) -> Result<Vec<PullRequest>> {
        let first = self
            .client
            .pulls(&self.config.owner, &self.config.repo)
            .list()
            .state(State::Open)
            .per_page(100)
            .send()
            .await?;
        let prs = self.client.all_pages(first).await?;
        debug!(count = prs.len(), "Listed open pull requests");
        Ok(prs.iter().map(to_pull_request).collect())
    }

    async fn get_pull_request(&self, number: u64) -> Result<PullRequest> {
        let pr = self
            .client
            .pulls(&self.config.owner, &self.config.repo)
            .get(number)
            .await?;
        Ok(to_pull_request(&pr))
    }

    async fn create_pull_request(
        &self,
        title: &str,
        head: &str,
        base: &str,
        body: &str,
    ) -> Result<PullRequest> {
        let pr = self
            .client
            .pulls(&self.config.owner, &self.config.repo)
            .create(title, head, base)
            .body(body)
            .send()
            .await?;
        Ok(to_pull_request(&pr))
    }

    async fn edit_pull_request(&self, number: u64, edit: &PullRequestEdit) -> Result<PullRequest> {
        let pulls = self.client.pulls(&self.config.owner, &self.config.repo);
        let mut update = pulls.update(number);
        if let Some(title) = &edit.title {
            update = update.title(title);
        }
        let pr = update.send().await?;
        Ok(to_pull_request(&pr))
    }

    fn config(&self) -> &PlatformConfig {
        &self.config
    }
}
