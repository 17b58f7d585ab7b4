//! GitLab platform service implementation

use crate::error::{Error, Result};
use crate::platform::PlatformService;
use crate::types::{Platform, PlatformConfig, PullRequest, PullRequestEdit};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// GitLab service using reqwest
pub struct GitLabService {
    client: Client,
    token: String,
    api_base: String,
    config: PlatformConfig,
    project_path: String,
}

#[derive(Deserialize)]
struct MergeRequest {
    iid: u64,
    web_url: String,
    source_branch: String,
    target_branch: String,
    title: String,
}

impl From<MergeRequest> for PullRequest {
    fn from(mr: MergeRequest) -> Self {
        Self {
            number: mr.iid,
            html_url: mr.web_url,
            base_ref: mr.target_branch,
            head_ref: mr.source_branch,
            title: mr.title,
        }
    }
}

#[derive(Serialize)]
struct CreateMrPayload<'a> {
    source_branch: &'a str,
    target_branch: &'a str,
    title: &'a str,
    description: &'a str,
}

#[derive(Serialize)]
struct UpdateMrPayload<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<&'a str>,
}

/// Default request timeout in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Page size for list requests
const PER_PAGE: &str = "100";

impl GitLabService {
    /// Create a new GitLab service
    pub fn new(token: String, owner: String, repo: String, host: Option<String>) -> Self {
        let host = host.unwrap_or_else(|| "gitlab.com".to_string());
        let project_path = format!("{owner}/{repo}");

        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            token,
            api_base: format!("https://{host}/api/v4"),
            config: PlatformConfig {
                platform: Platform::GitLab,
                owner,
                repo,
                host: if host == "gitlab.com" {
                    None
                } else {
                    Some(host)
                },
            },
            project_path,
        }
    }

    /// Point the service at a different API root (e.g. `http://127.0.0.1:1234/api/v4`)
    #[must_use]
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    fn merge_requests_url(&self) -> String {
        self.api_url(&format!(
            "/projects/{}/merge_requests",
            urlencoding::encode(&self.project_path)
        ))
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        request.header("PRIVATE-TOKEN", &self.token)
    }
}

async fn checked(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(Error::GitLabApi(format!("{status}: {}", body.trim())))
}

#[async_trait]
impl PlatformService for GitLabService {
    async fn list_pull_requests(&self) -> Result<Vec<PullRequest>> {
        let url = self.merge_requests_url();
        let mut out = Vec::new();
        let mut page = "1".to_string();

        loop {
            let response = self
                .authed(self.client.get(&url))
                .query(&[
                    ("state", "opened"),
                    ("per_page", PER_PAGE),
                    ("page", page.as_str()),
                ])
                .send()
                .await?;
            let response = checked(response).await?;

            // GitLab leaves the header empty on the last page
            let next = response
                .headers()
                .get("x-next-page")
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(ToString::to_string);

            let mrs: Vec<MergeRequest> = response.json().await?;
            out.extend(mrs.into_iter().map(PullRequest::from));

            match next {
                Some(n) => page = n,
                None => break,
            }
        }

        debug!(count = out.len(), "Listed open merge requests");
        Ok(out)
    }

    async fn get_pull_request(&self, number: u64) -> Result<PullRequest> {
        let url = format!("{}/{number}", self.merge_requests_url());
        let response = self.authed(self.client.get(&url)).send().await?;
        let mr: MergeRequest = checked(response).await?.json().await?;
        Ok(mr.into())
    }

    async fn create_pull_request(
        &self,
        title: &str,
        head: &str,
        base: &str,
        body: &str,
    ) -> Result<PullRequest> {
        let payload = CreateMrPayload {
            source_branch: head,
            target_branch: base,
            title,
            description: body,
        };

        let response = self
            .authed(self.client.post(self.merge_requests_url()))
            .json(&payload)
            .send()
            .await?;
        let mr: MergeRequest = checked(response).await?.json().await?;
        Ok(mr.into())
    }

    async fn edit_pull_request(&self, number: u64, edit: &PullRequestEdit) -> Result<PullRequest> {
        let url = format!("{}/{number}", self.merge_requests_url());
        let payload = UpdateMrPayload {
            title: edit.title.as_deref(),
        };

        let response = self
            .authed(self.client.put(&url))
            .json(&payload)
            .send()
            .await?;
        let mr: MergeRequest = checked(response).await?.json().await?;
        Ok(mr.into())
    }

    fn config(&self) -> &PlatformConfig {
        &self.config
    }
}
