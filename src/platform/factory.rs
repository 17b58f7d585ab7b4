//! Platform service factory
//!
//! Selects a gateway implementation by provider name and builds it with
//! the Environment's API token.

use crate::auth::resolve_api_token;
use crate::error::{Error, Result};
use crate::platform::{GitHubService, GitLabService, PlatformService, parse_repo_info};
use crate::store::SecretStore;
use crate::types::{Environment, Platform, PlatformConfig};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Create a platform service from configuration
pub fn create_platform_service(
    config: &PlatformConfig,
    token: &str,
) -> Result<Arc<dyn PlatformService>> {
    match config.platform {
        Platform::GitHub => Ok(Arc::new(GitHubService::new(
            token,
            config.owner.clone(),
            config.repo.clone(),
            config.host.clone(),
        )?)),
        Platform::GitLab => Ok(Arc::new(GitLabService::new(
            token.to_string(),
            config.owner.clone(),
            config.repo.clone(),
            config.host.clone(),
        ))),
    }
}

/// Produces the change-request gateway for an Environment's repository
#[async_trait]
pub trait PlatformConnector: Send + Sync {
    /// Connect to the provider hosting `environment`
    async fn connect(
        &self,
        environment: &Environment,
        secrets: &dyn SecretStore,
    ) -> Result<Arc<dyn PlatformService>>;
}

/// Connector backed by the built-in GitHub and GitLab gateways
///
/// The provider is taken from `spec.gitProvider` when set, otherwise from
/// the repository host. Unrecognised names fail instead of falling back.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProviderRegistry;

impl ProviderRegistry {
    /// Resolve the provider and repository coordinates of `environment`
    pub fn resolve(environment: &Environment) -> Result<PlatformConfig> {
        let platform = environment
            .spec
            .git_provider
            .as_deref()
            .filter(|p| !p.is_empty())
            .map(str::parse::<Platform>)
            .transpose()?;
        parse_repo_info(&environment.spec.source.url, platform)
    }
}

#[async_trait]
impl PlatformConnector for ProviderRegistry {
    async fn connect(
        &self,
        environment: &Environment,
        secrets: &dyn SecretStore,
    ) -> Result<Arc<dyn PlatformService>> {
        let config = Self::resolve(environment)?;
        let token = resolve_api_token(environment, secrets)
            .await?
            .ok_or_else(|| {
                Error::AuthConfiguration(format!(
                    "environment {} has no apiTokenSecretRef for {}",
                    environment.name(),
                    config.platform
                ))
            })?;
        debug!(
            platform = %config.platform,
            owner = %config.owner,
            repo = %config.repo,
            "Connecting to provider"
        );
        create_platform_service(&config, &token)
    }
}
