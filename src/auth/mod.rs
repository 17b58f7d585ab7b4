//! Credential resolution for environment repositories
//!
//! Turns an Environment's source descriptor plus its referenced secrets into
//! an effective clone URL and a transport credential:
//! - SSH key pair secret: SSH as user `git`, URL rewritten to `git@host:path`
//! - API token secret only: HTTPS with the token as password
//! - neither: anonymous, URL unchanged

mod ssh;
mod token;

pub use ssh::{HostKeyPolicy, ssh_clone_url, validate_private_key};
pub use token::resolve_api_token;

use crate::error::{Error, Result};
use crate::platform::detect_platform;
use crate::store::SecretStore;
use crate::types::{Environment, Platform};
use git2::{Cred, CredentialType};
use std::fmt;
use tracing::debug;

/// Secret key holding the SSH private key
pub const PRIVATE_KEY: &str = "private";

/// Transport credential for git remote operations
#[derive(Clone)]
pub enum GitCredentials {
    /// No credential
    Anonymous,
    /// SSH private key (PEM/OpenSSH text)
    SshKey {
        /// SSH user
        username: String,
        /// Private key material
        private_key: String,
    },
    /// HTTPS basic auth with an API token
    Token {
        /// HTTPS user
        username: String,
        /// API token used as password
        token: String,
    },
}

impl fmt::Debug for GitCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Anonymous => write!(f, "Anonymous"),
            Self::SshKey { username, .. } => write!(f, "SshKey({username})"),
            Self::Token { username, .. } => write!(f, "Token({username})"),
        }
    }
}

impl GitCredentials {
    /// Build a libgit2 credential for a transport request
    pub fn to_cred(
        &self,
        username_from_url: Option<&str>,
        allowed: CredentialType,
    ) -> std::result::Result<Cred, git2::Error> {
        match self {
            Self::SshKey {
                username,
                private_key,
            } => {
                if allowed.contains(CredentialType::USERNAME) {
                    return Cred::username(username);
                }
                let user = username_from_url.unwrap_or(username);
                Cred::ssh_key_from_memory(user, None, private_key, None)
            }
            Self::Token { username, token } => Cred::userpass_plaintext(username, token),
            Self::Anonymous => Err(git2::Error::from_str(
                "remote requires authentication but no credentials are configured",
            )),
        }
    }
}

/// Effective remote location plus the credential to reach it
#[derive(Debug, Clone)]
pub struct ResolvedSource {
    /// URL to clone, fetch and push
    pub url: String,
    /// Transport credential
    pub credentials: GitCredentials,
    /// SSH host key verification policy
    pub host_keys: HostKeyPolicy,
}

impl ResolvedSource {
    /// Anonymous access to `url`
    pub fn anonymous(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            credentials: GitCredentials::Anonymous,
            host_keys: HostKeyPolicy::AcceptAny,
        }
    }
}

/// Resolves transport credentials for Environments
#[derive(Debug, Clone, Default)]
pub struct CredentialResolver {
    host_keys: HostKeyPolicy,
}

impl CredentialResolver {
    /// Create a resolver that verifies SSH hosts with `host_keys`
    pub const fn new(host_keys: HostKeyPolicy) -> Self {
        Self { host_keys }
    }

    /// Resolve the clone URL and credential for `environment`
    pub async fn resolve(
        &self,
        environment: &Environment,
        secrets: &dyn SecretStore,
    ) -> Result<ResolvedSource> {
        let namespace = &environment.metadata.namespace;
        let url = &environment.spec.source.url;

        if let Some(secret_ref) = &environment.spec.source.secret_ref {
            let secret = secrets
                .get_secret(namespace, &secret_ref.name)
                .await
                .map_err(|e| auth_error(&secret_ref.name, &e))?;
            let key = secret.get(PRIVATE_KEY).ok_or_else(|| {
                Error::AuthConfiguration(format!(
                    "secret {namespace}/{} has no {PRIVATE_KEY:?} key",
                    secret_ref.name
                ))
            })?;
            let private_key = validate_private_key(key)?;
            let ssh_url = ssh_clone_url(url)?;
            debug!(environment = environment.name(), url = %ssh_url, "Using SSH credentials");

            return Ok(ResolvedSource {
                url: ssh_url,
                credentials: GitCredentials::SshKey {
                    username: "git".to_string(),
                    private_key,
                },
                host_keys: self.host_keys.clone(),
            });
        }

        if url.starts_with("https://") {
            if let Some(token) = resolve_api_token(environment, secrets).await? {
                debug!(environment = environment.name(), "Using token credentials over HTTPS");
                return Ok(ResolvedSource {
                    url: url.clone(),
                    credentials: GitCredentials::Token {
                        username: token_username(environment).to_string(),
                        token,
                    },
                    host_keys: self.host_keys.clone(),
                });
            }
        }

        Ok(ResolvedSource {
            url: url.clone(),
            credentials: GitCredentials::Anonymous,
            host_keys: self.host_keys.clone(),
        })
    }
}

/// HTTPS user name each provider expects alongside a token
fn token_username(environment: &Environment) -> &'static str {
    let platform = environment
        .spec
        .git_provider
        .as_deref()
        .and_then(|p| p.parse::<Platform>().ok())
        .or_else(|| detect_platform(&environment.spec.source.url));
    match platform {
        Some(Platform::GitLab) => "oauth2",
        _ => "x-access-token",
    }
}

pub(crate) fn auth_error(secret: &str, err: &Error) -> Error {
    match err {
        Error::AuthConfiguration(_) => Error::AuthConfiguration(err.to_string()),
        _ => Error::AuthConfiguration(format!("cannot read secret {secret}: {err}")),
    }
}
