//! Provider API token lookup

use crate::auth::auth_error;
use crate::error::{Error, Result};
use crate::store::SecretStore;
use crate::types::Environment;

/// Secret key holding the provider API token
pub const TOKEN_KEY: &str = "token";

/// Read the API token referenced by `environment`, if any
pub async fn resolve_api_token(
    environment: &Environment,
    secrets: &dyn SecretStore,
) -> Result<Option<String>> {
    let Some(secret_ref) = &environment.spec.api_token_secret_ref else {
        return Ok(None);
    };
    let namespace = &environment.metadata.namespace;

    let secret = secrets
        .get_secret(namespace, &secret_ref.name)
        .await
        .map_err(|e| auth_error(&secret_ref.name, &e))?;
    let raw = secret.get(TOKEN_KEY).ok_or_else(|| {
        Error::AuthConfiguration(format!(
            "secret {namespace}/{} has no {TOKEN_KEY:?} key",
            secret_ref.name
        ))
    })?;
    let token = std::str::from_utf8(raw)
        .map_err(|_| Error::AuthConfiguration("API token is not valid UTF-8".into()))?
        .trim();
    if token.is_empty() {
        return Err(Error::AuthConfiguration(format!(
            "secret {namespace}/{} has an empty token",
            secret_ref.name
        )));
    }
    Ok(Some(token.to_string()))
}
