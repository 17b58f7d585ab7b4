//! Platform detection from remote URLs

use crate::error::{Error, Result};
use crate::types::{Platform, PlatformConfig};
use regex::Regex;
use std::env;
use std::sync::OnceLock;

/// Detect platform (GitHub or GitLab) from a remote URL
///
/// Self-hosted instances are recognised through `GH_HOST` / `GITLAB_HOST`.
pub fn detect_platform(url: &str) -> Option<Platform> {
    let gh_host = env::var("GH_HOST").ok();
    let gitlab_host = env::var("GITLAB_HOST").ok();

    let hostname = extract_hostname(url)?;

    // Check GitHub
    if hostname == "github.com"
        || hostname.ends_with(".github.com")
        || gh_host.as_ref().is_some_and(|h| hostname == *h)
    {
        return Some(Platform::GitHub);
    }

    // Check GitLab
    if hostname == "gitlab.com"
        || hostname.ends_with(".gitlab.com")
        || gitlab_host.as_ref().is_some_and(|h| hostname == *h)
    {
        return Some(Platform::GitLab);
    }

    None
}

fn scp_like() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[^@/]+@([^:/]+):(.+)$").expect("valid regex"))
}

/// Parse repository coordinates (owner/repo) from a remote URL
///
/// `platform` overrides host-based detection, which is how self-hosted
/// instances with arbitrary host names are addressed.
pub fn parse_repo_info(url: &str, platform: Option<Platform>) -> Result<PlatformConfig> {
    let platform = platform
        .or_else(|| detect_platform(url))
        .ok_or_else(|| {
            Error::UnknownProvider(format!("cannot determine provider for {url}"))
        })?;
    let hostname = extract_hostname(url)
        .ok_or_else(|| Error::Parse(format!("cannot parse remote URL: {url}")))?;

    let path = repo_path(url)
        .ok_or_else(|| Error::Parse(format!("cannot parse remote URL: {url}")))?;
    let path = path.trim_matches('/');
    let path = path.strip_suffix(".git").unwrap_or(path);

    // Split path into owner and repo (GitLab supports nested groups)
    let parts: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();
    let Some((repo, owner)) = parts.split_last() else {
        return Err(Error::Parse(format!("invalid repo path: {path}")));
    };
    if owner.is_empty() {
        return Err(Error::Parse(format!("invalid repo path: {path}")));
    }

    let default_host = match platform {
        Platform::GitHub => "github.com",
        Platform::GitLab => "gitlab.com",
    };
    let host = (hostname != default_host).then_some(hostname);

    Ok(PlatformConfig {
        platform,
        owner: owner.join("/"),
        repo: (*repo).to_string(),
        host,
    })
}

fn repo_path(url: &str) -> Option<String> {
    if let Some(caps) = scp_like().captures(url) {
        return caps.get(2).map(|m| m.as_str().to_string());
    }
    url::Url::parse(url).ok().map(|u| u.path().to_string())
}

fn extract_hostname(url: &str) -> Option<String> {
    // SSH scp-like format
    if let Some(caps) = scp_like().captures(url) {
        return caps.get(1).map(|m| m.as_str().to_string());
    }

    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(ToString::to_string))
}
