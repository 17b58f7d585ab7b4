//! Operator settings
//!
//! Loaded from a TOML file; every key is optional and falls back to the
//! defaults below, which reproduce the stock commit/branch/title formats.

use crate::error::{Error, Result};
use crate::promote::template::{Template, TemplateField};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default commit message template
pub const DEFAULT_MESSAGE_TEMPLATE: &str = "chore: promote {{ operation }} from {{ source_env }} to {{ target_env }}\n\nSHA in source environment: {{ source_sha }}\n";

/// Default pull request title template
pub const DEFAULT_TITLE_TEMPLATE: &str =
    "chore: promote {{ operations }} from {{ source_env }} to {{ target_env }}";

/// Default promotion branch template
pub const DEFAULT_BRANCH_TEMPLATE: &str = "promotion/{{ promotion }}-{{ timestamp }}";

/// Top-level settings
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Scheduling and requeue behaviour
    pub controller: ControllerSettings,
    /// Commit authorship and message shapes
    pub commit: CommitSettings,
    /// SSH transport policy
    pub ssh: SshSettings,
}

/// Scheduling and requeue behaviour
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ControllerSettings {
    /// Delay before re-checking environments that are not ready yet
    pub readiness_requeue_secs: u64,
    /// Re-poll delay after a successful promotion reconcile
    pub steady_state_requeue_secs: u64,
    /// Re-check delay for environments
    pub environment_requeue_secs: u64,
    /// Deadline for a single reconcile attempt
    pub reconcile_timeout_secs: u64,
    /// Upper bound on concurrently running attempts
    pub max_concurrent_reconciles: usize,
    /// How often the store is scanned for due work
    pub poll_interval_secs: u64,
    /// First retry delay after a failed attempt
    pub backoff_base_secs: u64,
    /// Ceiling for retry delays
    pub backoff_max_secs: u64,
    /// Parent directory for workspaces (system temp dir when unset)
    pub workdir: Option<PathBuf>,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            readiness_requeue_secs: 10,
            steady_state_requeue_secs: 300,
            environment_requeue_secs: 300,
            reconcile_timeout_secs: 600,
            max_concurrent_reconciles: 4,
            poll_interval_secs: 5,
            backoff_base_secs: 5,
            backoff_max_secs: 300,
            workdir: None,
        }
    }
}

impl ControllerSettings {
    /// Requeue delay while waiting for environment readiness
    pub const fn readiness_requeue(&self) -> Duration {
        Duration::from_secs(self.readiness_requeue_secs)
    }

    /// Requeue delay after a successful promotion
    pub const fn steady_state_requeue(&self) -> Duration {
        Duration::from_secs(self.steady_state_requeue_secs)
    }

    /// Requeue delay for environments
    pub const fn environment_requeue(&self) -> Duration {
        Duration::from_secs(self.environment_requeue_secs)
    }

    /// Workspace parent directory
    pub fn workdir(&self) -> PathBuf {
        self.workdir.clone().unwrap_or_else(std::env::temp_dir)
    }

    /// Retry delay after `failures` consecutive failed attempts
    pub fn backoff(&self, failures: u32) -> Duration {
        let exp = failures.saturating_sub(1).min(16);
        let secs = self
            .backoff_base_secs
            .saturating_mul(1_u64 << exp)
            .min(self.backoff_max_secs);
        Duration::from_secs(secs)
    }
}

/// Commit authorship and message shapes
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CommitSettings {
    /// Commit author name
    pub author_name: String,
    /// Commit author email
    pub author_email: String,
    /// Per-operation commit message
    pub message_template: String,
    /// Pull request title
    pub title_template: String,
    /// Name of freshly created promotion branches
    pub branch_template: String,
}

impl Default for CommitSettings {
    fn default() -> Self {
        Self {
            author_name: "Promotion Bot".to_string(),
            author_email: "bot@promotions.gitopsprom.io".to_string(),
            message_template: DEFAULT_MESSAGE_TEMPLATE.to_string(),
            title_template: DEFAULT_TITLE_TEMPLATE.to_string(),
            branch_template: DEFAULT_BRANCH_TEMPLATE.to_string(),
        }
    }
}

impl CommitSettings {
    /// Parsed commit message template
    pub fn message(&self) -> Result<Template> {
        Template::parse(
            &self.message_template,
            &[
                TemplateField::Promotion,
                TemplateField::Operation,
                TemplateField::SourceEnv,
                TemplateField::TargetEnv,
                TemplateField::SourceSha,
            ],
        )
    }

    /// Parsed pull request title template
    pub fn title(&self) -> Result<Template> {
        Template::parse(
            &self.title_template,
            &[
                TemplateField::Promotion,
                TemplateField::Operations,
                TemplateField::SourceEnv,
                TemplateField::TargetEnv,
                TemplateField::SourceSha,
            ],
        )
    }

    /// Parsed branch name template
    pub fn branch(&self) -> Result<Template> {
        Template::parse(
            &self.branch_template,
            &[TemplateField::Promotion, TemplateField::Timestamp],
        )
    }
}

/// SSH transport policy
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SshSettings {
    /// Accepted host key fingerprints (`SHA256:<base64>`); empty accepts any
    pub known_host_fingerprints: Vec<String>,
}

impl Settings {
    /// Default settings file location
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("promoter").join("config.toml"))
    }

    /// Load settings from `path`, or defaults when the file does not exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }

    /// Parse and validate settings from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        let settings: Self = toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Check templates and limits
    pub fn validate(&self) -> Result<()> {
        self.commit.message()?;
        self.commit.title()?;
        self.commit.branch()?;
        if self.commit.author_name.trim().is_empty() || self.commit.author_email.trim().is_empty() {
            return Err(Error::Config("commit author name and email are required".into()));
        }
        if self.controller.max_concurrent_reconciles == 0 {
            return Err(Error::Config("max_concurrent_reconciles must be at least 1".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_yields_defaults() {
        let settings = Settings::from_toml("").unwrap();
        assert_eq!(settings.controller.readiness_requeue_secs, 10);
        assert_eq!(settings.controller.steady_state_requeue_secs, 300);
        assert_eq!(settings.commit.author_name, "Promotion Bot");
        assert!(settings.ssh.known_host_fingerprints.is_empty());
    }

    #[test]
    fn test_partial_override() {
        let settings = Settings::from_toml(
            r#"
            [controller]
            readiness_requeue_secs = 3

            [commit]
            author_name = "Release Robot"
            "#,
        )
        .unwrap();
        assert_eq!(settings.controller.readiness_requeue_secs, 3);
        assert_eq!(settings.controller.reconcile_timeout_secs, 600);
        assert_eq!(settings.commit.author_name, "Release Robot");
        assert_eq!(settings.commit.author_email, "bot@promotions.gitopsprom.io");
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = Settings::from_toml("[controller]\nbogus = 1\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_unknown_placeholder_rejected() {
        let err = Settings::from_toml("[commit]\nbranch_template = \"promo/{{ operation }}\"\n")
            .unwrap_err();
        assert!(matches!(err, Error::Template(_)));
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let controller = ControllerSettings::default();
        assert_eq!(controller.backoff(1), Duration::from_secs(5));
        assert_eq!(controller.backoff(2), Duration::from_secs(10));
        assert_eq!(controller.backoff(3), Duration::from_secs(20));
        assert_eq!(controller.backoff(30), Duration::from_secs(300));
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(settings.controller.max_concurrent_reconciles, 4);
    }
}
