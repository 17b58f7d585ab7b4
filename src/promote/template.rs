//! `{{ field }}` template rendering for commit messages, titles and branches

use crate::error::{Error, Result};
use regex::{Captures, Regex};
use std::sync::OnceLock;

/// Fields a template may reference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateField {
    /// Promotion name
    Promotion,
    /// Display name of the copy operation being committed
    Operation,
    /// Comma-joined names of all operations that produced commits
    Operations,
    /// Source environment name
    SourceEnv,
    /// Target environment name
    TargetEnv,
    /// First 7 hex characters of the source environment's HEAD
    SourceSha,
    /// UTC timestamp, `YYYY-MM-DD-HH-MM-SS`
    Timestamp,
}

impl TemplateField {
    const ALL: [Self; 7] = [
        Self::Promotion,
        Self::Operation,
        Self::Operations,
        Self::SourceEnv,
        Self::TargetEnv,
        Self::SourceSha,
        Self::Timestamp,
    ];

    /// Placeholder key as written in templates
    pub const fn key(self) -> &'static str {
        match self {
            Self::Promotion => "promotion",
            Self::Operation => "operation",
            Self::Operations => "operations",
            Self::SourceEnv => "source_env",
            Self::TargetEnv => "target_env",
            Self::SourceSha => "source_sha",
            Self::Timestamp => "timestamp",
        }
    }

    fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.key() == key)
    }
}

/// Values substituted into a template
#[derive(Debug, Clone, Default)]
pub struct TemplateValues {
    /// Promotion name
    pub promotion: String,
    /// Current copy operation name
    pub operation: String,
    /// Promoted operation names, comma-joined
    pub operations: String,
    /// Source environment name
    pub source_env: String,
    /// Target environment name
    pub target_env: String,
    /// Short source commit hash
    pub source_sha: String,
    /// Branch timestamp
    pub timestamp: String,
}

impl TemplateValues {
    fn get(&self, field: TemplateField) -> &str {
        match field {
            TemplateField::Promotion => &self.promotion,
            TemplateField::Operation => &self.operation,
            TemplateField::Operations => &self.operations,
            TemplateField::SourceEnv => &self.source_env,
            TemplateField::TargetEnv => &self.target_env,
            TemplateField::SourceSha => &self.source_sha,
            TemplateField::Timestamp => &self.timestamp,
        }
    }
}

fn placeholder() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\{\{\s*([A-Za-z_]+)\s*\}\}").expect("hardcoded placeholder pattern is valid")
    })
}

/// A validated template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
}

impl Template {
    /// Parse `source`, rejecting placeholders outside `allowed`
    pub fn parse(source: &str, allowed: &[TemplateField]) -> Result<Self> {
        for caps in placeholder().captures_iter(source) {
            let key = &caps[1];
            match TemplateField::from_key(key) {
                Some(field) if allowed.contains(&field) => {}
                Some(_) => {
                    return Err(Error::Template(format!(
                        "placeholder {{{{ {key} }}}} is not available in this template"
                    )));
                }
                None => {
                    return Err(Error::Template(format!("unknown placeholder {{{{ {key} }}}}")));
                }
            }
        }
        Ok(Self {
            source: source.to_string(),
        })
    }

    /// Substitute `values` into the template
    pub fn render(&self, values: &TemplateValues) -> String {
        placeholder()
            .replace_all(&self.source, |caps: &Captures<'_>| {
                TemplateField::from_key(&caps[1])
                    .map_or_else(String::new, |f| values.get(f).to_string())
            })
            .into_owned()
    }
}
