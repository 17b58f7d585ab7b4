//! Directory-backed resource and secret store
//!
//! Layout: `<root>/<namespace>/{environments,promotions,secrets}/<name>.json`.
//! Records are camelCase JSON; secrets hold base64 `data` and/or plain
//! `stringData` maps.

use crate::error::{Error, Result};
use crate::store::{ResourceStore, Secret, SecretStore};
use crate::types::{Environment, ObjectMeta, Promotion};
use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

const ENVIRONMENTS: &str = "environments";
const PROMOTIONS: &str = "promotions";
const SECRETS: &str = "secrets";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SecretRecord {
    #[serde(default)]
    data: BTreeMap<String, String>,
    #[serde(default)]
    string_data: BTreeMap<String, String>,
}

/// Store rooted at a directory on disk
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Create a store rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_path(&self, namespace: &str, kind: &str, name: &str) -> Result<PathBuf> {
        validate_segment(namespace)?;
        validate_segment(name)?;
        Ok(self
            .root
            .join(namespace)
            .join(kind)
            .join(format!("{name}.json")))
    }

    async fn read_record<T: DeserializeOwned>(
        &self,
        kind_label: &'static str,
        kind_dir: &str,
        namespace: &str,
        name: &str,
    ) -> Result<T> {
        let path = self.record_path(namespace, kind_dir, name)?;
        let content = match fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::NotFound {
                    kind: kind_label,
                    namespace: namespace.to_string(),
                    name: name.to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&content)
            .map_err(|e| Error::Store(format!("{}: {e}", path.display())))
    }

    async fn namespaces(&self, namespace: Option<&str>) -> Result<Vec<String>> {
        if let Some(ns) = namespace {
            return Ok(vec![ns.to_string()]);
        }
        let mut namespaces = Vec::new();
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(namespaces),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                namespaces.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        namespaces.sort();
        Ok(namespaces)
    }

    async fn list_names(&self, namespace: &str, kind: &str) -> Result<Vec<String>> {
        let dir = self.root.join(namespace).join(kind);
        let mut names = Vec::new();
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(names),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                if let Some(stem) = path.file_stem() {
                    names.push(stem.to_string_lossy().into_owned());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    async fn write_status<S: Serialize + Sync>(
        &self,
        kind: &str,
        metadata: &ObjectMeta,
        status: &S,
    ) -> Result<()> {
        let path = self.record_path(&metadata.namespace, kind, &metadata.name)?;
        let content = fs::read_to_string(&path).await?;
        let mut record: serde_json::Value = serde_json::from_str(&content)?;
        let object = record
            .as_object_mut()
            .ok_or_else(|| Error::Store(format!("{} is not a JSON object", path.display())))?;
        object.insert("status".to_string(), serde_json::to_value(status)?);

        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(&record)?).await?;
        fs::rename(&tmp, &path).await?;
        debug!(path = %path.display(), "Wrote status");
        Ok(())
    }
}

/// Reject names that could leave the store directory
fn validate_segment(segment: &str) -> Result<()> {
    if segment.is_empty()
        || segment == "."
        || segment == ".."
        || segment.contains(['/', '\\'])
    {
        return Err(Error::Store(format!("invalid resource name: {segment:?}")));
    }
    Ok(())
}

/// Pin identity to the record's location on disk
fn locate(metadata: &mut ObjectMeta, namespace: &str, name: &str) {
    metadata.namespace = namespace.to_string();
    metadata.name = name.to_string();
}

#[async_trait]
impl ResourceStore for FileStore {
    async fn get_environment(&self, namespace: &str, name: &str) -> Result<Environment> {
        let mut env: Environment = self
            .read_record("Environment", ENVIRONMENTS, namespace, name)
            .await?;
        locate(&mut env.metadata, namespace, name);
        Ok(env)
    }

    async fn get_promotion(&self, namespace: &str, name: &str) -> Result<Promotion> {
        let mut promotion: Promotion = self
            .read_record("Promotion", PROMOTIONS, namespace, name)
            .await?;
        locate(&mut promotion.metadata, namespace, name);
        Ok(promotion)
    }

    async fn list_environments(&self, namespace: Option<&str>) -> Result<Vec<Environment>> {
        let mut out = Vec::new();
        for ns in self.namespaces(namespace).await? {
            for name in self.list_names(&ns, ENVIRONMENTS).await? {
                out.push(self.get_environment(&ns, &name).await?);
            }
        }
        Ok(out)
    }

    async fn list_promotions(&self, namespace: Option<&str>) -> Result<Vec<Promotion>> {
        let mut out = Vec::new();
        for ns in self.namespaces(namespace).await? {
            for name in self.list_names(&ns, PROMOTIONS).await? {
                out.push(self.get_promotion(&ns, &name).await?);
            }
        }
        Ok(out)
    }

    async fn update_environment_status(&self, environment: &Environment) -> Result<()> {
        self.write_status(ENVIRONMENTS, &environment.metadata, &environment.status)
            .await
    }

    async fn update_promotion_status(&self, promotion: &Promotion) -> Result<()> {
        self.write_status(PROMOTIONS, &promotion.metadata, &promotion.status)
            .await
    }
}

#[async_trait]
impl SecretStore for FileStore {
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret> {
        let record: SecretRecord = self.read_record("Secret", SECRETS, namespace, name).await?;

        let mut data = BTreeMap::new();
        for (key, value) in record.data {
            let decoded = BASE64.decode(value.trim()).map_err(|e| {
                Error::AuthConfiguration(format!(
                    "secret {namespace}/{name} key {key:?} is not valid base64: {e}"
                ))
            })?;
            data.insert(key, decoded);
        }
        for (key, value) in record.string_data {
            data.insert(key, value.into_bytes());
        }
        Ok(Secret { data })
    }
}
