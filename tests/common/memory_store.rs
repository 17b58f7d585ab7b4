//! In-memory resource and secret store for tests

#![allow(dead_code)]

use async_trait::async_trait;
use gitops_promoter::error::{Error, Result};
use gitops_promoter::store::{ResourceStore, Secret, SecretStore};
use gitops_promoter::types::{Environment, Promotion};
use std::collections::BTreeMap;
use std::sync::Mutex;

type Key = (String, String);

/// Records keyed by (namespace, name), with status write counting
#[derive(Default)]
pub struct MemoryStore {
    environments: Mutex<BTreeMap<Key, Environment>>,
    promotions: Mutex<BTreeMap<Key, Promotion>>,
    secrets: Mutex<BTreeMap<Key, Secret>>,
    status_writes: Mutex<Vec<String>>,
}

fn key(namespace: &str, name: &str) -> Key {
    (namespace.to_string(), name.to_string())
}

fn not_found(kind: &'static str, namespace: &str, name: &str) -> Error {
    Error::NotFound {
        kind,
        namespace: namespace.to_string(),
        name: name.to_string(),
    }
}

impl MemoryStore {
    pub fn insert_environment(&self, environment: Environment) {
        let k = key(&environment.metadata.namespace, &environment.metadata.name);
        self.environments.lock().unwrap().insert(k, environment);
    }

    pub fn insert_promotion(&self, promotion: Promotion) {
        let k = key(&promotion.metadata.namespace, &promotion.metadata.name);
        self.promotions.lock().unwrap().insert(k, promotion);
    }

    pub fn insert_secret(&self, namespace: &str, name: &str, entries: &[(&str, &str)]) {
        let secret = Secret {
            data: entries
                .iter()
                .map(|(k, v)| ((*k).to_string(), v.as_bytes().to_vec()))
                .collect(),
        };
        self.secrets
            .lock()
            .unwrap()
            .insert(key(namespace, name), secret);
    }

    /// Current stored Promotion, panicking when absent
    pub fn promotion(&self, namespace: &str, name: &str) -> Promotion {
        self.promotions
            .lock()
            .unwrap()
            .get(&key(namespace, name))
            .cloned()
            .unwrap_or_else(|| panic!("promotion {namespace}/{name} not stored"))
    }

    /// Current stored Environment, panicking when absent
    pub fn environment(&self, namespace: &str, name: &str) -> Environment {
        self.environments
            .lock()
            .unwrap()
            .get(&key(namespace, name))
            .cloned()
            .unwrap_or_else(|| panic!("environment {namespace}/{name} not stored"))
    }

    /// Objects whose status was written, in order ("kind/ns/name")
    pub fn status_writes(&self) -> Vec<String> {
        self.status_writes.lock().unwrap().clone()
    }
}

#[async_trait]
impl ResourceStore for MemoryStore {
    async fn get_environment(&self, namespace: &str, name: &str) -> Result<Environment> {
        self.environments
            .lock()
            .unwrap()
            .get(&key(namespace, name))
            .cloned()
            .ok_or_else(|| not_found("Environment", namespace, name))
    }

    async fn get_promotion(&self, namespace: &str, name: &str) -> Result<Promotion> {
        self.promotions
            .lock()
            .unwrap()
            .get(&key(namespace, name))
            .cloned()
            .ok_or_else(|| not_found("Promotion", namespace, name))
    }

    async fn list_environments(&self, namespace: Option<&str>) -> Result<Vec<Environment>> {
        Ok(self
            .environments
            .lock()
            .unwrap()
            .iter()
            .filter(|((ns, _), _)| namespace.is_none_or(|n| n == ns))
            .map(|(_, env)| env.clone())
            .collect())
    }

    async fn list_promotions(&self, namespace: Option<&str>) -> Result<Vec<Promotion>> {
        Ok(self
            .promotions
            .lock()
            .unwrap()
            .iter()
            .filter(|((ns, _), _)| namespace.is_none_or(|n| n == ns))
            .map(|(_, p)| p.clone())
            .collect())
    }

    async fn update_environment_status(&self, environment: &Environment) -> Result<()> {
        let meta = &environment.metadata;
        let mut environments = self.environments.lock().unwrap();
        let stored = environments
            .get_mut(&key(&meta.namespace, &meta.name))
            .ok_or_else(|| not_found("Environment", &meta.namespace, &meta.name))?;
        stored.status = environment.status.clone();
        self.status_writes
            .lock()
            .unwrap()
            .push(format!("environment/{}/{}", meta.namespace, meta.name));
        Ok(())
    }

    async fn update_promotion_status(&self, promotion: &Promotion) -> Result<()> {
        let meta = &promotion.metadata;
        let mut promotions = self.promotions.lock().unwrap();
        let stored = promotions
            .get_mut(&key(&meta.namespace, &meta.name))
            .ok_or_else(|| not_found("Promotion", &meta.namespace, &meta.name))?;
        stored.status = promotion.status.clone();
        self.status_writes
            .lock()
            .unwrap()
            .push(format!("promotion/{}/{}", meta.namespace, meta.name));
        Ok(())
    }
}

#[async_trait]
impl SecretStore for MemoryStore {
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret> {
        self.secrets
            .lock()
            .unwrap()
            .get(&key(namespace, name))
            .cloned()
            .ok_or_else(|| not_found("Secret", namespace, name))
    }
}
