//! Declarative resource and secret stores
//!
//! The reconcilers only read Environment/Promotion records, write their
//! `status`, and look up secrets. Anything that can do that can back them.

mod file;

pub use file::FileStore;

use crate::error::Result;
use crate::types::{Environment, Promotion};
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Store of Environment and Promotion records
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Fetch an Environment by namespace and name
    async fn get_environment(&self, namespace: &str, name: &str) -> Result<Environment>;

    /// Fetch a Promotion by namespace and name
    async fn get_promotion(&self, namespace: &str, name: &str) -> Result<Promotion>;

    /// List all Environments, optionally restricted to one namespace
    async fn list_environments(&self, namespace: Option<&str>) -> Result<Vec<Environment>>;

    /// List all Promotions, optionally restricted to one namespace
    async fn list_promotions(&self, namespace: Option<&str>) -> Result<Vec<Promotion>>;

    /// Persist only the `status` of an Environment
    async fn update_environment_status(&self, environment: &Environment) -> Result<()>;

    /// Persist only the `status` of a Promotion
    async fn update_promotion_status(&self, promotion: &Promotion) -> Result<()>;
}

/// Opaque secret payload keyed by entry name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Secret {
    /// Raw bytes per key
    pub data: BTreeMap<String, Vec<u8>>,
}

impl Secret {
    /// Raw value of `key`
    pub fn get(&self, key: &str) -> Option<&[u8]> {
        self.data.get(key).map(Vec::as_slice)
    }
}

/// Secret lookup
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Fetch a secret by namespace and name
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret>;
}
