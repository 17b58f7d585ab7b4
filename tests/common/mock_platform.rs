//! Mock platform service for testing
//!
//! These are test utilities - not all may be used in every test binary.

#![allow(dead_code)]

use async_trait::async_trait;
use gitops_promoter::error::{Error, Result};
use gitops_promoter::platform::{PlatformConnector, PlatformService};
use gitops_promoter::store::SecretStore;
use gitops_promoter::types::{
    Environment, Platform, PlatformConfig, PullRequest, PullRequestEdit,
};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Call record for `create_pull_request`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatePrCall {
    pub title: String,
    pub head: String,
    pub base: String,
    pub body: String,
}

/// Call record for `edit_pull_request`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditPrCall {
    pub number: u64,
    pub title: Option<String>,
}

/// Simple mock platform service for testing
///
/// This manually implements `PlatformService` rather than using mockall.
///
/// Features:
/// - Auto-incrementing PR numbers
/// - Open PR list that can be edited out of band (`close_pr`)
/// - Call tracking for verification
/// - Error injection for failure path testing
pub struct MockPlatformService {
    config: PlatformConfig,
    next_pr_number: AtomicU64,
    open: Mutex<BTreeMap<u64, PullRequest>>,
    // Call tracking
    list_calls: AtomicU64,
    get_calls: Mutex<Vec<u64>>,
    create_calls: Mutex<Vec<CreatePrCall>>,
    edit_calls: Mutex<Vec<EditPrCall>>,
    // Error injection
    error_on_list: Mutex<Option<String>>,
    error_on_create: Mutex<Option<String>>,
    // Holds `list_pull_requests` until a permit is added
    list_gate: Mutex<Option<Arc<tokio::sync::Semaphore>>>,
}

impl Default for MockPlatformService {
    fn default() -> Self {
        Self::with_config(PlatformConfig {
            platform: Platform::GitHub,
            owner: "test".to_string(),
            repo: "deploy".to_string(),
            host: None,
        })
    }
}

impl MockPlatformService {
    /// Create a new mock with the given config
    pub fn with_config(config: PlatformConfig) -> Self {
        Self {
            config,
            next_pr_number: AtomicU64::new(1),
            open: Mutex::new(BTreeMap::new()),
            list_calls: AtomicU64::new(0),
            get_calls: Mutex::new(Vec::new()),
            create_calls: Mutex::new(Vec::new()),
            edit_calls: Mutex::new(Vec::new()),
            error_on_list: Mutex::new(None),
            error_on_create: Mutex::new(None),
            list_gate: Mutex::new(None),
        }
    }

    // === Out-of-band provider state ===

    /// Close or merge a PR behind the engine's back
    pub fn close_pr(&self, number: u64) {
        self.open.lock().unwrap().remove(&number);
    }

    /// Add an open PR not created through the mock
    pub fn insert_open_pr(&self, pr: PullRequest) {
        self.open.lock().unwrap().insert(pr.number, pr);
    }

    /// Currently open PRs
    pub fn open_prs(&self) -> Vec<PullRequest> {
        self.open.lock().unwrap().values().cloned().collect()
    }

    // === Error injection methods ===

    /// Make `list_pull_requests` return an error
    pub fn fail_list(&self, msg: &str) {
        *self.error_on_list.lock().unwrap() = Some(msg.to_string());
    }

    /// Make `create_pull_request` return an error
    pub fn fail_create(&self, msg: &str) {
        *self.error_on_create.lock().unwrap() = Some(msg.to_string());
    }

    /// Park every `list_pull_requests` call until the returned gate gets a permit
    pub fn gate_list(&self) -> Arc<tokio::sync::Semaphore> {
        let gate = Arc::new(tokio::sync::Semaphore::new(0));
        *self.list_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    // === Call verification methods ===

    /// Number of `list_pull_requests` calls
    pub fn list_call_count(&self) -> u64 {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Numbers passed to `get_pull_request`
    pub fn get_calls(&self) -> Vec<u64> {
        self.get_calls.lock().unwrap().clone()
    }

    /// All `create_pull_request` calls
    pub fn create_calls(&self) -> Vec<CreatePrCall> {
        self.create_calls.lock().unwrap().clone()
    }

    /// All `edit_pull_request` calls
    pub fn edit_calls(&self) -> Vec<EditPrCall> {
        self.edit_calls.lock().unwrap().clone()
    }

    /// Assert that `create_pull_request` was called with specific head and base
    pub fn assert_create_called(&self, head: &str, base: &str) {
        let calls = self.create_calls();
        assert!(
            calls.iter().any(|c| c.head == head && c.base == base),
            "Expected create_pull_request({head}, {base}) but got: {calls:?}"
        );
    }
}

#[async_trait]
impl PlatformService for MockPlatformService {
    async fn list_pull_requests(&self) -> Result<Vec<PullRequest>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.list_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            let _permit = gate.acquire().await.unwrap();
        }
        if let Some(msg) = self.error_on_list.lock().unwrap().as_ref() {
            return Err(Error::GitHubApi(msg.clone()));
        }
        Ok(self.open_prs())
    }

    async fn get_pull_request(&self, number: u64) -> Result<PullRequest> {
        self.get_calls.lock().unwrap().push(number);
        self.open
            .lock()
            .unwrap()
            .get(&number)
            .cloned()
            .ok_or_else(|| Error::GitHubApi(format!("pull request #{number} not found")))
    }

    async fn create_pull_request(
        &self,
        title: &str,
        head: &str,
        base: &str,
        body: &str,
    ) -> Result<PullRequest> {
        self.create_calls.lock().unwrap().push(CreatePrCall {
            title: title.to_string(),
            head: head.to_string(),
            base: base.to_string(),
            body: body.to_string(),
        });

        if let Some(msg) = self.error_on_create.lock().unwrap().as_ref() {
            return Err(Error::GitHubApi(msg.clone()));
        }

        let number = self.next_pr_number.fetch_add(1, Ordering::SeqCst);
        let pr = PullRequest {
            number,
            html_url: format!("https://github.com/test/deploy/pull/{number}"),
            base_ref: base.to_string(),
            head_ref: head.to_string(),
            title: title.to_string(),
        };
        self.open.lock().unwrap().insert(number, pr.clone());
        Ok(pr)
    }

    async fn edit_pull_request(&self, number: u64, edit: &PullRequestEdit) -> Result<PullRequest> {
        self.edit_calls.lock().unwrap().push(EditPrCall {
            number,
            title: edit.title.clone(),
        });

        let mut open = self.open.lock().unwrap();
        let pr = open
            .get_mut(&number)
            .ok_or_else(|| Error::GitHubApi(format!("pull request #{number} not found")))?;
        if let Some(title) = &edit.title {
            pr.title.clone_from(title);
        }
        Ok(pr.clone())
    }

    fn config(&self) -> &PlatformConfig {
        &self.config
    }
}

/// Connector handing out one shared mock for every Environment
#[derive(Clone, Default)]
pub struct MockConnector {
    pub platform: Arc<MockPlatformService>,
    connected: Arc<Mutex<Vec<String>>>,
}

impl MockConnector {
    /// Environments connected to, in order
    pub fn connected(&self) -> Vec<String> {
        self.connected.lock().unwrap().clone()
    }
}

#[async_trait]
impl PlatformConnector for MockConnector {
    async fn connect(
        &self,
        environment: &Environment,
        _secrets: &dyn SecretStore,
    ) -> Result<Arc<dyn PlatformService>> {
        self.connected
            .lock()
            .unwrap()
            .push(environment.name().to_string());
        Ok(self.platform.clone())
    }
}
