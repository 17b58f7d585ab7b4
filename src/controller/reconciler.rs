//! Promotion and Environment reconcilers
//!
//! Each call loads the object, does the work, and always writes the
//! resulting status back before returning, error or not.

use crate::auth::{CredentialResolver, HostKeyPolicy};
use crate::config::{ControllerSettings, Settings};
use crate::controller::ObjectKey;
use crate::error::{Error, Result};
use crate::platform::PlatformConnector;
use crate::promote::{NoopProgress, PromotionEngine, PromotionOutcome, ProgressCallback};
use crate::repo::{GitWorkspace, blocking};
use crate::store::{ResourceStore, SecretStore};
use crate::types::{Environment, Promotion, SUCCEEDED_REASON};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Ready message after a successful Environment check
pub const ENVIRONMENT_READY_MESSAGE: &str = "Authentication works, cloned repo successfully.";

/// What the delivery loop should do next with an object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReconcileAction {
    /// Reconcile again after this delay; `None` waits for a spec change
    pub requeue_after: Option<Duration>,
}

impl ReconcileAction {
    /// Requeue after `delay`
    pub const fn requeue(delay: Duration) -> Self {
        Self {
            requeue_after: Some(delay),
        }
    }

    /// Do not requeue
    pub const fn done() -> Self {
        Self {
            requeue_after: None,
        }
    }
}

/// Result of a Promotion reconcile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromotionReport {
    /// Next scheduling step
    pub action: ReconcileAction,
    /// Engine outcome; `None` when the Promotion no longer exists
    pub outcome: Option<PromotionOutcome>,
}

/// Reconciles Promotions and Environments against a store
pub struct Reconciler {
    resources: Arc<dyn ResourceStore>,
    secrets: Arc<dyn SecretStore>,
    connector: Arc<dyn PlatformConnector>,
    engine: PromotionEngine,
    settings: ControllerSettings,
}

impl Reconciler {
    /// Build a reconciler from operator settings
    pub fn new(
        resources: Arc<dyn ResourceStore>,
        secrets: Arc<dyn SecretStore>,
        connector: Arc<dyn PlatformConnector>,
        settings: &Settings,
    ) -> Result<Self> {
        let host_keys = HostKeyPolicy::from_fingerprints(&settings.ssh.known_host_fingerprints)?;
        let engine = PromotionEngine::new(settings, CredentialResolver::new(host_keys))?;
        Ok(Self {
            resources,
            secrets,
            connector,
            engine,
            settings: settings.controller.clone(),
        })
    }

    /// Resource store backing this reconciler
    pub fn resources(&self) -> &dyn ResourceStore {
        self.resources.as_ref()
    }

    /// Reconcile whichever object `key` names
    pub async fn reconcile(&self, key: &ObjectKey) -> Result<ReconcileAction> {
        match key {
            ObjectKey::Environment { namespace, name } => {
                self.reconcile_environment(namespace, name).await
            }
            ObjectKey::Promotion { namespace, name } => Ok(self
                .reconcile_promotion(namespace, name, &NoopProgress)
                .await?
                .action),
        }
    }

    /// Run one promotion attempt and record its status
    pub async fn reconcile_promotion(
        &self,
        namespace: &str,
        name: &str,
        progress: &dyn ProgressCallback,
    ) -> Result<PromotionReport> {
        let started = Instant::now();
        let mut promotion = match self.resources.get_promotion(namespace, name).await {
            Ok(p) => p,
            Err(e) if e.is_not_found() => {
                debug!(namespace, promotion = name, "Promotion gone, nothing to do");
                return Ok(PromotionReport {
                    action: ReconcileAction::done(),
                    outcome: None,
                });
            }
            Err(e) => return Err(e),
        };
        info!(namespace, promotion = name, "Reconciling promotion");

        let result = self.run_promotion(&promotion, progress).await;
        promotion.status.observed_generation = promotion.metadata.generation;

        match result {
            Ok(outcome) => {
                outcome.apply(&mut promotion);
                self.resources.update_promotion_status(&promotion).await?;

                let delay = if outcome.is_waiting() {
                    self.settings.readiness_requeue()
                } else {
                    self.settings.steady_state_requeue()
                };
                info!(
                    namespace,
                    promotion = name,
                    duration_ms = started.elapsed().as_millis(),
                    requeue_secs = delay.as_secs(),
                    "Promotion reconcile finished"
                );
                Ok(PromotionReport {
                    action: ReconcileAction::requeue(delay),
                    outcome: Some(outcome),
                })
            }
            Err(err) => {
                promotion.mark_not_ready(err.reason(), &err.to_string());
                if let Err(write_err) = self.resources.update_promotion_status(&promotion).await {
                    warn!(namespace, promotion = name, error = %write_err, "Failed to write status");
                }
                warn!(
                    namespace,
                    promotion = name,
                    reason = err.reason(),
                    error = %err,
                    duration_ms = started.elapsed().as_millis(),
                    "Promotion reconcile failed"
                );
                Err(err)
            }
        }
    }

    async fn run_promotion(
        &self,
        promotion: &Promotion,
        progress: &dyn ProgressCallback,
    ) -> Result<PromotionOutcome> {
        let namespace = &promotion.metadata.namespace;
        let source = self
            .resources
            .get_environment(namespace, &promotion.spec.source_environment_ref.name)
            .await?;
        let target = self
            .resources
            .get_environment(namespace, &promotion.spec.target_environment_ref.name)
            .await?;

        self.engine
            .promote(
                promotion,
                &source,
                &target,
                self.secrets.as_ref(),
                self.connector.as_ref(),
                progress,
            )
            .await
    }

    /// Check that an Environment's repository can be cloned
    pub async fn reconcile_environment(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<ReconcileAction> {
        let started = Instant::now();
        let mut environment = match self.resources.get_environment(namespace, name).await {
            Ok(env) => env,
            Err(e) if e.is_not_found() => return Ok(ReconcileAction::done()),
            Err(e) => return Err(e),
        };
        debug!(namespace, environment = name, "Reconciling environment");

        let result = self.check_environment(&environment).await;
        environment.status.observed_generation = environment.metadata.generation;

        match result {
            Ok(commit) => {
                environment.mark_ready(SUCCEEDED_REASON, ENVIRONMENT_READY_MESSAGE, &commit);
                self.resources.update_environment_status(&environment).await?;
                info!(
                    namespace,
                    environment = name,
                    commit = %commit,
                    duration_ms = started.elapsed().as_millis(),
                    "Environment ready"
                );
                Ok(ReconcileAction::requeue(self.settings.environment_requeue()))
            }
            Err(err) => {
                environment.mark_not_ready(err.reason(), &err.to_string());
                if let Err(write_err) = self.resources.update_environment_status(&environment).await
                {
                    warn!(namespace, environment = name, error = %write_err, "Failed to write status");
                }
                warn!(namespace, environment = name, error = %err, "Environment check failed");
                Err(err)
            }
        }
    }

    async fn check_environment(&self, environment: &Environment) -> Result<String> {
        let access = self
            .engine
            .credentials()
            .resolve(environment, self.secrets.as_ref())
            .await?;
        let workspace = GitWorkspace::spawn_provision(
            access,
            environment.branch(),
            self.engine.workdir(),
            &environment.metadata,
        )
        .await?;
        let commit = workspace.head_commit()?;
        blocking(move || workspace.release()).await?;
        Ok(commit)
    }

    /// Record a failure that happened outside the reconcile itself (e.g. a timeout)
    pub async fn record_failure(&self, key: &ObjectKey, err: &Error) {
        let written = match key {
            ObjectKey::Promotion { namespace, name } => {
                match self.resources.get_promotion(namespace, name).await {
                    Ok(mut promotion) => {
                        promotion.status.observed_generation = promotion.metadata.generation;
                        promotion.mark_not_ready(err.reason(), &err.to_string());
                        self.resources.update_promotion_status(&promotion).await
                    }
                    Err(e) => Err(e),
                }
            }
            ObjectKey::Environment { namespace, name } => {
                match self.resources.get_environment(namespace, name).await {
                    Ok(mut environment) => {
                        environment.status.observed_generation = environment.metadata.generation;
                        environment.mark_not_ready(err.reason(), &err.to_string());
                        self.resources.update_environment_status(&environment).await
                    }
                    Err(e) => Err(e),
                }
            }
        };
        if let Err(e) = written {
            warn!(object = %key, error = %e, "Failed to record failure");
        }
    }
}
