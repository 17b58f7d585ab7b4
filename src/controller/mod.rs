//! Delivery loop for reconciles
//!
//! Polls the store, decides which objects are due, and runs their
//! reconciles concurrently with at most one attempt per object at a time.
//! Failed attempts come back with exponential backoff.

mod reconciler;

pub use reconciler::{
    ENVIRONMENT_READY_MESSAGE, PromotionReport, ReconcileAction, Reconciler,
};

use crate::config::ControllerSettings;
use crate::error::{Error, Result};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Identity of a reconcilable object
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ObjectKey {
    /// An Environment
    Environment {
        /// Namespace
        namespace: String,
        /// Name
        name: String,
    },
    /// A Promotion
    Promotion {
        /// Namespace
        namespace: String,
        /// Name
        name: String,
    },
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Environment { namespace, name } => write!(f, "environment {namespace}/{name}"),
            Self::Promotion { namespace, name } => write!(f, "promotion {namespace}/{name}"),
        }
    }
}

/// A listed object and whether its spec changed since it was last observed
struct Candidate {
    key: ObjectKey,
    changed: bool,
}

/// Removes its key from the in-flight set when the attempt ends, even by panic
struct InFlight {
    set: Arc<Mutex<HashSet<ObjectKey>>>,
    key: ObjectKey,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.set
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}

/// Counts from a single pass over every object
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Reconciles that succeeded
    pub succeeded: usize,
    /// Reconciles that failed
    pub failed: usize,
}

/// Schedules reconciles of everything in a store
pub struct Controller {
    reconciler: Arc<Reconciler>,
    settings: ControllerSettings,
    namespace: Option<String>,
}

impl Controller {
    /// Create a controller over every namespace
    pub const fn new(reconciler: Arc<Reconciler>, settings: ControllerSettings) -> Self {
        Self {
            reconciler,
            settings,
            namespace: None,
        }
    }

    /// Restrict the controller to one namespace
    #[must_use]
    pub fn with_namespace(mut self, namespace: Option<String>) -> Self {
        self.namespace = namespace;
        self
    }

    async fn candidates(&self) -> Result<Vec<Candidate>> {
        let store = self.reconciler.resources();
        let ns = self.namespace.as_deref();
        let mut out = Vec::new();

        for env in store.list_environments(ns).await? {
            out.push(Candidate {
                changed: env.metadata.generation > env.status.observed_generation,
                key: ObjectKey::Environment {
                    namespace: env.metadata.namespace,
                    name: env.metadata.name,
                },
            });
        }
        for promotion in store.list_promotions(ns).await? {
            out.push(Candidate {
                changed: promotion.metadata.generation > promotion.status.observed_generation,
                key: ObjectKey::Promotion {
                    namespace: promotion.metadata.namespace,
                    name: promotion.metadata.name,
                },
            });
        }
        Ok(out)
    }

    async fn attempt(
        reconciler: &Reconciler,
        key: &ObjectKey,
        timeout: Duration,
    ) -> Result<ReconcileAction> {
        if let Ok(result) = tokio::time::timeout(timeout, reconciler.reconcile(key)).await {
            result
        } else {
            let err = Error::Timeout(timeout.as_secs());
            reconciler.record_failure(key, &err).await;
            Err(err)
        }
    }

    /// Reconcile every object once: Environments first, then Promotions
    pub async fn run_once(&self) -> Result<RunSummary> {
        let timeout = Duration::from_secs(self.settings.reconcile_timeout_secs);
        let mut summary = RunSummary::default();

        for candidate in self.candidates().await? {
            match Self::attempt(&self.reconciler, &candidate.key, timeout).await {
                Ok(_) => summary.succeeded += 1,
                Err(e) => {
                    warn!(object = %candidate.key, error = %e, "Reconcile failed");
                    summary.failed += 1;
                }
            }
        }
        info!(succeeded = summary.succeeded, failed = summary.failed, "Pass complete");
        Ok(summary)
    }

    /// Run until `shutdown` resolves, then wait for in-flight attempts
    #[allow(clippy::too_many_lines)]
    pub async fn run<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let timeout = Duration::from_secs(self.settings.reconcile_timeout_secs);
        let semaphore = Arc::new(Semaphore::new(self.settings.max_concurrent_reconciles));
        let in_flight: Arc<Mutex<HashSet<ObjectKey>>> = Arc::default();
        let mut tasks: JoinSet<(ObjectKey, Result<ReconcileAction>)> = JoinSet::new();
        let mut due: HashMap<ObjectKey, Option<Instant>> = HashMap::new();
        let mut failures: HashMap<ObjectKey, u32> = HashMap::new();
        let mut ticker =
            tokio::time::interval(Duration::from_secs(self.settings.poll_interval_secs.max(1)));

        info!(
            concurrency = self.settings.max_concurrent_reconciles,
            poll_secs = self.settings.poll_interval_secs,
            "Controller started"
        );
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }
                _ = ticker.tick() => {
                    let candidates = match self.candidates().await {
                        Ok(c) => c,
                        Err(e) => {
                            warn!(error = %e, "Failed to list objects");
                            continue;
                        }
                    };
                    let now = Instant::now();
                    let listed: HashSet<ObjectKey> =
                        candidates.iter().map(|c| c.key.clone()).collect();
                    due.retain(|k, _| listed.contains(k));
                    failures.retain(|k, _| listed.contains(k));

                    for candidate in candidates {
                        // A spec change jumps the queue, but not a failure backoff
                        let is_due = (candidate.changed && !failures.contains_key(&candidate.key))
                            || match due.get(&candidate.key) {
                                None => true,
                                Some(Some(at)) => *at <= now,
                                Some(None) => false,
                            };
                        if !is_due {
                            continue;
                        }
                        {
                            let mut running = in_flight.lock().unwrap_or_else(PoisonError::into_inner);
                            if !running.insert(candidate.key.clone()) {
                                continue;
                            }
                        }

                        // Overwritten on completion; covers attempts that never report back
                        due.insert(
                            candidate.key.clone(),
                            Some(now + self.settings.backoff(u32::MAX)),
                        );
                        debug!(object = %candidate.key, "Dispatching reconcile");

                        let guard = InFlight {
                            set: Arc::clone(&in_flight),
                            key: candidate.key.clone(),
                        };
                        let reconciler = Arc::clone(&self.reconciler);
                        let semaphore = Arc::clone(&semaphore);
                        let key = candidate.key;
                        tasks.spawn(async move {
                            let _guard = guard;
                            let _permit = semaphore.acquire_owned().await.ok();
                            let result = Self::attempt(&reconciler, &key, timeout).await;
                            (key, result)
                        });
                    }
                }
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    self.complete(joined, &mut due, &mut failures);
                }
            }
        }

        while let Some(joined) = tasks.join_next().await {
            self.complete(joined, &mut due, &mut failures);
        }
        info!("Controller stopped");
        Ok(())
    }

    fn complete(
        &self,
        joined: std::result::Result<(ObjectKey, Result<ReconcileAction>), tokio::task::JoinError>,
        due: &mut HashMap<ObjectKey, Option<Instant>>,
        failures: &mut HashMap<ObjectKey, u32>,
    ) {
        let (key, result) = match joined {
            Ok(pair) => pair,
            Err(e) => {
                error!(error = %e, "Reconcile task panicked");
                return;
            }
        };

        let now = Instant::now();
        match result {
            Ok(action) => {
                failures.remove(&key);
                due.insert(key, action.requeue_after.map(|d| now + d));
            }
            Err(e) => {
                let count = failures.entry(key.clone()).or_insert(0);
                *count = count.saturating_add(1);
                let delay = self.settings.backoff(*count);
                warn!(
                    object = %key,
                    failures = *count,
                    retry_secs = delay.as_secs(),
                    error = %e,
                    "Reconcile failed, backing off"
                );
                due.insert(key, Some(now + delay));
            }
        }
    }
}

/// Resolves on Ctrl-C
pub async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}
