//! Kubernetes resource watcher.
//!
//! Drives reconciliation with `kube_runtime::Controller`: AWSSecrets are
//! watched directly and labelled Secrets are watched as owned objects, so
//! editing or deleting a produced Secret triggers its AWSSecret again.
//!
//! Each reconciliation runs under a deadline and a child of the shutdown
//! token. Failures are requeued with a per-object Fibonacci backoff.

use crate::backoff::FibonacciBackoff;
use crate::builder::{APP_LABEL, APP_NAME};
use crate::cluster::ObjectIdentity;
use crate::config::Config;
use crate::error::ControllerError;
use crate::metrics::Metrics;
use crate::reconciler::{Outcome, Reconcile};
use crate::server::ProbeState;
use crds::AWSSecret;
use futures::StreamExt;
use k8s_openapi::api::core::v1::Secret;
use kube::{Api, Client};
use kube_runtime::controller::{self, Action, Config as ControllerConfig};
use kube_runtime::{Controller, watcher};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// State shared by every reconciliation run by the watcher
pub struct Context {
    reconciler: Arc<dyn Reconcile>,
    metrics: Metrics,
    shutdown: CancellationToken,
    reconcile_timeout: Duration,
    backoff_min: Duration,
    backoff_max: Duration,
    backoffs: Mutex<HashMap<ObjectIdentity, FibonacciBackoff>>,
}

impl Context {
    /// Create a context with an empty backoff table
    pub fn new(
        reconciler: Arc<dyn Reconcile>,
        metrics: Metrics,
        shutdown: CancellationToken,
        config: &Config,
    ) -> Self {
        Self {
            reconciler,
            metrics,
            shutdown,
            reconcile_timeout: config.reconcile_timeout,
            backoff_min: config.backoff_min,
            backoff_max: config.backoff_max,
            backoffs: Mutex::new(HashMap::new()),
        }
    }

    /// Run one reconciliation under the deadline and record it.
    pub async fn reconcile_once(&self, id: &ObjectIdentity) -> Result<Outcome, ControllerError> {
        let cancel = self.shutdown.child_token();
        let started = Instant::now();

        let result =
            match tokio::time::timeout(self.reconcile_timeout, self.reconciler.reconcile(id, &cancel))
                .await
            {
                Ok(result) => result,
                Err(_) => {
                    cancel.cancel();
                    Err(ControllerError::Timeout {
                        identity: id.clone(),
                        after: self.reconcile_timeout,
                    })
                }
            };

        self.metrics.observe(result.as_ref().copied(), started.elapsed());
        if let Ok(outcome) = &result {
            self.succeeded(id, *outcome);
        }
        result
    }

    fn succeeded(&self, id: &ObjectIdentity, outcome: Outcome) {
        let mut backoffs = self.backoffs.lock().unwrap_or_else(PoisonError::into_inner);
        match outcome {
            Outcome::SourceDeleted => {
                backoffs.remove(id);
            }
            Outcome::Created | Outcome::Updated => {
                if let Some(backoff) = backoffs.get_mut(id) {
                    backoff.reset();
                }
            }
        }
    }

    /// Drop the retry state of an object that left the watch cache
    pub fn forget(&self, id: &ObjectIdentity) {
        self.backoffs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
    }

    /// Delay before retrying `id` after `err`.
    pub fn retry_delay(&self, id: &ObjectIdentity, err: &ControllerError) -> Duration {
        let mut backoffs = self.backoffs.lock().unwrap_or_else(PoisonError::into_inner);
        let backoff = backoffs
            .entry(id.clone())
            .or_insert_with(|| FibonacciBackoff::new(self.backoff_min, self.backoff_max));
        if err.needs_intervention() {
            backoff.max_backoff()
        } else {
            backoff.next_backoff()
        }
    }
}

async fn reconcile(obj: Arc<AWSSecret>, ctx: Arc<Context>) -> Result<Action, ControllerError> {
    let id = ObjectIdentity::of(obj.as_ref());
    ctx.reconcile_once(&id).await?;
    Ok(Action::await_change())
}

fn error_policy(obj: Arc<AWSSecret>, err: &ControllerError, ctx: Arc<Context>) -> Action {
    let id = ObjectIdentity::of(obj.as_ref());
    let delay = ctx.retry_delay(&id, err);
    if err.needs_intervention() {
        error!(
            aws_secret = %id,
            error_kind = err.kind(),
            retry_in = ?delay,
            "Reconciliation failed and will not recover without a change: {}",
            err
        );
    } else {
        warn!(
            aws_secret = %id,
            error_kind = err.kind(),
            retry_in = ?delay,
            "Reconciliation failed: {}",
            err
        );
    }
    Action::requeue(delay)
}

fn identity_of_ref(name: &str, namespace: Option<&str>) -> ObjectIdentity {
    ObjectIdentity::new(name, namespace.unwrap_or("default"))
}

/// Watches AWSSecrets and the Secrets they own
pub struct Watcher {
    client: Client,
    namespace: Option<String>,
    debounce: Duration,
    concurrency: u16,
    context: Arc<Context>,
    probes: ProbeState,
}

impl Watcher {
    /// Create a watcher for the namespace in `config`
    pub fn new(client: Client, config: &Config, context: Arc<Context>, probes: ProbeState) -> Self {
        Self {
            client,
            namespace: config.namespace.clone(),
            debounce: config.debounce,
            concurrency: config.concurrency,
            context,
            probes,
        }
    }

    fn api<K>(&self) -> Api<K>
    where
        K: kube::Resource<Scope = kube::core::NamespaceResourceScope>,
        K::DynamicType: Default,
    {
        match &self.namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        }
    }

    /// Run until the shutdown token is cancelled
    pub async fn run(self) -> Result<(), ControllerError> {
        let aws_secrets: Api<AWSSecret> = self.api();
        let secrets: Api<Secret> = self.api();
        let owned_selector = format!("{APP_LABEL}={APP_NAME}");

        info!(
            namespace = self.namespace.as_deref().unwrap_or("all namespaces"),
            "Starting AWSSecret watcher"
        );

        let controller_config = ControllerConfig::default()
            .debounce(self.debounce)
            .concurrency(self.concurrency);
        let shutdown = self.context.shutdown.clone();

        self.probes.set_ready(true);
        Controller::new(aws_secrets, watcher::Config::default())
            .owns(secrets, watcher::Config::default().labels(&owned_selector))
            .with_config(controller_config)
            .graceful_shutdown_on(shutdown.cancelled_owned())
            .run(reconcile, error_policy, self.context.clone())
            .for_each(|res| {
                let context = self.context.clone();
                async move {
                    match res {
                        Ok((obj, _)) => debug!(aws_secret = %obj, "Reconcile finished"),
                        // Already logged by the error policy
                        Err(controller::Error::ReconcilerFailed(_, _)) => {}
                        // Deleted before its queued reconcile ran; reconcile and
                        // error_policy are never called for it again
                        Err(controller::Error::ObjectNotFound(obj)) => {
                            let id = identity_of_ref(&obj.name, obj.namespace.as_deref());
                            debug!(aws_secret = %id, "AWSSecret left the cache");
                            context.forget(&id);
                        }
                        Err(e) => warn!(error = %e, "AWSSecret controller error"),
                    }
                }
            })
            .await;
        self.probes.set_ready(false);

        info!("AWSSecret watcher stopped");
        Ok(())
    }
}
