//! Main controller implementation.
//!
//! Wires the Kubernetes client, the Secrets Manager client, the reconciler
//! and the metrics together, then runs the watcher and the probe server
//! until shutdown.

use crate::builder::SecretBuilder;
use crate::cluster::KubeClusterClient;
use crate::config::Config;
use crate::error::ControllerError;
use crate::metrics::Metrics;
use crate::reconciler::AwsSecretReconciler;
use crate::server::{self, ProbeState};
use crate::watcher::{Context, Watcher};
use kube::Client;
use secrets_manager_client::{SecretsManagerClient, SecretsManagerClientTrait};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Main controller for AWSSecret management.
#[derive(Debug)]
pub struct Controller {
    shutdown: CancellationToken,
    watcher: JoinHandle<Result<(), ControllerError>>,
    server: JoinHandle<Result<(), ControllerError>>,
}

impl Controller {
    /// Creates the clients and starts the watcher and probe server.
    pub async fn new(config: Config) -> Result<Self, ControllerError> {
        info!("Initializing AWS Secret Controller");

        let kube_client = Client::try_default().await?;
        let secrets_manager = SecretsManagerClient::new(
            config.aws_region.clone(),
            config.secrets_manager_endpoint.clone(),
        )
        .await;
        info!(
            region = secrets_manager.region().unwrap_or("unset"),
            "Secrets Manager client ready"
        );

        let reconciler = AwsSecretReconciler::new(
            Arc::new(KubeClusterClient::new(kube_client.clone())),
            SecretBuilder::new(Arc::new(secrets_manager)),
        );

        let shutdown = CancellationToken::new();
        let metrics = Metrics::new()?;
        let probes = ProbeState::new(metrics.clone());
        let context = Arc::new(Context::new(
            Arc::new(reconciler),
            metrics,
            shutdown.clone(),
            &config,
        ));

        let watcher = Watcher::new(kube_client, &config, context, probes.clone());
        let watcher = tokio::spawn(watcher.run());
        let server = tokio::spawn(server::run(config.metrics_addr, probes, shutdown.clone()));

        Ok(Self {
            shutdown,
            watcher,
            server,
        })
    }

    /// Runs the controller until ctrl-c or until a task exits.
    pub async fn run(mut self) -> Result<(), ControllerError> {
        info!("AWS Secret Controller running");

        let result = tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                signal.map_err(ControllerError::from)
            }
            result = &mut self.watcher => {
                flatten("watcher", result)
            }
            result = &mut self.server => {
                flatten("probe server", result)
            }
        };

        // Drain whatever is still running
        self.shutdown.cancel();
        if !self.watcher.is_finished() {
            flatten("watcher", self.watcher.await)?;
        }
        if !self.server.is_finished() {
            flatten("probe server", self.server.await)?;
        }

        info!("AWS Secret Controller stopped");
        result
    }
}

fn flatten(
    task: &str,
    joined: Result<Result<(), ControllerError>, tokio::task::JoinError>,
) -> Result<(), ControllerError> {
    joined.map_err(|e| ControllerError::Watch(format!("{task} task panicked: {e}")))?
}
