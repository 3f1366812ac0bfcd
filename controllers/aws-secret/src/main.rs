//! AWS Secret Controller
//!
//! Mirrors AWS Secrets Manager secrets into Kubernetes Secrets:
//! - AWSSecret: names a Secrets Manager secret id and version
//! - Secret: created with the AWSSecret's name and namespace, owned by it,
//!   and overwritten whenever the AWSSecret is reconciled
//!
//! Deleting an AWSSecret garbage-collects its Secret through the owner reference.

mod backoff;
mod builder;
mod cluster;
mod config;
mod controller;
mod error;
mod metrics;
mod reconciler;
mod server;
mod watcher;

#[cfg(test)]
mod test_utils;

use crate::config::Config;
use crate::error::ControllerError;
use controller::Controller;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Both kube and the AWS SDK use rustls; pin the process-wide provider
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        warn!("A rustls crypto provider was already installed");
    }

    info!("Starting AWS Secret Controller");

    let config = Config::from_env()?;

    info!("Configuration:");
    info!("  Namespace: {}", config.namespace.as_deref().unwrap_or("all namespaces"));
    info!("  AWS region: {}", config.aws_region.as_deref().unwrap_or("from provider chain"));
    if let Some(endpoint) = &config.secrets_manager_endpoint {
        info!("  Secrets Manager endpoint: {}", endpoint);
    }
    info!("  Metrics address: {}", config.metrics_addr);
    info!("  Reconcile timeout: {:?}", config.reconcile_timeout);

    let controller = Controller::new(config).await?;
    controller.run().await?;

    Ok(())
}
