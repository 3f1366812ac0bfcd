//! AWSSecret reconciliation.
//!
//! One reconciliation fetches the AWSSecret, builds the desired Secret from
//! Secrets Manager and then creates or fully replaces the Secret with the
//! same name and namespace. The reconciler performs no retries; the watcher
//! decides when to run it again.

use crate::builder::SecretBuilder;
use crate::cluster::{ClusterClient, ClusterError, Lookup, ObjectIdentity, set_controller_reference};
use crate::error::{ControllerError, Stage};
use crds::AWSSecret;
use k8s_openapi::api::core::v1::Secret;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Terminal result of a successful reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The Secret did not exist and was created
    Created,
    /// An existing Secret was overwritten
    Updated,
    /// The AWSSecret is gone; nothing was written
    SourceDeleted,
}

impl Outcome {
    /// Metric label of the outcome
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::SourceDeleted => "source_deleted",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Something that can bring one AWSSecret's Secret up to date
#[async_trait::async_trait]
pub trait Reconcile: Send + Sync {
    /// Reconcile the AWSSecret `id`, stopping early once `cancel` fires
    async fn reconcile(
        &self,
        id: &ObjectIdentity,
        cancel: &CancellationToken,
    ) -> Result<Outcome, ControllerError>;
}

/// Reconciles AWSSecrets against a cluster and Secrets Manager
pub struct AwsSecretReconciler {
    cluster: Arc<dyn ClusterClient>,
    builder: SecretBuilder,
}

impl AwsSecretReconciler {
    /// Create a reconciler over a cluster client and a Secret builder
    pub fn new(cluster: Arc<dyn ClusterClient>, builder: SecretBuilder) -> Self {
        Self { cluster, builder }
    }

    /// Fetch the existing Secret, treating any failure as a `FetchTarget` error
    async fn fetch_target(
        &self,
        id: &ObjectIdentity,
        cancel: &CancellationToken,
    ) -> Result<Lookup<Secret>, ControllerError> {
        guarded(id, Stage::FetchTarget, cancel, self.cluster.get_secret(id))
            .await?
            .map_err(|source| cluster_error(id, Stage::FetchTarget, source))
    }

    /// Overwrite `existing` with the candidate's labels and data and persist it.
    ///
    /// Metadata the operator does not own (annotations, other owner references,
    /// the resourceVersion used for the conflict check) is carried over.
    async fn update(
        &self,
        id: &ObjectIdentity,
        owner: &AWSSecret,
        mut existing: Secret,
        candidate: Secret,
        cancel: &CancellationToken,
    ) -> Result<Outcome, ControllerError> {
        existing.metadata.labels = candidate.metadata.labels;
        existing.data = candidate.data;
        existing.string_data = None;
        if existing.type_.is_none() {
            existing.type_ = candidate.type_;
        }
        set_controller_reference(owner, &mut existing).map_err(|e| ControllerError::Ownership {
            identity: id.clone(),
            reason: e.to_string(),
        })?;

        guarded(id, Stage::UpdateTarget, cancel, self.cluster.replace_secret(&existing))
            .await?
            .map_err(|source| cluster_error(id, Stage::UpdateTarget, source))?;
        Ok(Outcome::Updated)
    }
}

#[async_trait::async_trait]
impl Reconcile for AwsSecretReconciler {
    async fn reconcile(
        &self,
        id: &ObjectIdentity,
        cancel: &CancellationToken,
    ) -> Result<Outcome, ControllerError> {
        debug!(aws_secret = %id, "Reconciling AWSSecret");

        let fetched = guarded(id, Stage::FetchSource, cancel, self.cluster.get_aws_secret(id))
            .await?
            .map_err(|source| cluster_error(id, Stage::FetchSource, source))?;
        let aws_secret = match fetched {
            Lookup::Found(aws_secret) => aws_secret,
            Lookup::Absent => {
                info!(aws_secret = %id, "AWSSecret no longer exists, nothing to reconcile");
                return Ok(Outcome::SourceDeleted);
            }
        };

        let reference = &aws_secret.spec.secrets_manager_ref;
        reference
            .validate()
            .map_err(|e| ControllerError::InvalidSpec {
                identity: id.clone(),
                reason: e.to_string(),
            })?;

        let payload = guarded(
            id,
            Stage::BuildSecret,
            cancel,
            self.builder.build(&reference.secret_id, &reference.version_id),
        )
        .await?
        .map_err(|source| ControllerError::Build {
            identity: id.clone(),
            source,
        })?;

        let mut candidate = payload.into_secret(id);
        set_controller_reference(&aws_secret, &mut candidate).map_err(|e| {
            ControllerError::Ownership {
                identity: id.clone(),
                reason: e.to_string(),
            }
        })?;

        let outcome = match self.fetch_target(id, cancel).await? {
            Lookup::Found(existing) => {
                self.update(id, &aws_secret, existing, candidate, cancel).await?
            }
            Lookup::Absent => {
                let created = guarded(
                    id,
                    Stage::CreateTarget,
                    cancel,
                    self.cluster.create_secret(&candidate),
                )
                .await?;
                match created {
                    Ok(_) => Outcome::Created,
                    Err(ClusterError::AlreadyExists(message)) => {
                        warn!(aws_secret = %id, "Secret appeared while creating it, updating instead");
                        match self.fetch_target(id, cancel).await? {
                            Lookup::Found(existing) => {
                                self.update(id, &aws_secret, existing, candidate, cancel).await?
                            }
                            Lookup::Absent => {
                                return Err(cluster_error(
                                    id,
                                    Stage::CreateTarget,
                                    ClusterError::AlreadyExists(message),
                                ));
                            }
                        }
                    }
                    Err(source) => return Err(cluster_error(id, Stage::CreateTarget, source)),
                }
            }
        };

        info!(
            aws_secret = %id,
            secret_id = %reference.secret_id,
            version_id = %reference.version_id,
            outcome = %outcome,
            "Reconciled AWSSecret"
        );
        Ok(outcome)
    }
}

fn cluster_error(id: &ObjectIdentity, stage: Stage, source: ClusterError) -> ControllerError {
    ControllerError::Cluster {
        stage,
        identity: id.clone(),
        source,
    }
}

/// Run `call` unless `cancel` fires first.
///
/// Cancellation is checked before `call` is polled, so nothing is sent once
/// the token has been cancelled.
async fn guarded<F: Future>(
    id: &ObjectIdentity,
    stage: Stage,
    cancel: &CancellationToken,
    call: F,
) -> Result<F::Output, ControllerError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ControllerError::Cancelled {
            identity: id.clone(),
            stage,
        }),
        output = call => Ok(output),
    }
}
