//! Controller-specific error types.
//!
//! Every reconciliation error names the AWSSecret it belongs to and the
//! stage that failed, so a log line is enough to diagnose it.

use crate::builder::BuildError;
use crate::cluster::{ClusterError, ObjectIdentity};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Step of a reconciliation that talks to a collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Reading the AWSSecret
    FetchSource,
    /// Calling Secrets Manager
    BuildSecret,
    /// Reading the existing Secret
    FetchTarget,
    /// Creating the Secret
    CreateTarget,
    /// Replacing the Secret
    UpdateTarget,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = match self {
            Self::FetchSource => "fetching AWSSecret",
            Self::BuildSecret => "building Secret",
            Self::FetchTarget => "fetching Secret",
            Self::CreateTarget => "creating Secret",
            Self::UpdateTarget => "updating Secret",
        };
        f.write_str(stage)
    }
}

/// Errors that can occur in the AWS Secret Controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Kubernetes API call failed during reconciliation
    #[error("Kubernetes error while {stage} {identity}: {source}")]
    Cluster {
        stage: Stage,
        identity: ObjectIdentity,
        #[source]
        source: ClusterError,
    },

    /// Secrets Manager lookup or payload decoding failed
    #[error("Failed to build Secret {identity}: {source}")]
    Build {
        identity: ObjectIdentity,
        #[source]
        source: BuildError,
    },

    /// The Secret could not be linked to its AWSSecret
    #[error("Failed to set owner reference on Secret {identity}: {reason}")]
    Ownership {
        identity: ObjectIdentity,
        reason: String,
    },

    /// The AWSSecret spec is unusable as written
    #[error("Invalid AWSSecret {identity}: {reason}")]
    InvalidSpec {
        identity: ObjectIdentity,
        reason: String,
    },

    /// Reconciliation was aborted before it finished
    #[error("Reconciliation of {identity} cancelled while {stage}")]
    Cancelled {
        identity: ObjectIdentity,
        stage: Stage,
    },

    /// Reconciliation exceeded the watcher's deadline
    #[error("Reconciliation of {identity} timed out after {after:?}")]
    Timeout {
        identity: ObjectIdentity,
        after: Duration,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Kubernetes client could not be created
    #[error("Kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// Resource watch failed
    #[error("Resource watch failed: {0}")]
    Watch(String),

    /// Metrics registration failed
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// Metrics/probe server failed
    #[error("Probe server error: {0}")]
    Server(#[from] std::io::Error),
}

impl ControllerError {
    /// Stable, low-cardinality name of the error kind for logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Cluster { .. } => "cluster",
            Self::Build {
                source: BuildError::Lookup { .. },
                ..
            } => "secret_lookup",
            Self::Build {
                source: BuildError::Decode { .. },
                ..
            } => "decode",
            Self::Ownership { .. } => "ownership",
            Self::InvalidSpec { .. } => "invalid_spec",
            Self::Cancelled { .. } => "cancelled",
            Self::Timeout { .. } => "timeout",
            Self::InvalidConfig(_) => "invalid_config",
            Self::Kube(_) => "kube",
            Self::Watch(_) => "watch",
            Self::Metrics(_) => "metrics",
            Self::Server(_) => "server",
        }
    }

    /// Whether retrying soon is pointless until someone edits the source data.
    ///
    /// The watcher still requeues these errors, only at the maximum backoff.
    pub fn needs_intervention(&self) -> bool {
        match self {
            Self::Build {
                source: BuildError::Decode { .. },
                ..
            }
            | Self::InvalidSpec { .. }
            | Self::Ownership { .. } => true,
            Self::Build {
                source: BuildError::Lookup { source, .. },
                ..
            } => !source.is_retryable(),
            _ => false,
        }
    }
}
