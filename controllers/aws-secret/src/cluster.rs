//! Kubernetes API access used by the reconciler.
//!
//! The reconciler only sees the `ClusterClient` trait so it can be tested
//! against an in-memory cluster. `KubeClusterClient` is the production
//! implementation on top of `kube::Api`.

use crds::AWSSecret;
use k8s_openapi::api::core::v1::Secret;
use kube::api::PostParams;
use kube::{Api, Client, Resource, ResourceExt};
use std::fmt;
use thiserror::Error;
use tracing::debug;

/// Field manager recorded on every write
pub const FIELD_MANAGER: &str = "aws-secret-operator";

/// Name and namespace of a namespaced object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectIdentity {
    pub name: String,
    pub namespace: String,
}

impl ObjectIdentity {
    /// Identity from a name and namespace
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
        }
    }

    /// Identity of an object, falling back to the `default` namespace
    pub fn of<K: Resource>(obj: &K) -> Self {
        Self {
            name: obj.name_any(),
            namespace: obj.namespace().unwrap_or_else(|| "default".to_string()),
        }
    }
}

impl fmt::Display for ObjectIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Result of an existence check.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<T> {
    Found(T),
    Absent,
}

impl<T> From<Option<T>> for Lookup<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(found) => Self::Found(found),
            None => Self::Absent,
        }
    }
}

/// Errors returned by cluster API calls (other than not-found, which is a `Lookup::Absent`)
///
/// A replace conflict (409 `Conflict`) is a `Rejected` error; only a create
/// that lost a race is `AlreadyExists`.
#[derive(Debug, Error)]
pub enum ClusterError {
    /// Create raced with another writer
    #[error("{0} already exists")]
    AlreadyExists(String),

    /// The API server answered with an error status
    #[error("API server rejected request ({code}): {message}")]
    Rejected { code: u16, message: String },

    /// The object cannot be addressed
    #[error("object is missing {0}")]
    MissingField(&'static str),

    /// The request did not get an API response
    #[error("Kubernetes client error: {0}")]
    Client(#[source] kube::Error),
}

impl From<kube::Error> for ClusterError {
    fn from(err: kube::Error) -> Self {
        match err {
            kube::Error::Api(ae) if ae.code == 409 && ae.reason == "AlreadyExists" => {
                Self::AlreadyExists(ae.message.clone())
            }
            kube::Error::Api(ae) => Self::Rejected {
                code: ae.code,
                message: ae.message.clone(),
            },
            other => Self::Client(other),
        }
    }
}

/// Cluster API operations needed to reconcile an AWSSecret
#[async_trait::async_trait]
pub trait ClusterClient: Send + Sync {
    async fn get_aws_secret(&self, id: &ObjectIdentity) -> Result<Lookup<AWSSecret>, ClusterError>;
    async fn get_secret(&self, id: &ObjectIdentity) -> Result<Lookup<Secret>, ClusterError>;
    async fn create_secret(&self, secret: &Secret) -> Result<Secret, ClusterError>;
    /// Full replace; `secret` must carry the resourceVersion it was read at
    async fn replace_secret(&self, secret: &Secret) -> Result<Secret, ClusterError>;
}

/// `ClusterClient` backed by the Kubernetes API server
#[derive(Clone)]
pub struct KubeClusterClient {
    client: Client,
}

impl KubeClusterClient {
    /// Wrap a Kubernetes client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn secrets(&self, namespace: &str) -> Api<Secret> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn post_params() -> PostParams {
        PostParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..PostParams::default()
        }
    }
}

fn addressable(secret: &Secret) -> Result<(&str, &str), ClusterError> {
    let name = secret
        .metadata
        .name
        .as_deref()
        .ok_or(ClusterError::MissingField("metadata.name"))?;
    let namespace = secret
        .metadata
        .namespace
        .as_deref()
        .ok_or(ClusterError::MissingField("metadata.namespace"))?;
    Ok((name, namespace))
}

#[async_trait::async_trait]
impl ClusterClient for KubeClusterClient {
    async fn get_aws_secret(&self, id: &ObjectIdentity) -> Result<Lookup<AWSSecret>, ClusterError> {
        let api: Api<AWSSecret> = Api::namespaced(self.client.clone(), &id.namespace);
        Ok(api.get_opt(&id.name).await?.into())
    }

    async fn get_secret(&self, id: &ObjectIdentity) -> Result<Lookup<Secret>, ClusterError> {
        Ok(self.secrets(&id.namespace).get_opt(&id.name).await?.into())
    }

    async fn create_secret(&self, secret: &Secret) -> Result<Secret, ClusterError> {
        let (name, namespace) = addressable(secret)?;
        debug!(namespace, name, "Creating Secret");
        Ok(self
            .secrets(namespace)
            .create(&Self::post_params(), secret)
            .await?)
    }

    async fn replace_secret(&self, secret: &Secret) -> Result<Secret, ClusterError> {
        let (name, namespace) = addressable(secret)?;
        debug!(namespace, name, "Replacing Secret");
        Ok(self
            .secrets(namespace)
            .replace(name, &Self::post_params(), secret)
            .await?)
    }
}

/// Reasons a Secret cannot be linked to its AWSSecret
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OwnerReferenceError {
    #[error("owner has no name or uid yet")]
    MissingOwnerMetadata,

    #[error("owner namespace {owner:?} differs from object namespace {object:?}")]
    CrossNamespace {
        owner: Option<String>,
        object: Option<String>,
    },

    #[error("object is already controlled by {kind} {name}")]
    AlreadyOwned { kind: String, name: String },
}

/// Make `owner` the controller of `secret`.
///
/// Other owner references are kept. Fails if a different object is already
/// the controller, so two AWSSecrets can never fight over one Secret.
pub fn set_controller_reference(
    owner: &AWSSecret,
    secret: &mut Secret,
) -> Result<(), OwnerReferenceError> {
    let owner_ref = owner
        .controller_owner_ref(&())
        .ok_or(OwnerReferenceError::MissingOwnerMetadata)?;

    if owner.metadata.namespace != secret.metadata.namespace {
        return Err(OwnerReferenceError::CrossNamespace {
            owner: owner.metadata.namespace.clone(),
            object: secret.metadata.namespace.clone(),
        });
    }

    let refs = secret.metadata.owner_references.get_or_insert_with(Vec::new);
    if let Some(other) = refs
        .iter()
        .find(|r| r.controller == Some(true) && r.uid != owner_ref.uid)
    {
        return Err(OwnerReferenceError::AlreadyOwned {
            kind: other.kind.clone(),
            name: other.name.clone(),
        });
    }

    refs.retain(|r| r.uid != owner_ref.uid);
    refs.push(owner_ref);
    Ok(())
}
