//! Test utilities for unit testing the reconciler
//!
//! Provides an in-memory `ClusterClient`, a Secrets Manager client that never
//! answers, and fixtures for AWSSecret and Secret objects.

use crate::cluster::{ClusterClient, ClusterError, Lookup, ObjectIdentity};
use crds::{AWSSecret, AWSSecretSpec, SecretsManagerRef};
use k8s_openapi::ByteString;
use k8s_openapi::api::core::v1::Secret;
use kube::api::ObjectMeta;
use secrets_manager_client::{SecretValue, SecretsManagerClientTrait, SecretsManagerError};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

/// Helper to create a test AWSSecret with a uid, as the API server would return it
pub fn create_test_aws_secret(
    name: &str,
    namespace: &str,
    secret_id: &str,
    version_id: &str,
) -> AWSSecret {
    AWSSecret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            uid: Some(format!("uid-{namespace}-{name}")),
            ..Default::default()
        },
        spec: AWSSecretSpec {
            secrets_manager_ref: SecretsManagerRef::new(secret_id, version_id),
        },
        status: None,
    }
}

/// Helper to create an unlabelled, unowned Secret
pub fn create_test_secret(name: &str, namespace: &str, data: &[(&str, &str)]) -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        type_: Some("Opaque".to_string()),
        data: Some(
            data.iter()
                .map(|(k, v)| (k.to_string(), ByteString(v.as_bytes().to_vec())))
                .collect(),
        ),
        ..Default::default()
    }
}

/// Decoded `data` of a Secret
pub fn secret_data(secret: &Secret) -> BTreeMap<String, String> {
    secret
        .data
        .iter()
        .flatten()
        .map(|(k, v)| (k.clone(), String::from_utf8_lossy(&v.0).into_owned()))
        .collect()
}

/// A write attempted against the mock cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Write {
    Create(ObjectIdentity),
    Replace(ObjectIdentity),
}

#[derive(Default)]
struct ClusterState {
    aws_secrets: HashMap<ObjectIdentity, AWSSecret>,
    secrets: HashMap<ObjectIdentity, Secret>,
    writes: Vec<Write>,
    resource_version: u64,
    fail_get_aws_secret: Option<u16>,
    fail_get_secret: Option<u16>,
    fail_create: Option<u16>,
    fail_replace: Option<u16>,
    race_next_create: Option<Secret>,
    vanishing_race: bool,
}

impl ClusterState {
    fn store(&mut self, id: ObjectIdentity, mut secret: Secret) -> Secret {
        self.resource_version += 1;
        secret.metadata.resource_version = Some(self.resource_version.to_string());
        self.secrets.insert(id, secret.clone());
        secret
    }
}

fn rejected(code: u16) -> ClusterError {
    ClusterError::Rejected {
        code,
        message: format!("injected failure ({code})"),
    }
}

fn identity_of(secret: &Secret) -> Result<ObjectIdentity, ClusterError> {
    let name = secret
        .metadata
        .name
        .clone()
        .ok_or(ClusterError::MissingField("metadata.name"))?;
    let namespace = secret
        .metadata
        .namespace
        .clone()
        .ok_or(ClusterError::MissingField("metadata.namespace"))?;
    Ok(ObjectIdentity::new(name, namespace))
}

/// In-memory cluster with optimistic concurrency on Secrets
#[derive(Clone, Default)]
pub struct MockClusterClient {
    state: Arc<Mutex<ClusterState>>,
}

impl MockClusterClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_aws_secret(&self, aws_secret: AWSSecret) {
        let id = ObjectIdentity::of(&aws_secret);
        self.state.lock().unwrap().aws_secrets.insert(id, aws_secret);
    }

    /// Store a Secret directly, bypassing the write log
    pub fn insert_secret(&self, secret: Secret) {
        let id = identity_of(&secret).unwrap();
        self.state.lock().unwrap().store(id, secret);
    }

    pub fn secret(&self, id: &ObjectIdentity) -> Option<Secret> {
        self.state.lock().unwrap().secrets.get(id).cloned()
    }

    pub fn writes(&self) -> Vec<Write> {
        self.state.lock().unwrap().writes.clone()
    }

    pub fn fail_get_aws_secret(&self, code: u16) {
        self.state.lock().unwrap().fail_get_aws_secret = Some(code);
    }

    pub fn fail_get_secret(&self, code: u16) {
        self.state.lock().unwrap().fail_get_secret = Some(code);
    }

    pub fn fail_create(&self, code: u16) {
        self.state.lock().unwrap().fail_create = Some(code);
    }

    pub fn fail_replace(&self, code: u16) {
        self.state.lock().unwrap().fail_replace = Some(code);
    }

    /// Fail the next create with AlreadyExists for a Secret that is deleted again before anyone reads it
    pub fn vanishing_race_next_create(&self) {
        self.state.lock().unwrap().vanishing_race = true;
    }

    /// Let `competitor` win the next create: it is stored and the create fails with AlreadyExists
    pub fn race_next_create(&self, competitor: Secret) {
        self.state.lock().unwrap().race_next_create = Some(competitor);
    }
}

#[async_trait::async_trait]
impl ClusterClient for MockClusterClient {
    async fn get_aws_secret(&self, id: &ObjectIdentity) -> Result<Lookup<AWSSecret>, ClusterError> {
        let state = self.state.lock().unwrap();
        if let Some(code) = state.fail_get_aws_secret {
            return Err(rejected(code));
        }
        Ok(state.aws_secrets.get(id).cloned().into())
    }

    async fn get_secret(&self, id: &ObjectIdentity) -> Result<Lookup<Secret>, ClusterError> {
        let state = self.state.lock().unwrap();
        if let Some(code) = state.fail_get_secret {
            return Err(rejected(code));
        }
        Ok(state.secrets.get(id).cloned().into())
    }

    async fn create_secret(&self, secret: &Secret) -> Result<Secret, ClusterError> {
        let id = identity_of(secret)?;
        let mut state = self.state.lock().unwrap();
        state.writes.push(Write::Create(id.clone()));

        if let Some(code) = state.fail_create {
            return Err(rejected(code));
        }
        if std::mem::take(&mut state.vanishing_race) {
            return Err(ClusterError::AlreadyExists(format!("secrets \"{}\" already exists", id.name)));
        }
        if let Some(competitor) = state.race_next_create.take() {
            state.store(id.clone(), competitor);
        }
        if state.secrets.contains_key(&id) {
            return Err(ClusterError::AlreadyExists(format!("secrets \"{}\" already exists", id.name)));
        }
        Ok(state.store(id, secret.clone()))
    }

    async fn replace_secret(&self, secret: &Secret) -> Result<Secret, ClusterError> {
        let id = identity_of(secret)?;
        let mut state = self.state.lock().unwrap();
        state.writes.push(Write::Replace(id.clone()));

        if let Some(code) = state.fail_replace {
            return Err(rejected(code));
        }

        let Some(current) = state.secrets.get(&id) else {
            return Err(ClusterError::Rejected {
                code: 404,
                message: format!("secrets \"{}\" not found", id.name),
            });
        };
        if current.metadata.resource_version != secret.metadata.resource_version {
            return Err(ClusterError::Rejected {
                code: 409,
                message: "the object has been modified".to_string(),
            });
        }
        Ok(state.store(id, secret.clone()))
    }
}

/// Secrets Manager client whose lookups never complete
pub struct PendingSecretsManager;

#[async_trait::async_trait]
impl SecretsManagerClientTrait for PendingSecretsManager {
    fn region(&self) -> Option<&str> {
        None
    }

    async fn get_secret_value(
        &self,
        _secret_id: &str,
        _version_id: &str,
    ) -> Result<SecretValue, SecretsManagerError> {
        std::future::pending().await
    }
}
