//! Mock SecretsManagerClient for unit testing
//!
//! Stores secret versions in memory, keyed by `(secret_id, version_id)`, and
//! can be told to fail lookups for specific secrets.

use crate::error::SecretsManagerError;
use crate::models::SecretValue;
use crate::secrets_manager_trait::SecretsManagerClientTrait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Mock SecretsManagerClient for testing
#[derive(Clone, Default)]
pub struct MockSecretsManagerClient {
    pub(crate) values: Arc<Mutex<HashMap<(String, String), SecretValue>>>,
    pub(crate) failures: Arc<Mutex<HashMap<String, SecretsManagerError>>>,
    pub(crate) lookups: Arc<Mutex<Vec<(String, String)>>>,
}

impl MockSecretsManagerClient {
    /// Create an empty mock client
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a text payload for a secret version (for test setup)
    pub fn put_secret_string(&self, secret_id: &str, version_id: &str, payload: &str) {
        self.put_secret_value(
            secret_id,
            version_id,
            SecretValue::from_string(secret_id, version_id, payload),
        );
    }

    /// Store an arbitrary secret value (for test setup)
    pub fn put_secret_value(&self, secret_id: &str, version_id: &str, value: SecretValue) {
        self.values
            .lock()
            .unwrap()
            .insert((secret_id.to_string(), version_id.to_string()), value);
    }

    /// Make every lookup of `secret_id` fail with `error`
    pub fn fail_secret(&self, secret_id: &str, error: SecretsManagerError) {
        self.failures
            .lock()
            .unwrap()
            .insert(secret_id.to_string(), error);
    }

    /// Remove an injected failure
    pub fn clear_failure(&self, secret_id: &str) {
        self.failures.lock().unwrap().remove(secret_id);
    }

    /// Lookups performed so far, in order
    pub fn lookups(&self) -> Vec<(String, String)> {
        self.lookups.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl SecretsManagerClientTrait for MockSecretsManagerClient {
    fn region(&self) -> Option<&str> {
        Some("mock-region-1")
    }

    async fn get_secret_value(
        &self,
        secret_id: &str,
        version_id: &str,
    ) -> Result<SecretValue, SecretsManagerError> {
        self.lookups
            .lock()
            .unwrap()
            .push((secret_id.to_string(), version_id.to_string()));

        if let Some(error) = self.failures.lock().unwrap().get(secret_id) {
            return Err(error.clone());
        }

        self.values
            .lock()
            .unwrap()
            .get(&(secret_id.to_string(), version_id.to_string()))
            .cloned()
            .ok_or_else(|| {
                SecretsManagerError::NotFound(format!(
                    "{secret_id}: no version {version_id} in mock store"
                ))
            })
    }
}
