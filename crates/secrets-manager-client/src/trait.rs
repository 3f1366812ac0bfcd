//! SecretsManagerClient trait for mocking
//!
//! This trait abstracts the Secrets Manager client so the operator can be
//! unit tested without AWS credentials. The concrete `SecretsManagerClient`
//! implements it, and tests use `MockSecretsManagerClient`.

use crate::error::SecretsManagerError;
use crate::models::SecretValue;

/// Trait for Secrets Manager read operations
///
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait SecretsManagerClientTrait: Send + Sync {
    /// Region the client talks to, if known
    fn region(&self) -> Option<&str>;

    /// Point lookup of one secret version (`GetSecretValue`)
    async fn get_secret_value(
        &self,
        secret_id: &str,
        version_id: &str,
    ) -> Result<SecretValue, SecretsManagerError>;
}
