//! Secrets Manager client errors

use thiserror::Error;

/// Errors that can occur when reading from AWS Secrets Manager
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SecretsManagerError {
    /// The secret, or the requested version of it, does not exist
    #[error("Secret not found: {0}")]
    NotFound(String),

    /// Credentials were rejected or lack `secretsmanager:GetSecretValue`
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// Malformed identifiers or a secret scheduled for deletion
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// KMS could not decrypt the secret value
    #[error("Decryption failed: {0}")]
    Decryption(String),

    /// The request never got a response (DNS, TLS, timeout, connection reset)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Any other service-side failure
    #[error("Secrets Manager API error: {0}")]
    Api(String),
}

impl SecretsManagerError {
    /// Whether retrying the same request later can succeed without anyone
    /// changing the secret, its policy or the operator's credentials.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Api(_))
    }
}
