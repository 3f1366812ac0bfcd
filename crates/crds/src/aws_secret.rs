//! AWSSecret CRD
//!
//! Declares which AWS Secrets Manager secret (and version) should be mirrored
//! into a Kubernetes `Secret` with the same name and namespace.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// API group served by the operator
pub const API_GROUP: &str = "secrets.microscaler.io";

/// API version of the `AWSSecret` kind
pub const API_VERSION: &str = "v1alpha1";

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[kube(
    group = "secrets.microscaler.io",
    version = "v1alpha1",
    kind = "AWSSecret",
    namespaced,
    status = "AWSSecretStatus",
    shortname = "awssecret",
    printcolumn = r#"{"name":"SecretId","type":"string","jsonPath":".spec.secretsManagerRef.secretId"}"#,
    printcolumn = r#"{"name":"VersionId","type":"string","jsonPath":".spec.secretsManagerRef.versionId"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct AWSSecretSpec {
    /// Secrets Manager secret the Kubernetes Secret is built from
    pub secrets_manager_ref: SecretsManagerRef,
}

/// Reference to a Secrets Manager secret.
///
/// Both identifiers are passed to `GetSecretValue` verbatim, see
/// <https://docs.aws.amazon.com/secretsmanager/latest/userguide/terms-concepts.html>.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SecretsManagerRef {
    /// SecretId (`--secret-id`): the secret name or ARN
    pub secret_id: String,

    /// VersionId (`--version-id`) of the secret
    pub version_id: String,
}

/// Observed state of an AWSSecret.
///
/// The status subresource exists so the CRD matches the operator's RBAC, but
/// no fields are reported yet.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
pub struct AWSSecretStatus {}

/// Rejected `secretsManagerRef` values
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReferenceError {
    #[error("secretsManagerRef.secretId must not be empty")]
    EmptySecretId,

    #[error("secretsManagerRef.versionId must not be empty")]
    EmptyVersionId,
}

impl SecretsManagerRef {
    /// Create a reference from a secret id and version id
    pub fn new(secret_id: impl Into<String>, version_id: impl Into<String>) -> Self {
        Self {
            secret_id: secret_id.into(),
            version_id: version_id.into(),
        }
    }

    /// Check that both identifiers are present.
    ///
    /// The identifiers are otherwise opaque; Secrets Manager is the only
    /// authority on whether they address an existing secret.
    pub fn validate(&self) -> Result<(), ReferenceError> {
        if self.secret_id.trim().is_empty() {
            return Err(ReferenceError::EmptySecretId);
        }
        if self.version_id.trim().is_empty() {
            return Err(ReferenceError::EmptyVersionId);
        }
        Ok(())
    }
}
