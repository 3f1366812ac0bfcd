//! Builds the desired Kubernetes Secret from a Secrets Manager secret.
//!
//! The payload must be a flat JSON object whose values are all strings;
//! each key/value pair becomes one Secret data entry. Anything else is a
//! decode error rather than a best-effort conversion.

use crate::cluster::ObjectIdentity;
use k8s_openapi::ByteString;
use k8s_openapi::api::core::v1::Secret;
use kube::api::ObjectMeta;
use secrets_manager_client::{SecretsManagerClientTrait, SecretsManagerError};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Label key identifying Secrets produced by the operator
pub const APP_LABEL: &str = "app";

/// Label value identifying Secrets produced by the operator
pub const APP_NAME: &str = "aws-secret-operator";

/// Failures while turning a Secrets Manager reference into Secret data
#[derive(Debug, Error)]
pub enum BuildError {
    /// Secrets Manager could not return the secret value
    #[error("Secrets Manager lookup of {secret_id} (version {version_id}) failed: {source}")]
    Lookup {
        secret_id: String,
        version_id: String,
        #[source]
        source: SecretsManagerError,
    },

    /// The secret value is not a flat JSON object of strings
    #[error("payload of {secret_id} is not a flat JSON object of strings: {reason}")]
    Decode { secret_id: String, reason: String },
}

/// Labels and data of the Secret to write.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretPayload {
    pub labels: BTreeMap<String, String>,
    pub data: BTreeMap<String, String>,
}

impl fmt::Debug for SecretPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretPayload")
            .field("labels", &self.labels)
            .field("keys", &self.data.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl SecretPayload {
    /// Assemble the Secret object for `identity`.
    ///
    /// Values are stored in `data` rather than `stringData` so that replacing
    /// an existing Secret drops keys that are no longer in the payload.
    pub fn into_secret(self, identity: &ObjectIdentity) -> Secret {
        let data = self
            .data
            .into_iter()
            .map(|(key, value)| (key, ByteString(value.into_bytes())))
            .collect();

        Secret {
            metadata: ObjectMeta {
                name: Some(identity.name.clone()),
                namespace: Some(identity.namespace.clone()),
                labels: Some(self.labels),
                ..ObjectMeta::default()
            },
            type_: Some("Opaque".to_string()),
            data: Some(data),
            ..Secret::default()
        }
    }
}

/// Labels attached to every Secret the operator writes
pub fn operator_labels() -> BTreeMap<String, String> {
    BTreeMap::from([(APP_LABEL.to_string(), APP_NAME.to_string())])
}

/// Fetches secret values and decodes them into Secret payloads.
#[derive(Clone)]
pub struct SecretBuilder {
    client: Arc<dyn SecretsManagerClientTrait>,
}

impl SecretBuilder {
    /// Create a builder over a Secrets Manager client
    pub fn new(client: Arc<dyn SecretsManagerClientTrait>) -> Self {
        Self { client }
    }

    /// Look up `secret_id`/`version_id` and decode it into labels and data.
    pub async fn build(&self, secret_id: &str, version_id: &str) -> Result<SecretPayload, BuildError> {
        let value = self
            .client
            .get_secret_value(secret_id, version_id)
            .await
            .map_err(|source| BuildError::Lookup {
                secret_id: secret_id.to_string(),
                version_id: version_id.to_string(),
                source,
            })?;

        let Some(secret_string) = value.secret_string.as_deref() else {
            let reason = if value.has_binary {
                "secret only has a SecretBinary value"
            } else {
                "secret has no SecretString value"
            };
            return Err(BuildError::Decode {
                secret_id: secret_id.to_string(),
                reason: reason.to_string(),
            });
        };

        let data = decode_payload(secret_id, secret_string)?;
        debug!(secret_id, version_id, keys = data.len(), "Decoded secret payload");

        Ok(SecretPayload {
            labels: operator_labels(),
            data,
        })
    }
}

/// Decode a flat JSON object of string values.
pub fn decode_payload(secret_id: &str, payload: &str) -> Result<BTreeMap<String, String>, BuildError> {
    let decode_error = |reason: String| BuildError::Decode {
        secret_id: secret_id.to_string(),
        reason,
    };

    // serde_json's message carries line/column only, never the payload text
    let value: Value =
        serde_json::from_str(payload).map_err(|e| decode_error(format!("invalid JSON: {e}")))?;

    let Value::Object(entries) = value else {
        return Err(decode_error(format!(
            "expected a JSON object, found {}",
            json_type(&value)
        )));
    };

    entries
        .into_iter()
        .map(|(key, value)| match value {
            Value::String(s) => Ok((key, s)),
            other => Err(decode_error(format!(
                "value of {key:?} is {}, expected a string",
                json_type(&other)
            ))),
        })
        .collect()
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrets_manager_client::{MockSecretsManagerClient, SecretValue};

    fn builder(mock: &MockSecretsManagerClient) -> SecretBuilder {
        SecretBuilder::new(Arc::new(mock.clone()))
    }

    #[tokio::test]
    async fn test_flat_payload_round_trip() {
        let mock = MockSecretsManagerClient::new();
        mock.put_secret_string("prod/db", "v1", r#"{"user":"alice","pass":"s3cr3t"}"#);

        let payload = builder(&mock).build("prod/db", "v1").await.unwrap();

        let expected = BTreeMap::from([
            ("user".to_string(), "alice".to_string()),
            ("pass".to_string(), "s3cr3t".to_string()),
        ]);
        assert_eq!(payload.data, expected);
        assert_eq!(payload.labels, operator_labels());
        assert_eq!(mock.lookups(), vec![("prod/db".to_string(), "v1".to_string())]);
    }

    #[tokio::test]
    async fn test_nested_value_is_rejected() {
        let mock = MockSecretsManagerClient::new();
        mock.put_secret_string("prod/db", "v1", r#"{"a": {"nested": 1}}"#);

        let err = builder(&mock).build("prod/db", "v1").await.unwrap_err();
        match err {
            BuildError::Decode { secret_id, reason } => {
                assert_eq!(secret_id, "prod/db");
                assert!(reason.contains("\"a\""), "reason: {reason}");
                assert!(reason.contains("an object"), "reason: {reason}");
            }
            other => panic!("expected decode error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_lookup_error_is_reported_separately() {
        let mock = MockSecretsManagerClient::new();
        mock.fail_secret("prod/db", SecretsManagerError::AccessDenied("denied".to_string()));

        let err = builder(&mock).build("prod/db", "v1").await.unwrap_err();
        assert!(matches!(
            err,
            BuildError::Lookup {
                source: SecretsManagerError::AccessDenied(_),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_binary_secret_is_a_decode_error() {
        let mock = MockSecretsManagerClient::new();
        mock.put_secret_value(
            "prod/cert",
            "v1",
            SecretValue {
                has_binary: true,
                ..SecretValue::default()
            },
        );

        let err = builder(&mock).build("prod/cert", "v1").await.unwrap_err();
        assert!(matches!(err, BuildError::Decode { ref reason, .. } if reason.contains("SecretBinary")));
    }

    #[test]
    fn test_non_string_scalars_are_rejected() {
        for payload in [r#"{"port": 5432}"#, r#"{"tls": true}"#, r#"{"x": null}"#, r#"{"hosts": ["a"]}"#] {
            assert!(
                matches!(decode_payload("s", payload), Err(BuildError::Decode { .. })),
                "payload {payload} should be rejected"
            );
        }
    }

    #[test]
    fn test_malformed_and_non_object_payloads_are_rejected() {
        assert!(matches!(decode_payload("s", "not json"), Err(BuildError::Decode { .. })));
        assert!(matches!(decode_payload("s", r#"["a","b"]"#), Err(BuildError::Decode { .. })));
        assert!(matches!(decode_payload("s", r#""plain""#), Err(BuildError::Decode { .. })));
    }

    #[test]
    fn test_empty_object_is_valid() {
        assert!(decode_payload("s", "{}").unwrap().is_empty());
    }

    #[test]
    fn test_decode_error_does_not_echo_payload() {
        let err = decode_payload("s", r#"{"password": "hunter2", "port": 1}"#).unwrap_err();
        assert!(!err.to_string().contains("hunter2"));
    }

    #[test]
    fn test_into_secret_shape() {
        let payload = SecretPayload {
            labels: operator_labels(),
            data: BTreeMap::from([("user".to_string(), "alice".to_string())]),
        };
        let secret = payload.into_secret(&ObjectIdentity::new("db-credentials", "payments"));

        assert_eq!(secret.metadata.name.as_deref(), Some("db-credentials"));
        assert_eq!(secret.metadata.namespace.as_deref(), Some("payments"));
        assert_eq!(secret.type_.as_deref(), Some("Opaque"));
        assert_eq!(
            secret.metadata.labels.unwrap().get(APP_LABEL).map(String::as_str),
            Some(APP_NAME)
        );
        let data = secret.data.unwrap();
        assert_eq!(data.get("user"), Some(&ByteString(b"alice".to_vec())));
        assert!(secret.string_data.is_none());
    }

    #[test]
    fn test_payload_debug_hides_values() {
        let payload = SecretPayload {
            labels: operator_labels(),
            data: BTreeMap::from([("pass".to_string(), "s3cr3t".to_string())]),
        };
        let printed = format!("{payload:?}");
        assert!(printed.contains("pass"));
        assert!(!printed.contains("s3cr3t"));
    }
}
