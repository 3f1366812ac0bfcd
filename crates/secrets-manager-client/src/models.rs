//! Secrets Manager response models

use std::fmt;

/// A single secret version returned by `GetSecretValue`.
///
/// `Debug` never prints the payload.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SecretValue {
    /// ARN of the secret
    pub arn: Option<String>,
    /// Friendly name of the secret
    pub name: Option<String>,
    /// Version that was returned
    pub version_id: Option<String>,
    /// Staging labels attached to the version (e.g. `AWSCURRENT`)
    pub version_stages: Vec<String>,
    /// Text payload, absent for binary-only secrets
    pub secret_string: Option<String>,
    /// Whether the version carries a `SecretBinary` payload
    pub has_binary: bool,
}

impl SecretValue {
    /// Build a text secret value (used by tests and the mock client)
    pub fn from_string(
        name: impl Into<String>,
        version_id: impl Into<String>,
        secret_string: impl Into<String>,
    ) -> Self {
        Self {
            arn: None,
            name: Some(name.into()),
            version_id: Some(version_id.into()),
            version_stages: Vec::new(),
            secret_string: Some(secret_string.into()),
            has_binary: false,
        }
    }
}

impl fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretValue")
            .field("arn", &self.arn)
            .field("name", &self.name)
            .field("version_id", &self.version_id)
            .field("version_stages", &self.version_stages)
            .field("secret_string", &self.secret_string.as_ref().map(|_| "<redacted>"))
            .field("has_binary", &self.has_binary)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_payload() {
        let value = SecretValue::from_string("db", "v1", r#"{"password":"hunter2"}"#);
        let printed = format!("{value:?}");
        assert!(!printed.contains("hunter2"));
        assert!(printed.contains("<redacted>"));
        assert!(printed.contains("\"db\""));
    }
}
