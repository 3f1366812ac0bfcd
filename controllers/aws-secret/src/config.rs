//! Controller configuration, read from environment variables.

use crate::error::ControllerError;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

/// Runtime configuration of the operator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Namespace to watch; `None` watches all namespaces
    pub namespace: Option<String>,
    /// AWS region override; `None` uses the SDK's default chain
    pub aws_region: Option<String>,
    /// Secrets Manager endpoint override (e.g. LocalStack)
    pub secrets_manager_endpoint: Option<String>,
    /// Listen address of the metrics and probe server
    pub metrics_addr: SocketAddr,
    /// Deadline for a single reconciliation
    pub reconcile_timeout: Duration,
    /// Maximum number of concurrent reconciliations
    pub concurrency: u16,
    /// Quiet period before an event triggers a reconciliation
    pub debounce: Duration,
    /// First requeue delay after a failure
    pub backoff_min: Duration,
    /// Largest requeue delay after repeated failures
    pub backoff_max: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            namespace: None,
            aws_region: None,
            secrets_manager_endpoint: None,
            metrics_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            reconcile_timeout: Duration::from_secs(30),
            concurrency: 3,
            debounce: Duration::from_secs(5),
            backoff_min: Duration::from_secs(5),
            backoff_max: Duration::from_secs(300),
        }
    }
}

impl Config {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, ControllerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    ///
    /// Unset or blank variables take their default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ControllerError> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let defaults = Self::default();

        let config = Self {
            namespace: get("WATCH_NAMESPACE"),
            aws_region: get("AWS_REGION"),
            secrets_manager_endpoint: get("SECRETS_MANAGER_ENDPOINT"),
            metrics_addr: parse(&get, "METRICS_ADDR")?.unwrap_or(defaults.metrics_addr),
            reconcile_timeout: seconds(&get, "RECONCILE_TIMEOUT_SECS")?
                .unwrap_or(defaults.reconcile_timeout),
            concurrency: parse(&get, "RECONCILE_CONCURRENCY")?.unwrap_or(defaults.concurrency),
            debounce: seconds(&get, "DEBOUNCE_SECS")?.unwrap_or(defaults.debounce),
            backoff_min: seconds(&get, "BACKOFF_MIN_SECS")?.unwrap_or(defaults.backoff_min),
            backoff_max: seconds(&get, "BACKOFF_MAX_SECS")?.unwrap_or(defaults.backoff_max),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ControllerError> {
        if self.reconcile_timeout.is_zero() {
            return Err(ControllerError::InvalidConfig(
                "RECONCILE_TIMEOUT_SECS must be greater than 0".to_string(),
            ));
        }
        if self.concurrency == 0 {
            return Err(ControllerError::InvalidConfig(
                "RECONCILE_CONCURRENCY must be greater than 0".to_string(),
            ));
        }
        if self.backoff_min.is_zero() {
            return Err(ControllerError::InvalidConfig(
                "BACKOFF_MIN_SECS must be greater than 0".to_string(),
            ));
        }
        if self.backoff_max < self.backoff_min {
            return Err(ControllerError::InvalidConfig(format!(
                "BACKOFF_MAX_SECS ({}) must not be less than BACKOFF_MIN_SECS ({})",
                self.backoff_max.as_secs(),
                self.backoff_min.as_secs()
            )));
        }
        Ok(())
    }
}

fn parse<T>(get: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>, ControllerError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get(key)
        .map(|raw| {
            raw.parse::<T>()
                .map_err(|e| ControllerError::InvalidConfig(format!("{key}={raw:?}: {e}")))
        })
        .transpose()
}

fn seconds(
    get: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<Duration>, ControllerError> {
    Ok(parse::<u64>(get, key)?.map(Duration::from_secs))
}
