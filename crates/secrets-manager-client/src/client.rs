//! AWS Secrets Manager client
//!
//! Thin wrapper around `aws-sdk-secretsmanager` exposing the single read
//! operation the operator needs. Credentials and region come from the
//! standard AWS provider chain (environment, profile, IRSA, instance metadata).

use crate::error::SecretsManagerError;
use crate::models::SecretValue;
use crate::secrets_manager_trait::SecretsManagerClientTrait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_secretsmanager::Client;
use aws_sdk_secretsmanager::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_secretsmanager::operation::get_secret_value::GetSecretValueError;
use tracing::debug;

/// Error codes AWS uses for rejected or expired credentials
const ACCESS_DENIED_CODES: &[&str] = &[
    "AccessDeniedException",
    "UnrecognizedClientException",
    "ExpiredTokenException",
    "InvalidSignatureException",
];

/// Secrets Manager API client
#[derive(Debug, Clone)]
pub struct SecretsManagerClient {
    client: Client,
    region: Option<String>,
}

impl SecretsManagerClient {
    /// Create a client from the default AWS configuration chain
    ///
    /// # Arguments
    /// * `region` - Region override; the provider chain is used when `None`
    /// * `endpoint_url` - Endpoint override (e.g. LocalStack); the regional endpoint is used when `None`
    pub async fn new(region: Option<String>, endpoint_url: Option<String>) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(Region::new(region));
        }
        if let Some(endpoint_url) = endpoint_url {
            loader = loader.endpoint_url(endpoint_url);
        }
        let sdk_config = loader.load().await;

        Self {
            region: sdk_config.region().map(ToString::to_string),
            client: Client::new(&sdk_config),
        }
    }

    /// Wrap an already configured SDK client
    pub fn from_sdk_client(client: Client) -> Self {
        let region = client.config().region().map(ToString::to_string);
        Self { client, region }
    }
}

#[async_trait::async_trait]
impl SecretsManagerClientTrait for SecretsManagerClient {
    fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    async fn get_secret_value(
        &self,
        secret_id: &str,
        version_id: &str,
    ) -> Result<SecretValue, SecretsManagerError> {
        debug!(secret_id, version_id, "Fetching secret value");

        let output = self
            .client
            .get_secret_value()
            .secret_id(secret_id)
            .version_id(version_id)
            .send()
            .await
            .map_err(|e| classify(secret_id, e))?;

        Ok(SecretValue {
            arn: output.arn().map(str::to_string),
            name: output.name().map(str::to_string),
            version_id: output.version_id().map(str::to_string),
            version_stages: output.version_stages().to_vec(),
            secret_string: output.secret_string().map(str::to_string),
            has_binary: output.secret_binary().is_some(),
        })
    }
}

/// Map an SDK failure onto the operator's error kinds
fn classify<R>(secret_id: &str, err: SdkError<GetSecretValueError, R>) -> SecretsManagerError
where
    R: std::fmt::Debug + Send + Sync + 'static,
{
    let context = format!("{secret_id}: {}", DisplayErrorContext(&err));
    match err {
        SdkError::DispatchFailure(_) | SdkError::TimeoutError(_) | SdkError::ResponseError(_) => {
            SecretsManagerError::Transport(context)
        }
        SdkError::ConstructionFailure(_) => SecretsManagerError::InvalidRequest(context),
        err => {
            let service_err = err.into_service_error();
            match &service_err {
                GetSecretValueError::ResourceNotFoundException(_) => {
                    SecretsManagerError::NotFound(context)
                }
                GetSecretValueError::DecryptionFailure(_) => SecretsManagerError::Decryption(context),
                GetSecretValueError::InvalidParameterException(_)
                | GetSecretValueError::InvalidRequestException(_) => {
                    SecretsManagerError::InvalidRequest(context)
                }
                _ if service_err
                    .code()
                    .is_some_and(|code| ACCESS_DENIED_CODES.contains(&code)) =>
                {
                    SecretsManagerError::AccessDenied(context)
                }
                _ => SecretsManagerError::Api(context),
            }
        }
    }
}
