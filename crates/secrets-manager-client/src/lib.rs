//! AWS Secrets Manager Client
//!
//! Read-only access to AWS Secrets Manager for the AWS Secret Operator.
//!
//! # Features
//!
//! - `test-util`: exposes `MockSecretsManagerClient`, an in-memory store for
//!   unit tests. Its own tests only build with the feature enabled:
//!   `cargo test -p secrets-manager-client --features test-util`.
//!
//! # Example
//!
//! ```no_run
//! use secrets_manager_client::{SecretsManagerClient, SecretsManagerClientTrait};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = SecretsManagerClient::new(Some("eu-west-1".to_string()), None).await;
//!
//! let value = client
//!     .get_secret_value("prod/payments/db", "2b6e5bb4-0d6e-4d3f-9a57-6f0f3c6f4f11")
//!     .await?;
//! println!("fetched version {:?}", value.version_id);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod models;
#[path = "trait.rs"]
pub mod secrets_manager_trait;
#[cfg(feature = "test-util")]
pub mod mock;

pub use client::SecretsManagerClient;
pub use error::SecretsManagerError;
pub use models::SecretValue;
pub use secrets_manager_trait::SecretsManagerClientTrait;
#[cfg(feature = "test-util")]
pub use mock::MockSecretsManagerClient;
