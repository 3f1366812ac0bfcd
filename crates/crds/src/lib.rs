//! AWS Secret Operator CRD Definitions
//!
//! Kubernetes Custom Resource Definitions consumed by the AWS Secret Operator.

pub mod aws_secret;

pub use aws_secret::*;
