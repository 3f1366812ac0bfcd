//! Prints the AWSSecret CustomResourceDefinition as YAML.
//!
//! Usage: `cargo run -p crds --bin crdgen > config/crd/awssecret.yaml`

use anyhow::Context;
use crds::AWSSecret;
use kube::CustomResourceExt;

fn main() -> anyhow::Result<()> {
    let crd = serde_yaml::to_string(&AWSSecret::crd())
        .context("Failed to serialize AWSSecret CRD")?;
    print!("{crd}");
    Ok(())
}
