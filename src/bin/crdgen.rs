//! Prints the `CustomResourceDefinition` YAML for every CRD this controller owns.
//!
//! Usage: `cargo run --bin crdgen > deploy/crds/adhar.io_crds.yaml`

use adhar_platform_controller::crd::{CustomPackage, GitRepository};
use kube::CustomResourceExt;

fn main() -> anyhow::Result<()> {
    let crds = vec![
        serde_yaml::to_string(&GitRepository::crd())?,
        serde_yaml::to_string(&CustomPackage::crd())?,
    ];
    println!("{}", crds.join("---\n"));
    Ok(())
}
