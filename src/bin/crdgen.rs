//! # CRD Generator
//!
//! Prints the `Duplicator` CustomResourceDefinition as YAML.
//!
//! ```bash
//! cargo run --bin crdgen > config/crd/duplicator.yaml
//! cargo run --bin crdgen | kubectl apply -f -
//! ```

use kube::core::CustomResourceExt;
use resource_duplicator::crd::Duplicator;

fn main() -> Result<(), serde_yaml::Error> {
    print!("{}", serde_yaml::to_string(&Duplicator::crd())?);
    Ok(())
}
