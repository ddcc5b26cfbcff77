//! # CRD Generator
//!
//! Prints the `Cryostat` CustomResourceDefinition as YAML.
//!
//! ```bash
//! cargo run --bin crdgen > config/crd/cryostat.yaml
//! cargo run --bin crdgen | kubectl apply -f -
//! ```

use cryostat_operator::crd::Cryostat;
use kube::core::CustomResourceExt;

fn main() {
    let crd = Cryostat::crd();
    match serde_yaml::to_string(&crd) {
        Ok(yaml) => print!("{}", yaml),
        Err(e) => {
            eprintln!("Failed to serialize CRD to YAML: {}", e);
            std::process::exit(1);
        }
    }
}
