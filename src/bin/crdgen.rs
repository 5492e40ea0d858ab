//! # CRD Generator
//!
//! Prints the `PagesProject` and `PagesDeployment` CustomResourceDefinitions as
//! a multi-document YAML stream.
//!
//! ```bash
//! cargo run --bin crdgen > config/crd/pages.yaml
//! cargo run --bin crdgen | kubectl apply -f -
//! ```

use kube::core::CustomResourceExt;
use pages_release_controller::crd::{PagesDeployment, PagesProject};

fn main() {
    let crds = [PagesProject::crd(), PagesDeployment::crd()];

    println!("# This file is auto-generated by crdgen");
    println!("# DO NOT EDIT THIS FILE MANUALLY");
    println!("# Fix schema issues in src/crd/ instead; this file is overwritten on every code update");
    println!("#");
    for crd in &crds {
        match serde_yaml::to_string(crd) {
            Ok(yaml) => {
                println!("---");
                print!("{yaml}");
            }
            Err(e) => {
                eprintln!("Failed to serialize CRD to YAML: {e}");
                std::process::exit(1);
            }
        }
    }
}
