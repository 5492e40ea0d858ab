//! Pages Release Controller Library
//!
//! Reconciles `PagesProject` release manifests into `PagesDeployment` objects
//! and keeps exactly one deployment per project in production.
//! Tests are included in the module files and under `tests/`.
//!
//! ## Quick Start
//!
//! ```rust
//! use pages_release_controller::prelude::*;
//! ```

pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod events;
pub mod observability;
pub mod prelude;
pub mod runtime;
pub mod store;
