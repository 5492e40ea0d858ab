//! # Validation
//!
//! Validates PagesProject resources and duration strings.

mod duration;
mod kubernetes;
mod project;

pub use duration::{parse_kubernetes_duration, validate_duration_interval};
pub use kubernetes::{validate_kubernetes_label, validate_label_key, validate_label_value};
pub use project::validate_pages_project;
