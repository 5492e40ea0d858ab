//! # Configuration
//!
//! Controller and server settings loaded from environment variables.
//!
//! - `controller`: Reconciliation timing, retry and logging settings
//! - `server`: Metrics/probe HTTP server settings

pub mod controller;
pub mod server;

pub use controller::ControllerConfig;
pub use server::ServerConfig;

use std::sync::Arc;
use tokio::sync::RwLock;

/// Controller configuration shared between the watch loop and reconcilers
pub type SharedControllerConfig = Arc<RwLock<ControllerConfig>>;

/// Server configuration shared with the HTTP server task
pub type SharedServerConfig = Arc<RwLock<ServerConfig>>;

/// Load both configurations from the environment and wrap them for sharing
#[must_use]
pub fn create_shared_config() -> (SharedControllerConfig, SharedServerConfig) {
    (
        Arc::new(RwLock::new(ControllerConfig::from_env())),
        Arc::new(RwLock::new(ServerConfig::from_env())),
    )
}

/// Read environment variable or return default value
pub(crate) fn env_var_or_default<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Read environment variable as string or return default
pub(crate) fn env_var_or_default_str(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}
