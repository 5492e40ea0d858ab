//! # Runtime
//!
//! Process-level wiring around the reconciler.
//!
//! - `initialization`: rustls, tracing, metrics, HTTP server and client setup
//! - `watch_loop`: `PagesProject` controller with owned `PagesDeployment` watches
//! - `error_policy`: Per-project Fibonacci backoff and watch stream error handling

pub mod error_policy;
pub mod initialization;
pub mod watch_loop;
