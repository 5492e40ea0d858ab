//! # Pages Release Controller
//!
//! A Kubernetes controller that converges a project's declared versions into
//! hosted Pages deployments and decides which one serves production.
//!
//! ## Overview
//!
//! 1. **Release set** - one `PagesDeployment` per declared version, recreated when its source changes
//! 2. **Version policies** - declarative, gitops, latestPreview, autoPromote and external
//! 3. **Promotion** - at most one production deployment per project, gated by validation
//! 4. **Pruning** - deployments beyond `revisionHistoryLimit` are deleted, never production
//! 5. **Status** - managed versions, current production and validation history
//!
//! Exposes Prometheus metrics and health probes on `METRICS_PORT` (default 5000).

use anyhow::Result;
use pages_release_controller::runtime::{initialization::initialize, watch_loop::run_watch_loop};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let init = initialize().await?;

    run_watch_loop(
        init.projects,
        init.deployments,
        init.reconciler,
        init.server_state,
        init.controller_config,
    )
    .await?;

    info!("Pages Release Controller exited");
    Ok(())
}
