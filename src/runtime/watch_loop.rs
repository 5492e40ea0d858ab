//! # Watch Loop
//!
//! Controller watch loop that monitors `PagesProject` resources, and the
//! `PagesDeployment` objects they own, and triggers reconciliation when
//! either changes.

use crate::config::SharedControllerConfig;
use crate::controller::reconciler::status::is_manual_trigger;
use crate::controller::reconciler::{reconcile, Reconciler, ReconcilerError, TriggerSource};
use crate::controller::server::ServerState;
use crate::crd::{PagesDeployment, PagesProject};
use crate::runtime::error_policy::{handle_reconciliation_error, handle_watch_stream_error};
use futures::StreamExt;
use kube::api::Api;
use kube_runtime::{controller::Action, watcher, Controller};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn, Instrument};

/// Run the controller watch loop
///
/// Owned deployment changes (a backend finishing a build, someone editing the
/// environment by hand) map back to the owning project through owner
/// references. The loop restarts the controller when its stream ends and exits
/// once the server has been marked not ready by the shutdown handler.
pub async fn run_watch_loop(
    projects: Api<PagesProject>,
    deployments: Api<PagesDeployment>,
    reconciler: Arc<Reconciler>,
    server_state: Arc<ServerState>,
    controller_config: SharedControllerConfig,
) -> Result<(), anyhow::Error> {
    info!("Starting controller watch loop...");

    let config = controller_config.read().await;
    let backoff_start_ms = config.backoff_start_ms;
    drop(config);

    let backoff_duration_ms = Arc::new(AtomicU64::new(backoff_start_ms));

    // Flip readiness on SIGINT/SIGTERM so in-flight passes drain and the loop exits
    let shutdown_server_state = Arc::clone(&server_state);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for shutdown signal: {}", e);
            return;
        }
        info!("Received shutdown signal (SIGINT/SIGTERM), initiating graceful shutdown...");
        shutdown_server_state.set_ready(false);
        info!("Marked server as not ready, waiting for in-flight reconciliations to complete...");
    });

    loop {
        if !server_state.ready() {
            info!("Shutdown requested, exiting watch loop");
            break;
        }

        let backoff = Arc::clone(&backoff_duration_ms);
        let config_for_filter = controller_config.clone();
        let watch_span = tracing::span!(
            tracing::Level::INFO,
            "controller.watch",
            operation = "watch_loop"
        );

        Controller::new(projects.clone(), watcher::Config::default().any_semantic())
            .owns(deployments.clone(), watcher::Config::default())
            .shutdown_on_signal()
            .run(
                create_reconcile_fn,
                |obj, error, ctx| handle_reconciliation_error(obj, error, ctx),
                Arc::clone(&reconciler),
            )
            .filter_map(move |x| {
                let backoff = Arc::clone(&backoff);
                let config = config_for_filter.clone();
                async move {
                    match &x {
                        Ok(_) => {
                            let config = config.read().await;
                            backoff.store(config.backoff_start_ms, Ordering::Relaxed);
                            drop(config);
                            debug!("watch.event.success");
                            Some(x)
                        }
                        Err(e) => {
                            let error_string = format!("{e:?}");
                            let config = config.read().await;
                            let max_backoff = config.backoff_max_ms;
                            let watch_restart_delay = config.watch_restart_delay_secs;
                            drop(config);
                            handle_watch_stream_error(
                                &error_string,
                                &backoff,
                                max_backoff,
                                watch_restart_delay,
                            )
                            .await
                            .map(|()| x)
                        }
                    }
                }
            })
            .for_each(|_| futures::future::ready(()))
            .instrument(watch_span)
            .await;

        if !server_state.ready() {
            info!("Shutdown requested, exiting watch loop");
            break;
        }

        let config = controller_config.read().await;
        let delay_secs = config.watch_restart_delay_after_end_secs;
        drop(config);
        warn!(
            "Controller watch stream ended, restarting in {} seconds...",
            delay_secs
        );
        tokio::time::sleep(std::time::Duration::from_secs(delay_secs)).await;
    }

    info!("Controller stopped gracefully");
    Ok(())
}

/// Create the reconciliation future for one watch-triggered pass
fn create_reconcile_fn(
    obj: Arc<PagesProject>,
    ctx: Arc<Reconciler>,
) -> impl std::future::Future<Output = Result<Action, ReconcilerError>> + Send {
    let name = obj
        .metadata
        .name
        .as_deref()
        .unwrap_or("unknown")
        .to_string();
    let namespace = obj
        .metadata
        .namespace
        .as_deref()
        .unwrap_or("default")
        .to_string();

    // Manual triggers come from `pagesctl reconcile` stamping an annotation
    let trigger_source = if is_manual_trigger(&obj) {
        TriggerSource::ManualCli
    } else {
        TriggerSource::WatchEvent
    };

    async move {
        debug!(
            resource.name = name.as_str(),
            resource.namespace = namespace.as_str(),
            generation = obj.metadata.generation.unwrap_or(0),
            trigger_source = trigger_source.as_str(),
            "watch.event.received"
        );

        let result = reconcile(obj, ctx, trigger_source).await;

        match &result {
            Ok(action) => {
                debug!(resource.name = name.as_str(), action = ?action, "watch.event.reconciled");
            }
            Err(e) => {
                error!(resource.name = name.as_str(), error = %e, "watch.event.reconciliation_failed");
            }
        }

        result
    }
}
