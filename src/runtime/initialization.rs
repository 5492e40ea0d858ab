//! # Initialization
//!
//! Controller initialization logic including rustls setup, tracing, metrics,
//! server startup, and Kubernetes client setup.

use crate::config::{create_shared_config, SharedControllerConfig, SharedServerConfig};
use crate::constants::CONTROLLER_NAME;
use crate::controller::reconciler::{reconcile, Reconciler, TriggerSource};
use crate::controller::server::{start_server, ServerState};
use crate::crd::{PagesDeployment, PagesProject};
use crate::events::KubeEventSink;
use crate::observability;
use crate::store::KubeStore;
use anyhow::{Context, Result};
use kube::{api::Api, api::ListParams, Client};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info, warn, Instrument};

/// Initialization result containing all necessary components for the controller
pub struct InitializationResult {
    /// Kubernetes client
    pub client: Client,
    /// API for PagesProject resources (all namespaces or `WATCH_NAMESPACE`)
    pub projects: Api<PagesProject>,
    /// API for PagesDeployment resources, same scope as `projects`
    pub deployments: Api<PagesDeployment>,
    /// Reconciler context
    pub reconciler: Arc<Reconciler>,
    /// Server state for health checks
    pub server_state: Arc<ServerState>,
    /// Shared controller configuration
    pub controller_config: SharedControllerConfig,
    /// Shared server configuration
    pub server_config: SharedServerConfig,
}

impl std::fmt::Debug for InitializationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitializationResult")
            .field("server_ready", &self.server_state.ready())
            .finish_non_exhaustive()
    }
}

/// Initialize the controller runtime
///
/// This function handles:
/// - rustls crypto provider setup
/// - Tracing subscriber setup
/// - Metrics registration
/// - HTTP server startup
/// - Kubernetes client creation
/// - Reconciler setup
/// - Reconcile existing resources
pub async fn initialize() -> Result<InitializationResult> {
    // Must run before anything touches rustls
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        return Err(anyhow::anyhow!("Failed to install rustls crypto provider"));
    }

    let (controller_config, server_config) = create_shared_config();

    init_tracing(&*controller_config.read().await);

    info!("Starting Pages Release Controller");
    info!(
        "Build info: timestamp={}, datetime={}, git_hash={}",
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_DATETIME"),
        env!("BUILD_GIT_HASH")
    );

    observability::metrics::register_metrics()?;

    let server_state = Arc::new(ServerState::new());

    let server_port = server_config.read().await.metrics_port;
    let server_state_clone = Arc::clone(&server_state);
    let server_handle = tokio::spawn(async move {
        if let Err(e) = start_server(server_port, server_state_clone).await {
            error!("HTTP server error: {}", e);
        }
    });

    // Readiness probes should pass as soon as the watch starts
    wait_for_server_ready(&server_state, &server_handle, server_config.clone()).await?;

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;

    let watch_namespace = controller_config.read().await.watch_namespace.clone();
    let (projects, deployments): (Api<PagesProject>, Api<PagesDeployment>) =
        match watch_namespace.as_deref() {
            Some(namespace) => {
                info!("Watching PagesProject resources in namespace {}", namespace);
                (
                    Api::namespaced(client.clone(), namespace),
                    Api::namespaced(client.clone(), namespace),
                )
            }
            None => {
                info!("Watching PagesProject resources in all namespaces");
                (Api::all(client.clone()), Api::all(client.clone()))
            }
        };

    let reconciler = Arc::new(Reconciler::new(
        Arc::new(KubeStore::new(client.clone())),
        Arc::new(KubeEventSink::new(client.clone(), CONTROLLER_NAME)),
        controller_config.read().await.clone(),
    ));

    reconcile_existing_resources(&projects, &reconciler).await?;

    info!("Controller initialized, starting watch loop...");

    Ok(InitializationResult {
        client,
        projects,
        deployments,
        reconciler,
        server_state,
        controller_config,
        server_config,
    })
}

/// Install the global tracing subscriber
///
/// `RUST_LOG` wins over `LOG_LEVEL` when both are set.
fn init_tracing(config: &crate::config::ControllerConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "pages_release_controller={}",
            config.log_level.to_ascii_lowercase()
        )
        .into()
    });

    let result = if config.json_logs() {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .try_init()
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).try_init()
    };
    if let Err(e) = result {
        warn!("Tracing subscriber init returned error (already initialized?): {}", e);
    }
}

/// Wait for the HTTP server to become ready
async fn wait_for_server_ready(
    server_state: &Arc<ServerState>,
    server_handle: &tokio::task::JoinHandle<()>,
    server_config: SharedServerConfig,
) -> Result<()> {
    let config = server_config.read().await;
    let startup_timeout = std::time::Duration::from_secs(config.startup_timeout_secs);
    let poll_interval = std::time::Duration::from_millis(config.poll_interval_ms);
    drop(config);
    let start_time = std::time::Instant::now();

    loop {
        if server_handle.is_finished() {
            return Err(anyhow::anyhow!("HTTP server failed to start"));
        }

        if server_state.ready() {
            info!("HTTP server is ready and accepting connections");
            break;
        }

        if start_time.elapsed() > startup_timeout {
            return Err(anyhow::anyhow!(
                "HTTP server failed to become ready within {} seconds",
                startup_timeout.as_secs()
            ));
        }

        tokio::time::sleep(poll_interval).await;
    }

    Ok(())
}

/// Reconcile existing PagesProject resources before starting the watch
///
/// A missing CRD is logged, not fatal: the watch loop keeps retrying.
async fn reconcile_existing_resources(
    projects: &Api<PagesProject>,
    reconciler: &Arc<Reconciler>,
) -> Result<()> {
    let span = tracing::info_span!(
        "controller.startup.reconcile_existing",
        operation = "reconcile_existing_resources"
    );

    let list = match projects.list(&ListParams::default()).instrument(span.clone()).await {
        Ok(list) => list,
        Err(e) => {
            error!("CRD is not queryable; {:?}. Is the CRD installed?", e);
            error!("Installation: crdgen | kubectl apply -f -");
            warn!("Continuing despite CRD queryability check failure - controller will retry");
            return Ok(());
        }
    };

    if list.items.is_empty() {
        info!("No existing PagesProject resources found, watch will pick up new resources");
        return Ok(());
    }

    let mut by_namespace: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for item in &list.items {
        by_namespace
            .entry(item.metadata.namespace.clone().unwrap_or_default())
            .or_default()
            .push(item.metadata.name.clone().unwrap_or_default());
    }

    info!("Pages Release Controller - Startup Resource Summary");
    info!("Total PagesProject resources: {}", list.items.len());
    for (namespace, names) in &mut by_namespace {
        names.sort();
        let shown = if names.len() <= 3 {
            names.join(", ")
        } else {
            format!("{}, ... ({} total)", names[..3].join(", "), names.len())
        };
        info!("Namespace {}: {}", namespace, shown);
    }

    for item in list.items {
        let name = item.metadata.name.clone().unwrap_or_default();
        let namespace = item.metadata.namespace.clone().unwrap_or_default();
        let resource_span = tracing::info_span!(
            "controller.startup.reconcile_resource",
            resource.name = name.as_str(),
            resource.namespace = namespace.as_str(),
            resource.kind = "PagesProject"
        );

        match reconcile(Arc::new(item), Arc::clone(reconciler), TriggerSource::Startup)
            .instrument(resource_span)
            .await
        {
            Ok(_) => info!("Reconciled existing PagesProject {}/{}", namespace, name),
            Err(e) => {
                // Continue with other resources even if one fails
                error!(
                    "Failed to reconcile existing PagesProject {}/{}: {}",
                    namespace, name, e
                );
            }
        }
    }

    Ok(())
}
