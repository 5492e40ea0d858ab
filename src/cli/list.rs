//! # List Command

use anyhow::{Context, Result};
use kube::{api::Api, Client};
use pages_release_controller::crd::PagesProject;

/// List PagesProject resources with their policy and production version
pub async fn list_command(client: Client, namespace: Option<String>) -> Result<()> {
    let api: Api<PagesProject> = if let Some(ns) = &namespace {
        println!("Listing PagesProject resources in namespace '{ns}'...");
        Api::namespaced(client, ns)
    } else {
        println!("Listing PagesProject resources in all namespaces...");
        Api::all(client)
    };

    let projects = api
        .list(&kube::api::ListParams::default())
        .await
        .context("Failed to list PagesProject resources")?;

    if projects.items.is_empty() {
        println!("No PagesProject resources found.");
        return Ok(());
    }

    println!(
        "\n{:<28} {:<18} {:<14} {:<10} {:<8} {:<16} {:<12}",
        "NAME", "NAMESPACE", "POLICY", "PHASE", "SUSPEND", "PRODUCTION", "DEPLOYMENTS"
    );
    println!("{}", "-".repeat(112));

    for project in projects.items {
        let name = project.metadata.name.as_deref().unwrap_or("<unknown>");
        let ns = project.metadata.namespace.as_deref().unwrap_or("<unknown>");
        let policy = project.spec.version_management.kind().as_str();
        let suspend = if project.spec.suspend { "Yes" } else { "No" };

        let phase = project
            .status
            .as_ref()
            .and_then(|s| s.phase.as_deref())
            .unwrap_or("-");
        let production = project
            .status
            .as_ref()
            .and_then(|s| s.current_production.as_ref())
            .map_or("-", |p| p.version.as_str());
        let deployments = project
            .status
            .as_ref()
            .map_or_else(|| "-".to_string(), |s| s.managed_deployments.to_string());

        println!(
            "{name:<28} {ns:<18} {policy:<14} {phase:<10} {suspend:<8} {production:<16} {deployments:<12}"
        );
    }

    Ok(())
}
