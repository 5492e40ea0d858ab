//! # Suspend/Resume Commands

use anyhow::{Context, Result};
use kube::{api::Api, api::Patch, api::PatchParams, Client};
use pages_release_controller::crd::PagesProject;
use serde_json::json;

/// Suspend reconciliation for a PagesProject
pub async fn suspend_command(client: Client, name: String, namespace: Option<String>) -> Result<()> {
    set_suspend(client, &name, namespace.as_deref(), true).await
}

/// Resume reconciliation for a PagesProject
pub async fn resume_command(client: Client, name: String, namespace: Option<String>) -> Result<()> {
    set_suspend(client, &name, namespace.as_deref(), false).await
}

async fn set_suspend(
    client: Client,
    name: &str,
    namespace: Option<&str>,
    suspend: bool,
) -> Result<()> {
    let ns = namespace.unwrap_or("default");
    let verb = if suspend { "Suspending" } else { "Resuming" };
    println!("{verb} reconciliation for PagesProject '{ns}/{name}'...");

    let api: Api<PagesProject> = Api::namespaced(client, ns);

    let project = api
        .get(name)
        .await
        .with_context(|| format!("Failed to get PagesProject '{ns}/{name}'"))?;

    if project.spec.suspend == suspend {
        if suspend {
            println!("   Resource is already suspended");
        } else {
            println!("   Resource is already active (not suspended)");
        }
        return Ok(());
    }

    let patch = json!({
        "spec": {
            "suspend": suspend
        }
    });

    api.patch(name, &PatchParams::default(), &Patch::Merge(patch))
        .await
        .with_context(|| format!("Failed to update suspend on PagesProject '{ns}/{name}'"))?;

    if suspend {
        println!("Reconciliation suspended successfully");
        println!("\nTo resume reconciliation, run:");
        println!("   pagesctl resume {name} --namespace {ns}");
    } else {
        println!("Reconciliation resumed successfully");
        println!("\nThe controller will reconcile this resource shortly.");
    }

    Ok(())
}
