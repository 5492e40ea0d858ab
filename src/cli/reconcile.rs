//! # Reconcile Command
//!
//! Triggers reconciliation by stamping the manual trigger annotation.

use anyhow::{Context, Result};
use kube::{api::Api, api::Patch, api::PatchParams, Client};
use pages_release_controller::constants::ANNOTATION_MANUAL_RECONCILE;
use pages_release_controller::crd::PagesProject;
use serde_json::json;

/// Trigger reconciliation by adding/updating an annotation
/// The annotation change is a watch event; the controller clears it after the pass
pub async fn reconcile_command(
    client: Client,
    name: String,
    namespace: Option<String>,
) -> Result<()> {
    let ns = namespace.as_deref().unwrap_or("default");
    let api: Api<PagesProject> = Api::namespaced(client, ns);

    println!("Triggering reconciliation for PagesProject '{ns}/{name}'...");

    let project = api
        .get(&name)
        .await
        .with_context(|| format!("Failed to get PagesProject '{ns}/{name}'"))?;

    if project.spec.suspend {
        println!("   Warning: Resource is suspended. Reconciliation will be skipped.");
        println!("   Use 'pagesctl resume {name}' to resume reconciliation.");
    }

    let timestamp = chrono::Utc::now().to_rfc3339();
    let patch = json!({
        "metadata": {
            "annotations": {
                ANNOTATION_MANUAL_RECONCILE: timestamp
            }
        }
    });

    api.patch(&name, &PatchParams::default(), &Patch::Merge(patch))
        .await
        .with_context(|| format!("Failed to trigger reconciliation for PagesProject '{ns}/{name}'"))?;

    println!("Reconciliation triggered successfully");
    println!("   Resource: {ns}/{name}");
    println!("   Annotation: {ANNOTATION_MANUAL_RECONCILE}={timestamp}");
    println!("\nThe controller will reconcile this resource shortly.");

    Ok(())
}
