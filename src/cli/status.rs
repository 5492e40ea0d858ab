//! # Status Command
//!
//! Shows the managed release set of a PagesProject.

use anyhow::{Context, Result};
use kube::{api::Api, Client};
use pages_release_controller::crd::{PagesProject, VersionManagement};

/// Show detailed status of a PagesProject resource
pub async fn status_command(client: Client, name: String, namespace: Option<String>) -> Result<()> {
    let ns = namespace.as_deref().unwrap_or("default");

    println!("Status for PagesProject '{ns}/{name}'");
    println!();

    let api: Api<PagesProject> = Api::namespaced(client, ns);

    let project = api
        .get(&name)
        .await
        .with_context(|| format!("Failed to get PagesProject '{ns}/{name}'"))?;

    println!("Spec:");
    println!("  External Project: {}", project.external_name());
    println!("  Suspend: {}", project.spec.suspend);
    println!(
        "  Declared Versions: {}",
        project
            .spec
            .versions
            .iter()
            .map(|v| v.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );
    if let Some(target) = &project.spec.production_target {
        println!("  Production Target: {target}");
    }
    println!(
        "  Revision History Limit: {}",
        project.revision_history_limit()
    );
    println!(
        "  Policy: {}",
        project.spec.version_management.kind().as_str()
    );
    match &project.spec.version_management {
        VersionManagement::GitOps(gitops) => {
            if let Some(preview) = &gitops.preview_version {
                println!("    Preview Version: {preview}");
            }
            if let Some(production) = &gitops.production_version {
                println!("    Production Version: {production}");
            }
            println!(
                "    Require Preview Validation: {}",
                gitops.require_preview_validation
            );
        }
        VersionManagement::External(external) => {
            if let Some(current) = &external.current_version {
                println!("    Current Version: {current}");
            }
            if let Some(production) = &external.production_version {
                println!("    Production Version: {production}");
            }
            println!("    Sync Interval: {}", external.sync_interval);
        }
        VersionManagement::LatestPreview(latest) => {
            println!("    Auto Promote: {}", latest.auto_promote);
        }
        VersionManagement::Declarative | VersionManagement::AutoPromote(_) => {}
    }

    let Some(status) = &project.status else {
        println!();
        println!("Status: No status available (resource may not have been reconciled yet)");
        return Ok(());
    };

    println!();
    println!("Status:");
    if let Some(phase) = &status.phase {
        println!("  Phase: {phase}");
    }
    if let Some(description) = &status.description {
        println!("  Description: {description}");
    }
    if let Some(last_reconcile_time) = &status.last_reconcile_time {
        println!("  Last Reconcile Time: {last_reconcile_time}");
    }
    if let Some(last_synced) = &status.last_synced_version {
        println!("  Last Synced Version: {last_synced}");
    }
    if let Some(preview) = &status.current_preview {
        println!("  Current Preview: {preview}");
    }

    println!();
    match &status.current_production {
        Some(production) => {
            println!("Production:");
            println!("  Version: {}", production.version);
            println!("  Deployment: {}", production.deployment_name);
            if let Some(id) = &production.deployment_id {
                println!("  Deployment ID: {id}");
            }
            if let Some(url) = &production.url {
                println!("  URL: {url}");
            }
        }
        None => println!("Production: none"),
    }

    if !status.managed_versions.is_empty() {
        println!();
        println!(
            "{:<16} {:<44} {:<10} {:<12}",
            "VERSION", "DEPLOYMENT", "STATE", "ENVIRONMENT"
        );
        for version in &status.managed_versions {
            let state = version.state.map_or("pending", |s| s.as_str());
            let environment = if version.is_production {
                "production"
            } else {
                "preview"
            };
            println!(
                "{:<16} {:<44} {:<10} {:<12}",
                version.name, version.deployment_name, state, environment
            );
        }
    }

    if !status.validation_history.is_empty() {
        println!();
        println!("Validation History (newest last):");
        for record in &status.validation_history {
            println!(
                "  {} {} {} by {}: {:?}",
                record.timestamp,
                record.version,
                record.deployment_id,
                record.validated_by,
                record.result
            );
        }
    }

    if !status.conditions.is_empty() {
        println!();
        println!("Conditions:");
        for condition in &status.conditions {
            println!("  {}: {}", condition.r#type, condition.status);
            if let Some(reason) = &condition.reason {
                println!("    Reason: {reason}");
            }
            if let Some(message) = &condition.message {
                println!("    Message: {message}");
            }
            if let Some(last_transition_time) = &condition.last_transition_time {
                println!("    Last Transition: {last_transition_time}");
            }
        }
    }

    Ok(())
}
