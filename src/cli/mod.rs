//! # pagesctl
//!
//! Command-line interface for the Pages Release Controller.
//!
//! ## Usage
//!
//! ```bash
//! # List PagesProject resources
//! pagesctl list
//!
//! # Show versions, production and validation history of a project
//! pagesctl status docs --namespace web
//!
//! # Trigger reconciliation
//! pagesctl reconcile docs
//!
//! # Suspend / resume reconciliation
//! pagesctl suspend docs
//! pagesctl resume docs
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use kube::Client;

mod list;
mod reconcile;
mod status;
mod suspend;

/// Pages Release Controller CLI
#[derive(Parser)]
#[command(name = "pagesctl")]
#[command(
    about = "Pages Release Controller CLI",
    long_about = None,
    after_help = "\
Examples:
  pagesctl list
  pagesctl status docs --namespace web
  pagesctl reconcile docs
"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Kubernetes namespace (defaults to \"default\"; `list` spans all namespaces when omitted)
    #[arg(short, long, global = true)]
    namespace: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// List PagesProject resources
    List,
    /// Show status of a PagesProject: versions, production and validation history
    Status {
        /// Name of the PagesProject resource
        #[arg(value_name = "NAME")]
        name: String,
    },
    /// Trigger reconciliation for a PagesProject
    Reconcile {
        /// Name of the PagesProject resource
        #[arg(value_name = "NAME")]
        name: String,
    },
    /// Suspend reconciliation for a PagesProject
    Suspend {
        /// Name of the PagesProject resource
        #[arg(value_name = "NAME")]
        name: String,
    },
    /// Resume reconciliation for a PagesProject
    Resume {
        /// Name of the PagesProject resource
        #[arg(value_name = "NAME")]
        name: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        return Err(anyhow::anyhow!("Failed to install rustls crypto provider"));
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pagesctl=info".into()),
        )
        .init();

    let cli = Cli::parse();

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client. Ensure kubeconfig is configured.")?;

    match cli.command {
        Commands::List => list::list_command(client, cli.namespace).await,
        Commands::Status { name } => status::status_command(client, name, cli.namespace).await,
        Commands::Reconcile { name } => {
            reconcile::reconcile_command(client, name, cli.namespace).await
        }
        Commands::Suspend { name } => suspend::suspend_command(client, name, cli.namespace).await,
        Commands::Resume { name } => suspend::resume_command(client, name, cli.namespace).await,
    }
}
