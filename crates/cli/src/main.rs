//! meshctl
//!
//! Command-line client for the mesh telemetry server: lists the traffic
//! edges between workloads and checks the server's health.

mod client;
mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::edges::EdgesQuery;
use output::OutputFormat;

const DEFAULT_API_URL: &str = "http://localhost:8085";
const DEFAULT_NAMESPACE: &str = "default";

#[derive(Parser)]
#[command(name = "meshctl")]
#[command(author, version, about = "CLI for the mesh telemetry edges API", long_about = None)]
pub struct Cli {
    /// Telemetry server URL (overrides the config file)
    #[arg(long, global = true, env = "MESHCTL_API_URL")]
    pub api_url: Option<String>,

    /// Output format (overrides the config file)
    #[arg(long, short, global = true)]
    pub format: Option<OutputFormat>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the traffic edges between resources, with their mTLS identities
    Edges {
        /// Resource type (deployment, pod, statefulset, ...)
        resource_type: String,

        /// Only edges from or to this resource
        name: Option<String>,

        /// Namespace of the source resources
        #[arg(long, short)]
        namespace: Option<String>,

        /// Edges in every namespace
        #[arg(long, short = 'A', conflicts_with = "namespace")]
        all_namespaces: bool,

        /// Edges fetched per request; every page is fetched
        #[arg(long, default_value_t = 0)]
        page_size: u32,
    },

    /// Check that the telemetry server is up and ready
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = config::Config::load()?;

    let api_url = cli
        .api_url
        .or(config.api_url.clone())
        .unwrap_or_else(|| DEFAULT_API_URL.to_string());
    let format = cli
        .format
        .or_else(|| config.default_format.as_deref().and_then(OutputFormat::from_name))
        .unwrap_or_default();

    let client = client::ApiClient::new(&api_url)?;

    match cli.command {
        Commands::Edges {
            resource_type,
            name,
            namespace,
            all_namespaces,
            page_size,
        } => {
            let namespace = if all_namespaces {
                String::new()
            } else {
                namespace
                    .or(config.default_namespace)
                    .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string())
            };
            let query = EdgesQuery {
                resource_type,
                name,
                namespace,
                page_size,
            };
            commands::edges::show_edges(&client, &query, format).await?;
        }
        Commands::Check => {
            commands::check::check(&client, format).await?;
        }
    }

    Ok(())
}
