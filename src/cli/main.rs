use anyhow::Context;
use clap::{Parser, Subcommand};
use incident_bridge::models::Severity;
use reqwest::Client;
use serde_json::json;

#[derive(Parser)]
#[command(name = "incident-bridge-cli")]
#[command(about = "Incident Bridge CLI", long_about = None)]
struct Cli {
    #[arg(short, long, env = "INCIDENT_BRIDGE_ENDPOINT", default_value = "http://localhost:8000")]
    endpoint: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check server health
    Health,

    /// Show the application/capability tree
    Tree,

    /// Raise an incident for selected applications and capabilities
    Raise {
        #[arg(short, long)]
        title: String,

        #[arg(short = 'S', long, default_value = "P2")]
        severity: Severity,

        /// Application id (repeatable)
        #[arg(short, long = "app")]
        apps: Vec<u64>,

        /// Capability id (repeatable)
        #[arg(short, long = "cap")]
        caps: Vec<u64>,
    },

    /// Show the incident audit log
    Log {
        #[arg(short, long, default_value = "0")]
        page: u32,

        #[arg(short = 's', long, default_value = "20")]
        page_size: u32,
    },

    /// List known tags
    Tags,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let client = Client::new();

    let response = match cli.command {
        Commands::Health => client.get(format!("{}/health", cli.endpoint)).send().await?,

        Commands::Tree => client.get(format!("{}/api/tree", cli.endpoint)).send().await?,

        Commands::Raise {
            title,
            severity,
            apps,
            caps,
        } => {
            if apps.is_empty() && caps.is_empty() {
                eprintln!("Error: select at least one --app or --cap");
                std::process::exit(2);
            }

            client
                .post(format!("{}/api/incidents", cli.endpoint))
                .json(&json!({
                    "title": title,
                    "severity": severity,
                    "application_ids": apps,
                    "capability_ids": caps,
                }))
                .send()
                .await?
        }

        Commands::Log { page, page_size } => {
            client
                .get(format!(
                    "{}/api/incidents/log?page={}&page_size={}",
                    cli.endpoint, page, page_size
                ))
                .send()
                .await?
        }

        Commands::Tags => client.get(format!("{}/api/admin/tags", cli.endpoint)).send().await?,
    };

    let status = response.status();
    let body: serde_json::Value = response
        .json()
        .await
        .with_context(|| format!("Unreadable response from {} ({})", cli.endpoint, status))?;
    println!("{}", serde_json::to_string_pretty(&body)?);

    // Incident failures arrive as 200 with status "error"
    let failed = !status.is_success() || body.get("status").and_then(|s| s.as_str()) == Some("error");
    if failed {
        std::process::exit(1);
    }

    Ok(())
}
