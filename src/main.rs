use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use weft_core::status::{StatusHub, STATUS_TOPIC};
use weft_core::types::Workflow;
use weft_engine::{Engine, Services};
use weft_store::{Vault, WorkflowStore};

#[derive(Parser)]
#[command(name = "weft", version, about = "Workflow graph execution engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the planned execution order for a workflow file
    Plan {
        /// Path to a workflow JSON file
        #[arg(short, long)]
        workflow: PathBuf,
    },
    /// Execute a workflow file and print the final context
    Run {
        /// Path to a workflow JSON file
        #[arg(short, long)]
        workflow: PathBuf,
        /// Initial context as a JSON object
        #[arg(short, long)]
        data: Option<String>,
        /// Path to a SQLite store (credentials, inventory, orders)
        #[arg(long)]
        store: Option<PathBuf>,
        /// Print status events as they arrive
        #[arg(long)]
        watch: bool,
    },
}

fn load_workflow(path: &PathBuf) -> anyhow::Result<Workflow> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Plan { workflow } => {
            let workflow = load_workflow(&workflow)?;
            let plan = weft_engine::plan(&workflow)?;
            if plan.is_empty() {
                println!("(empty plan — no trigger nodes)");
            }
            for (index, node) in plan.iter().enumerate() {
                println!("{:>3}. {} [{}]", index + 1, node.id, node.kind);
            }
        }
        Commands::Run {
            workflow,
            data,
            store,
            watch,
        } => {
            let workflow = load_workflow(&workflow)?;
            let initial_data = data
                .map(|raw| serde_json::from_str(&raw))
                .transpose()
                .context("--data must be a JSON object")?;

            let mut services = Services::new();
            if let Some(path) = store {
                let vault = Vault::from_env().context("store configured; ENCRYPTION_KEY required")?;
                services = services.with_store(Arc::new(WorkflowStore::open(&path, vault)?));
            }

            let hub = Arc::new(StatusHub::default());
            let engine = Engine::new(services, hub.clone());

            if watch {
                let token = hub.issue_token(STATUS_TOPIC, chrono::Duration::minutes(10));
                let mut events = hub.subscribe(&token)?;
                tokio::spawn(async move {
                    while let Ok(event) = events.recv().await {
                        info!(
                            node_id = %event.node_id,
                            kind = %event.node_kind,
                            status = ?event.status,
                            "node status"
                        );
                    }
                });
            }

            let context = engine.execute_workflow(&workflow, initial_data).await?;
            println!("{}", serde_json::to_string_pretty(&context.to_value())?);
        }
    }

    Ok(())
}
