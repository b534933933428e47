use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand};
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

use nodeflow_core::config::AppConfig;
use nodeflow_core::traits::{ExecutionLogStore, WorkflowStore};
use nodeflow_core::types::{Edge, Node};
use nodeflow_engine::{NodeDispatcher, WorkflowEngine};
use nodeflow_store::{MemoryLogStore, SqliteLogStore, SqliteWorkflowStore};

#[derive(Parser)]
#[command(name = "nodeflow", version, about = "Graph workflow execution engine")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "nodeflow.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway
    Serve,
    /// Execute a workflow document once and print the results
    Run {
        /// JSON file with `nodes` and `edges` (and optionally `id`, `name`)
        file: PathBuf,
        /// Keep the execution log in memory instead of the database
        #[arg(long)]
        no_persist: bool,
    },
    /// Show execution logs, newest first
    Logs {
        /// Only logs for this workflow id
        #[arg(long)]
        workflow: Option<String>,
    },
    /// Show current configuration
    Config,
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// A workflow as read from disk. Stored workflow documents parse as well.
#[derive(serde::Deserialize)]
struct WorkflowFile {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    nodes: Vec<Node>,
    #[serde(default)]
    edges: Vec<Edge>,
}

impl WorkflowFile {
    fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read workflow file {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Invalid workflow file {}", path.display()))
    }

    /// Explicit id, else the file stem, so CLI runs are logged too.
    fn workflow_id(&self, path: &Path) -> String {
        self.id.clone().unwrap_or_else(|| {
            path.file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "workflow".to_string())
        })
    }
}

fn open_log_store(config: &AppConfig) -> anyhow::Result<Arc<dyn ExecutionLogStore>> {
    let store = SqliteLogStore::open(&config.store_path())?
        .with_max_entries(config.store.max_log_entries);
    Ok(Arc::new(store))
}

fn build_engine(config: &AppConfig, logs: Arc<dyn ExecutionLogStore>) -> WorkflowEngine {
    let cleaner = nodeflow_llm::create_cleaner(&config.transform);
    WorkflowEngine::new(NodeDispatcher::from_config(config, cleaner)).with_log_store(logs)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("nodeflow=info,warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Handle completions before config loading
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(*shell, &mut cmd, "nodeflow", &mut std::io::stdout());
        return Ok(());
    }

    let config = AppConfig::load_or_default(&cli.config)?;

    match cli.command {
        Commands::Config => {
            println!("{}", toml::to_string_pretty(&config)?);
        }
        Commands::Run { file, no_persist } => {
            let workflow = WorkflowFile::load(&file)?;
            let workflow_id = workflow.workflow_id(&file);

            let logs: Arc<dyn ExecutionLogStore> = if no_persist {
                Arc::new(MemoryLogStore::with_max_entries(config.store.max_log_entries))
            } else {
                open_log_store(&config)?
            };
            let engine = build_engine(&config, logs);

            let results = engine
                .execute_workflow(
                    &workflow.nodes,
                    &workflow.edges,
                    Some(&workflow_id),
                    workflow.name.as_deref(),
                )
                .await?;

            let output = json!({
                "success": true,
                "results": results,
                "workflowId": workflow_id,
                "workflowName": workflow.name,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Commands::Logs { workflow } => {
            let logs = open_log_store(&config)?;
            let entries = match workflow.as_deref() {
                Some(id) => logs.list_for_workflow(id).await?,
                None => logs.list_all().await?,
            };
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        Commands::Serve => {
            let logs = open_log_store(&config)?;
            let workflows: Arc<dyn WorkflowStore> =
                Arc::new(SqliteWorkflowStore::open(&config.store_path())?);
            let engine = Arc::new(build_engine(&config, logs.clone()));

            let gateway_config = config.gateway_or_default();
            info!(bind = %gateway_config.bind, "Starting HTTP gateway");
            let server =
                nodeflow_gateway::GatewayServer::new(gateway_config, engine, workflows, logs);

            let cancel = tokio_util::sync::CancellationToken::new();
            let cancel_clone = cancel.clone();

            // Graceful shutdown on Ctrl-C
            tokio::spawn(async move {
                tokio::signal::ctrl_c().await.ok();
                info!("Shutting down gateway...");
                cancel_clone.cancel();
            });

            server.run(cancel).await?;
        }
        // Handled above
        Commands::Completions { .. } => {}
    }

    Ok(())
}
