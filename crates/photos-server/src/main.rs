//! CLI entry point for the photos-server HTTP API.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing_subscriber::{fmt, EnvFilter};

use photos_agent::{collect_until_terminal, AgentRunner};
use photos_blob::BlobClient;
use photos_core::{AppConfig, PersonId};
use photos_graph::GraphClient;
use photos_server::{router, AppState};

#[derive(Parser)]
#[command(name = "photos-server")]
#[command(about = "HTTP API and natural-language search for the photo graph")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Config file prefix (default: photos).
    #[arg(short, long, default_value = "photos", global = true)]
    config: String,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the HTTP API (default).
    Serve,
    /// Create the tables, indexes and property graph.
    Schema,
    /// Load the sample people, photos and relationships.
    Seed,
    /// Run one search as the configured user and print its events.
    Ask {
        /// The request, e.g. "Show me photos of my cousins from Goa".
        message: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).json().init();

    let cli = Cli::parse();
    let config = AppConfig::load(&cli.config)?;

    let graph = GraphClient::connect(&config.spanner).await?;
    tracing::info!(graph = %graph.graph_name(), "Connected to graph database");

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config, graph).await?,
        Command::Schema => {
            graph.apply_schema().await?;
            tracing::info!("Schema applied");
        }
        Command::Seed => {
            let rows = graph.seed().await?;
            tracing::info!(rows, "Sample data loaded");
        }
        Command::Ask { message } => {
            let person_id = PersonId::new(config.server.person_id.clone());
            let user = graph
                .person_by_id(&person_id)
                .await?
                .first()
                .ok_or_else(|| anyhow::anyhow!("person {person_id} not found"))?;
            let blob = BlobClient::from_config(&config.storage)?;
            let agent = AgentRunner::from_config(&config.agent, graph)?.with_media(blob);

            let (tx, rx) = mpsc::unbounded_channel();
            let outcome = agent.run(&user.name, &message, &tx).await;
            drop(tx);
            for event in collect_until_terminal(rx).await {
                println!("{}", serde_json::to_string(&event)?);
            }
            outcome?;
        }
    }

    Ok(())
}

async fn serve(config: AppConfig, graph: GraphClient) -> anyhow::Result<()> {
    let blob = BlobClient::from_config(&config.storage)?;
    let agent = AgentRunner::from_config(&config.agent, graph.clone())?.with_media(blob.clone());
    let state = AppState {
        graph,
        blob,
        agent: Arc::new(agent),
        config: Arc::new(config.server.clone()),
    };

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, model = %state.agent.model_name(), "Listening");

    axum::serve(listener, router(state)).await?;
    Ok(())
}
