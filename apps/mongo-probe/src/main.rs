//! Mongo Probe
//!
//! Connects to a MongoDB replica set, reports server information, and
//! verifies the write/read path by inserting a document and reading it back.

use clap::{Parser, Subcommand};
use core_config::tracing::{init_tracing, install_color_eyre};
use database::common::{OperationError, QueryError};
use database::mongodb::bson::{self, Document};
use database::mongodb::{CachedServerInfo, ClusterBackend, ConnectionManager, ProbeResult};
use eyre::{Result, WrapErr, eyre};
use serde_json::json;
use tracing::{error, info};

mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "mongo-probe")]
#[command(about = "Check connectivity and write/read health of a MongoDB replica set")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect, print server info, insert a test document and read it back (default)
    Run {
        /// Database to probe. Defaults to MONGODB_DATABASE.
        #[arg(short, long)]
        database: Option<String>,

        /// Probe payload as a JSON object. Defaults to {"name": "Test Document"}.
        #[arg(long, value_parser = parse_document)]
        document: Option<Document>,
    },

    /// Print server info and replica-set health as JSON
    Info,

    /// Print collections and document counts as JSON
    Summary {
        /// Database to summarize. Defaults to MONGODB_DATABASE.
        #[arg(short, long)]
        database: Option<String>,
    },
}

fn parse_document(raw: &str) -> Result<Document, String> {
    let value: serde_json::Value =
        serde_json::from_str(raw).map_err(|e| format!("invalid JSON: {e}"))?;
    if !value.is_object() {
        return Err("probe document must be a JSON object".to_string());
    }
    bson::to_document(&value).map_err(|e| format!("not representable as BSON: {e}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    install_color_eyre();

    let config = Config::from_env()?;
    init_tracing(&config.environment);

    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Run {
        database: None,
        document: None,
    });

    let manager = ConnectionManager::new(config.mongodb.clone());
    manager
        .connect()
        .await
        .wrap_err("MongoDB connection failed")?;

    let outcome = execute(&manager, &config, command).await;

    // Release the pool whether or not the command succeeded
    manager.close().await;

    if let Err(e) = &outcome {
        error!(error = %e, "Probe failed");
    }
    outcome
}

async fn execute(manager: &ConnectionManager, config: &Config, command: Commands) -> Result<()> {
    match command {
        Commands::Run { database, document } => {
            let database = config.database(database.as_deref());

            let report = run_checks(manager, database, document).await;
            if let Ok(probe) = &report.probe {
                println!("{}", serde_json::to_string_pretty(probe)?);
            }
            report.into_result()?;
        }

        Commands::Info => {
            let server = manager.server_info().await?;
            let replica_set = manager.replica_set_status().await?;
            let health = manager.health().await;
            let nodes_health = replica_set.nodes_health();

            let report = json!({
                "version": server.version,
                "healthy": server.healthy,
                "fetched_at": server.fetched_at_utc,
                "replica_set": replica_set,
                "nodes_health": nodes_health,
                "ping": health,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }

        Commands::Summary { database } => {
            let database = config.database(database.as_deref());
            let summary = manager.database_summary(database).await?;
            info!(
                collections = summary.collections.len(),
                documents = summary.total_documents(),
                "Database summary"
            );
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }

    Ok(())
}

/// Outcome of the `run` command. Both steps are always attempted.
struct RunReport {
    server: Result<CachedServerInfo, QueryError>,
    probe: Result<ProbeResult, OperationError>,
}

impl RunReport {
    fn into_result(self) -> Result<ProbeResult> {
        match (self.server, self.probe) {
            (Ok(_), Ok(probe)) => Ok(probe),
            (Err(server), Ok(_)) => {
                Err(eyre::Report::new(server).wrap_err("Server information failed"))
            }
            (Ok(_), Err(probe)) => Err(eyre::Report::new(probe).wrap_err("Probe failed")),
            (Err(server), Err(probe)) => Err(eyre!(
                "Server information failed ({server}) and probe failed ({probe})"
            )),
        }
    }
}

async fn run_checks<B: ClusterBackend>(
    manager: &ConnectionManager<B>,
    database: &str,
    document: Option<Document>,
) -> RunReport {
    let server = manager.server_info().await;
    match &server {
        Ok(server) => {
            info!(version = %server.version, healthy = server.healthy, "Server information")
        }
        Err(e) => error!(error = %e, "Server information unavailable, continuing with probe"),
    }

    let probe = match document {
        Some(document) => manager.probe_document(database, document).await,
        None => manager.probe(database).await,
    };
    match &probe {
        Ok(probe) => info!(
            id = %probe.inserted_id,
            round_trip_ms = probe.round_trip.as_millis() as u64,
            "Probe complete"
        ),
        Err(e) => error!(error = %e, "Write/read probe failed"),
    }

    RunReport { server, probe }
}
