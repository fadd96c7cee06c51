// src/main.rs
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use shadoron_finance::{
    backend::{self, AppState},
    cli,
    config::AppConfig,
    export::ExportDocument,
    oracle::{OpenAiCompatClient, Oracle},
    sync::{HttpSyncTarget, OfflineQueue},
    FinanceService,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "shadoron", version, about = "Envelope budgeting with an AI advisor")]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Terminal UI (default)
    Tui,
    /// HTTP API
    Server,
    /// Replay the offline queue against REMOTE_URL
    Sync,
    /// Write the whole budget to a JSON file
    Export { path: PathBuf },
    /// Replace the budget with a previously exported file
    Import { path: PathBuf },
}

fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build_oracle(config: &AppConfig, service: &FinanceService) -> anyhow::Result<Option<Oracle>> {
    let Some(oracle_cfg) = config.oracle.clone() else {
        return Ok(None);
    };
    let client = OpenAiCompatClient::new(oracle_cfg)?;
    Ok(Some(Oracle::new(service.clone(), Arc::new(client))))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let args = Args::parse();
    let command = args.command.unwrap_or(Command::Tui);

    // the TUI owns the terminal, so keep it quiet unless asked
    init_tracing(if matches!(command, Command::Tui) { "warn" } else { "info" });

    let config = AppConfig::from_env()?;
    let service = FinanceService::open(&config.database_url)
        .await
        .with_context(|| format!("opening {}", config.database_url))?;

    match command {
        Command::Tui => {
            let oracle = build_oracle(&config, &service)?;
            cli::run(&config, service, oracle).await?;
        }
        Command::Server => {
            info!("Starting Backend Server...");
            let oracle = build_oracle(&config, &service)?;
            backend::run_server(AppState { service, oracle }, config.bind_addr).await?;
        }
        Command::Sync => {
            let remote = config
                .remote_url
                .as_deref()
                .context("REMOTE_URL is not set, nothing to sync against")?;
            let queue = OfflineQueue::new(service.pool().clone(), config.sync_max_attempts);
            let target = HttpSyncTarget::new(remote)?;
            let report = queue.drain(&target).await?;
            println!(
                "sent {}, dropped {}, still pending {}",
                report.sent, report.dead, report.remaining
            );
            if let Some(err) = report.last_error {
                println!("last error: {err}");
            }
        }
        Command::Export { path } => {
            let doc = service.export().await?;
            std::fs::write(&path, doc.to_json_pretty()?)
                .with_context(|| format!("writing {}", path.display()))?;
            println!("exported {} transactions to {}", doc.history.len(), path.display());
        }
        Command::Import { path } => {
            let text = std::fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
            let doc = ExportDocument::parse(&text)?;
            let count = doc.history.len();
            service.import(doc).await?;
            println!("imported {count} transactions from {}", path.display());
        }
    }
    Ok(())
}
