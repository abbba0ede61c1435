//! Turnstile - unified CLI
//!
//! Hosts a Number Guesser session over JSON lines and manages save states.

#![warn(missing_docs)]

mod cli;
mod console;

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::Parser;
use cli::{Cli, Command, SavesAction};
use console::Console;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, instrument};
use tracing_subscriber::EnvFilter;
use turnstile_guesser::NumberGuesser;
use turnstile_host::{
    EngineLauncher, FileSnapshotStore, Host, HostConfig, HostRuntime, OperatorReply,
    ReloadCoordinator, SnapshotStore, rules_launcher, spawn_engine,
};
use turnstile_protocol::RandomSeed;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Stdout carries the JSON protocol, so logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,turnstile_host=debug")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = HostConfig::load_or_default(&cli.config)?;

    match cli.command {
        Command::Serve { seed } => serve(config, seed).await,
        Command::Saves { action } => saves(config, action).await,
        Command::Replay { name } => replay(config, name).await,
    }
}

/// Run a live session wired to stdin/stdout
#[instrument(skip(config))]
async fn serve(config: HostConfig, seed: Option<String>) -> Result<()> {
    let seed = seed
        .map(RandomSeed::from)
        .unwrap_or_else(RandomSeed::generate);
    info!(%seed, "Starting Turnstile host");

    let launcher: Arc<dyn EngineLauncher> =
        Arc::new(rules_launcher(Arc::new(NumberGuesser::new())));
    let store = Arc::new(FileSnapshotStore::new(config.save_dir().clone()));

    let (presentation_tx, presentation_rx) = mpsc::unbounded_channel();
    let (notice_tx, notice_rx) = mpsc::unbounded_channel();
    let (output_tx, output_rx) = mpsc::unbounded_channel();
    let (intents_tx, intents_rx) = mpsc::unbounded_channel();
    let (control_tx, control_rx) = mpsc::unbounded_channel();
    let (commands_tx, commands_rx) = mpsc::unbounded_channel();

    let host = Host::new(config, seed, launcher.launch(), presentation_tx).with_notices(notice_tx);
    let runtime = HostRuntime::new(host, ReloadCoordinator::new(launcher), store);

    let writer = console::spawn_writer(output_rx);
    console::forward_events(presentation_rx, output_tx.clone());
    console::forward_notices(notice_rx, output_tx.clone());
    tokio::spawn(Console::new(intents_tx, control_tx, commands_tx, output_tx).run());

    info!("Host ready - send JSON lines on stdin");
    let host = runtime.run(intents_rx, control_rx, commands_rx).await;
    info!(phase = %host.session().phase(), "Session ended");

    // Closes the event and notice streams so the writer can drain.
    drop(host);
    writer.await?;
    Ok(())
}

/// Manage save states
#[instrument(skip(config))]
async fn saves(config: HostConfig, action: SavesAction) -> Result<()> {
    let store = FileSnapshotStore::new(config.save_dir().clone());
    match action {
        SavesAction::List => {
            for entry in store.list().await? {
                let when = DateTime::<Utc>::from_timestamp_millis(entry.ctime)
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| entry.ctime.to_string());
                println!("{}\t{}", entry.name, when);
            }
        }
        SavesAction::Delete { name } => {
            store.delete(&name).await?;
            println!("Deleted {}", name);
        }
    }
    Ok(())
}

/// Load a save against a fresh engine and print the reprocess report
#[instrument(skip(config))]
async fn replay(config: HostConfig, name: String) -> Result<()> {
    let store = FileSnapshotStore::new(config.save_dir().clone());
    let (presentation_tx, _presentation_rx) = mpsc::unbounded_channel();
    let engine = spawn_engine(Arc::new(NumberGuesser::new()));
    let mut host = Host::new(config, RandomSeed::generate(), engine, presentation_tx);

    let report = host.load(&store, &name).await?;
    let phase = host.session().phase();
    let mut summary = OperatorReply::Report(report).to_json();
    summary["phase"] = serde_json::Value::String(phase.to_string());
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
