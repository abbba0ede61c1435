//! Command-line interface for turnstile.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Turnstile - replayable turn-based game host
#[derive(Parser, Debug)]
#[command(name = "turnstile")]
#[command(about = "Hosts a turn-based game session over JSON lines", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Path to the game manifest
    #[arg(short, long, global = true, default_value = "turnstile.toml")]
    pub config: PathBuf,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Host a live Number Guesser session over stdin/stdout
    Serve {
        /// Session seed (random if omitted)
        #[arg(long)]
        seed: Option<String>,
    },

    /// Manage save states
    Saves {
        /// Save action
        #[command(subcommand)]
        action: SavesAction,
    },

    /// Load a save, reprocess it and print the report
    Replay {
        /// Save name
        name: String,
    },
}

/// Save-state actions
#[derive(Subcommand, Debug)]
pub enum SavesAction {
    /// List saves, newest first
    List,

    /// Delete a save
    Delete {
        /// Save name
        name: String,
    },
}
