//! CLI command definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "tradebot")]
#[command(about = "Trade bot - event-driven handler runtime for peer-to-peer trades", long_about = None)]
pub struct Cli {
    /// Bot configuration file (JSON)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Settings file; overrides the configured location
    #[arg(short, long, global = true)]
    pub settings: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Replay a JSON-lines event feed through the bot
    Run {
        /// Feed file, or `-` for stdin
        #[arg(short, long, default_value = "-")]
        feed: String,

        /// Keep polling this long after the feed ends
        #[arg(short, long, default_value = "0")]
        linger_ms: u64,
    },

    /// Inspect or edit the settings file
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum SettingsAction {
    /// Print one value
    Get {
        key: String,

        /// Value printed when the key is not stored
        #[arg(short, long)]
        default: Option<String>,
    },

    /// Store a value and save the file
    Set { key: String, value: String },

    /// Print every stored value
    List,
}
