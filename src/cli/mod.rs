//! CLI module for Wrench.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand};

/// Wrench - Machine service-history assistant
///
/// Answers CNC troubleshooting questions from a machine's service history.
#[derive(Parser, Debug)]
#[command(name = "wrench")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check API key, service database and embedding index
    Doctor,

    /// Get a one-shot troubleshooting summary for a machine
    Ask {
        /// Reported symptoms
        symptoms: String,

        /// Machine model (substring match)
        #[arg(short, long)]
        model: Option<String>,

        /// Machine serial number (exact match)
        #[arg(short, long)]
        serial: Option<String>,

        /// Text to rank past reports by (defaults to the symptoms)
        #[arg(short, long)]
        query: Option<String>,

        /// Use recent history only, without semantic ranking
        #[arg(long)]
        keyword_only: bool,
    },

    /// Start an interactive troubleshooting session for a machine
    Chat {
        /// Machine model (substring match)
        #[arg(short, long)]
        model: Option<String>,

        /// Machine serial number (exact match)
        #[arg(short, long)]
        serial: Option<String>,

        /// Rank past reports by each message
        #[arg(long)]
        semantic: bool,
    },

    /// Embed service reports into the vector index
    Index {
        /// Clear and rebuild even if the index is populated
        #[arg(short, long)]
        force: bool,
    },

    /// Find service reports similar to a description
    Search {
        /// Problem description
        query: String,

        /// Restrict to a model (substring match)
        #[arg(short, long)]
        model: Option<String>,

        /// Restrict to a serial number (exact match)
        #[arg(short, long)]
        serial: Option<String>,

        /// Maximum number of results
        #[arg(short, long, default_value = "5")]
        limit: usize,
    },

    /// Print the service history context for a machine without calling the model
    History {
        /// Machine model (substring match)
        #[arg(short, long)]
        model: Option<String>,

        /// Machine serial number (exact match)
        #[arg(short, long)]
        serial: Option<String>,
    },

    /// Start the HTTP chat API
    Serve {
        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., "completion.model")
        key: String,
        /// Configuration value
        value: String,
    },

    /// Show configuration file path
    Path,
}
