//! Command-line interface definitions using clap

use clap::{Parser, Subcommand};

/// Snaplink - URL shortener with reversible base62 codes
#[derive(Parser)]
#[command(name = "snaplink")]
#[command(version)]
#[command(about = "URL shortener with tiered lookup and asynchronous click accounting", long_about = None)]
pub struct Cli {
    /// Configuration file (default: config.toml)
    #[arg(long, short = 'c', global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve {
        /// Also run the click consumer in this process (always on for the memory backend)
        #[arg(long)]
        with_worker: bool,
    },

    /// Run the standalone click consumer
    Worker,

    /// Print the short code for an id
    Encode {
        id: u64,
    },

    /// Print the id behind a short code
    Decode {
        code: String,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

/// Configuration management commands
#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Generate example configuration file
    Generate {
        /// Output path (default: config.example.toml)
        output_path: Option<String>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}
