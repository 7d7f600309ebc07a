//! CLI module for correlog
//!
//! # Commands
//!
//! - `serve` - Run the demo service wrapped in the request logger
//! - `config` - Configuration utilities (init)
//! - `completions` - Generate shell completions
//!
//! # Example
//!
//! ```bash
//! # Human-readable request logs on stderr
//! correlog serve --exporter console
//!
//! # Generate shell completions
//! correlog completions bash > ~/.bash_completion.d/correlog
//! ```

pub mod completions;
pub mod config;
pub mod serve;

pub use completions::handle_completions;
pub use config::handle_config_init;

use crate::config::ExporterKind;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// correlog - request-scoped correlated logging
#[derive(Parser, Debug)]
#[command(
    name = "correlog",
    version,
    about = "Request-scoped correlated logging demo server"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the demo server
    Serve(ServeArgs),
    /// Configuration utilities
    #[command(subcommand)]
    Config(ConfigCommands),
    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "correlog.toml")]
    pub config: PathBuf,

    /// Override server port
    #[arg(short, long, env = "CORRELOG_PORT")]
    pub port: Option<u16>,

    /// Override server host
    #[arg(short = 'H', long, env = "CORRELOG_HOST")]
    pub host: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "CORRELOG_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Request log exporter (stream, cloud, console)
    #[arg(short, long, env = "CORRELOG_EXPORTER")]
    pub exporter: Option<ExporterKind>,

    /// Disable colors in console output
    #[arg(long)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Initialize a new configuration file
    Init(ConfigInitArgs),
}

#[derive(Args, Debug)]
pub struct ConfigInitArgs {
    /// Output file path
    #[arg(short, long, default_value = "correlog.toml")]
    pub output: PathBuf,

    /// Overwrite existing file
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: clap_complete::Shell,
}
