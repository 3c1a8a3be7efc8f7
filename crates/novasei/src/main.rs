//! novasei CLI - builds the Nova Sei Press site and runs its form relay.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

mod commands;
mod config;

#[derive(Parser)]
#[command(name = "novasei")]
#[command(about = "Static site builder and contact form relay for Nova Sei Press")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to novasei.toml config file
    #[arg(short, long, default_value = "novasei.toml")]
    config: PathBuf,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the static site
    Build {
        /// Output directory (defaults to config or "site/_site")
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Skip minification
        #[arg(long)]
        no_minify: bool,
    },

    /// Preview a built site
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "4000")]
        port: u16,

        /// Directory to serve (defaults to the configured output)
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },

    /// Build, serve and rebuild the site on change with live reload
    Dev {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,

        /// Do not open browser
        #[arg(long)]
        no_open: bool,
    },

    /// Run the contact form relay
    Relay {
        /// Port to listen on (defaults to config or RELAY_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    fmt().with_env_filter(filter).with_target(false).init();

    let file_config = config::load(&cli.config)?;

    match cli.command {
        Commands::Build { output, no_minify } => {
            let minify = if no_minify { Some(false) } else { None };
            commands::build::run(file_config, output, minify).await?;
        }
        Commands::Serve { port, dir } => {
            commands::serve::run(file_config, port, dir).await?;
        }
        Commands::Dev { port, no_open } => {
            commands::dev::run(file_config, port, !no_open).await?;
        }
        Commands::Relay { port } => {
            commands::relay::run(file_config, port).await?;
        }
    }

    Ok(())
}
