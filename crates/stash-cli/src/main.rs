//! stash entrypoint.

use clap::Parser;
use std::path::PathBuf;

mod app;
mod commands;
mod config;
mod handlers;
mod telemetry;

use commands::{Commands, RefreshCommands};
use config::StashConfig;

#[derive(Parser)]
#[command(name = "stash")]
#[command(author, version, about = "Upstream response cache with proactive refresh", long_about = None)]
struct Cli {
    /// Configuration file (defaults to ./stash.toml or ./stash.yaml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let config = StashConfig::load(cli.config.as_deref())?;
    telemetry::init_telemetry(&config.logging)?;

    match cli.command {
        Commands::Serve { bind } => handlers::serve(&config, bind).await?,
        Commands::Stats => handlers::stats(&config).await?,
        Commands::Refresh { command } => match command {
            RefreshCommands::Provider { name } => handlers::refresh_provider(&config, &name).await?,
            RefreshCommands::Expired { batch } => handlers::refresh_expired(&config, batch).await?,
            RefreshCommands::All => handlers::refresh_all(&config).await?,
        },
        Commands::Purge { days } => handlers::purge(&config, days).await?,
        Commands::Clear { yes } => handlers::clear(&config, yes).await?,
        Commands::Migrate => handlers::migrate(&config).await?,
    }

    Ok(())
}
