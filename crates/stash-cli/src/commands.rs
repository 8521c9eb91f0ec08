//! CLI command definitions.

use clap::Subcommand;

#[derive(Subcommand)]
pub enum Commands {
    /// Run the admin API and the refresh scheduler
    Serve {
        /// Override the configured bind address
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Print cache statistics
    Stats,

    /// Refresh cache entries now
    Refresh {
        #[command(subcommand)]
        command: RefreshCommands,
    },

    /// Delete entries nobody has read for a while
    Purge {
        /// Days without a read; defaults to the configured threshold
        #[arg(short, long)]
        days: Option<u32>,
    },

    /// Delete every cache entry
    Clear {
        /// Skip the confirmation check
        #[arg(short, long)]
        yes: bool,
    },

    /// Apply database migrations
    Migrate,
}

#[derive(Subcommand)]
pub enum RefreshCommands {
    /// Refresh every entry of one provider
    Provider {
        /// Provider name
        name: String,
    },

    /// Refresh the most urgent expired entries
    Expired {
        /// Maximum entries to refresh
        #[arg(short, long)]
        batch: Option<u32>,
    },

    /// Refresh every entry regardless of expiration
    All,
}
