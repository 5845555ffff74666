//! SDFS - a replicated, versioned, consistent-hashed distributed file store.
//!
//! This binary is the ephemeral CLI client: one connection per command, no
//! resident state beyond the config file it loads at startup.

mod commands;
mod config;
mod master_client;
mod progress;
mod replica_client;
mod utils;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use config::Config;

#[derive(Parser)]
#[command(name = "sdfs")]
#[command(author = "SDFS Team")]
#[command(version = sdfs_core::VERSION)]
#[command(about = "Client for the SDFS distributed file store", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Client config file path (default: ~/.sdfs/config.toml)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "SDFS_LOG_LEVEL", default_value = "warn")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a local file to the store under an SDFS name
    Put {
        local_path: String,
        sdfs_name: String,
    },
    /// Fetch the newest version of a file
    Get {
        sdfs_name: String,
        /// Destination path (default: <fetched_root>/<sdfs_name>)
        dest: Option<String>,
    },
    /// Delete a file across every replica that holds it
    Delete { sdfs_name: String },
    /// List which ring owners hold a file, and at what version
    Ls { sdfs_name: String },
    /// List everything held by the replica this client is co-located with
    Store,
    /// Fetch the k most recent versions of a file
    GetVersions {
        sdfs_name: String,
        /// Number of versions to fetch
        #[arg(short = 'n', long, default_value_t = 4)]
        count: usize,
        /// Prefix for the `<prefix>-version-<i>` destination files
        #[arg(long)]
        dest_prefix: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .init();

    let config = Config::load(cli.config.as_deref())?;
    config.validate()?;

    match cli.command {
        Commands::Put { local_path, sdfs_name } => commands::put::execute(&config, &local_path, &sdfs_name).await,
        Commands::Get { sdfs_name, dest } => commands::get::execute(&config, &sdfs_name, dest.as_deref()).await,
        Commands::Delete { sdfs_name } => commands::delete::execute(&config, &sdfs_name).await,
        Commands::Ls { sdfs_name } => commands::ls::execute(&config, &sdfs_name).await,
        Commands::Store => commands::store::execute(&config).await,
        Commands::GetVersions { sdfs_name, count, dest_prefix } => {
            commands::getversions::execute(&config, &sdfs_name, count, dest_prefix.as_deref()).await
        }
    }
}
