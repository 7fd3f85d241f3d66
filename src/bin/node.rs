//! Node binary

use broadside::common::{ConfigOverrides, NodeConfig};
use broadside::Node;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "broadside-node")]
#[command(about = "broadside game server node")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a node
    Serve {
        /// Address peers use to reach this node
        #[arg(long)]
        address: Option<String>,

        /// Election rank (lower wins)
        #[arg(long)]
        rank: Option<i64>,

        /// Bind address for HTTP
        #[arg(long)]
        bind: Option<String>,

        /// Coordinator to join (defaults to self)
        #[arg(long)]
        bootstrap: Option<String>,

        /// TOML config file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Sled directory for player statistics
        #[arg(long)]
        stats_db: Option<String>,

        /// Heartbeat period in milliseconds
        #[arg(long)]
        heartbeat_ms: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            address,
            rank,
            bind,
            bootstrap,
            config,
            stats_db,
            heartbeat_ms,
        } => {
            // file, then BROADSIDE_* env, then flags
            let overrides = ConfigOverrides {
                address,
                rank,
                bind_addr: bind,
                bootstrap,
                heartbeat_interval_ms: heartbeat_ms,
                stats_path: stats_db,
            };
            let node_config = NodeConfig::load(config.as_deref(), overrides)?;

            tracing_subscriber::registry()
                .with(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| node_config.log_level.as_str().into()),
                )
                .with(tracing_subscriber::fmt::layer())
                .init();

            Node::new(node_config).serve().await?;
        }
    }

    Ok(())
}
