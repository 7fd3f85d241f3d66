//! Client CLI: play a match or inspect a node

use broadside::common::rpc::FireRequest;
use broadside::common::RpcClient;
use broadside::game::Slot;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "broadside")]
#[command(about = "broadside battleship client")]
#[command(version)]
struct Cli {
    /// Node URL
    #[arg(long, default_value = "http://localhost:8000")]
    node: String,

    /// Request timeout in milliseconds
    #[arg(long, default_value = "5000")]
    timeout_ms: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Join the queue; the second player starts the match
    Register {
        name: String,
    },

    /// Fire at the opponent's grid
    Fire {
        session_id: String,

        /// Your player slot (1 or 2)
        #[arg(long, value_parser = parse_slot)]
        slot: Slot,

        #[arg(long, allow_negative_numbers = true)]
        row: i64,

        #[arg(long, allow_negative_numbers = true)]
        col: i64,
    },

    /// Show a session's boards and status
    State {
        session_id: String,
    },

    /// Leave a session
    Quit {
        session_id: String,

        #[arg(long, value_parser = parse_slot)]
        slot: Slot,
    },

    /// Win/loss statistics
    Stats,

    /// The node's peer table
    Peers,

    /// Role, coordinator and session counts
    Status,
}

fn parse_slot(s: &str) -> Result<Slot, String> {
    let n: u8 = s.parse().map_err(|_| format!("invalid slot: {}", s))?;
    Slot::try_from(n)
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let client = RpcClient::new(Duration::from_millis(cli.timeout_ms));
    let node = cli.node.as_str();

    match cli.command {
        Commands::Register { name } => {
            print_json(&client.register_player(node, &name).await?)?;
        }

        Commands::Fire {
            session_id,
            slot,
            row,
            col,
        } => {
            let req = FireRequest {
                session_id,
                slot,
                row,
                col,
            };
            print_json(&client.fire(node, &req).await?)?;
        }

        Commands::State { session_id } => {
            print_json(&client.get_state(node, &session_id).await?)?;
        }

        Commands::Quit { session_id, slot } => {
            print_json(&client.quit(node, &session_id, slot).await?)?;
        }

        Commands::Stats => {
            print_json(&client.get_statistics(node).await?)?;
        }

        Commands::Peers => {
            let peers = client
                .send_peer_table(node, Duration::from_millis(cli.timeout_ms))
                .await?;
            print_json(&peers)?;
        }

        Commands::Status => {
            print_json(&client.status(node).await?)?;
        }
    }

    Ok(())
}
