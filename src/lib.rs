//! # broadside
//!
//! A cluster of interchangeable battleship game servers:
//! - Any node can host two-player matches and answer client calls
//! - One node acts as coordinator, chosen by reverse-bully election
//!   (lowest rank wins)
//! - Nodes heartbeat the coordinator and re-elect when it disappears
//! - Peer tables are gossiped on join and converge eventually
//! - JSON over HTTP for both client and node-to-node calls
//!
//! ## Architecture

#![allow(clippy::result_large_err)]
//!
//! ```text
//!            ┌──────────────────────────────┐
//!            │  Coordinator (lowest rank)   │
//!            │  answers pings, owns nothing │
//!            └──────▲───────────────▲───────┘
//!                   │ ping          │ ping
//!     ┌─────────────┴───┐     ┌─────┴───────────┐
//!     │ Node (rank 5)   │◄───►│ Node (rank 9)   │
//!     │ peers, sessions │ RPC │ peers, sessions │
//!     └────────▲────────┘     └────────▲────────┘
//!              │ register/fire/state   │
//!           clients                 clients
//! ```
//!
//! ## Usage
//!
//! ### Start a cluster
//! ```bash
//! broadside-node serve --address localhost:8000 --rank 5 --bind 0.0.0.0:8000
//! broadside-node serve --address localhost:8001 --rank 2 --bind 0.0.0.0:8001 \
//!   --bootstrap localhost:8000
//! ```
//!
//! ### Play
//! ```bash
//! broadside --node localhost:8000 register alice
//! broadside --node localhost:8000 register bob
//! broadside --node localhost:8000 fire <session> --slot 1 --row 3 --col 4
//! broadside --node localhost:8000 state <session>
//! broadside --node localhost:8001 status
//! ```

pub mod cluster;
pub mod common;
pub mod game;
pub mod node;

// Re-export commonly used types
pub use cluster::{Cluster, ElectionOutcome, PeerTable, Rank};
pub use common::{Error, NodeConfig, Result};
pub use game::SessionRegistry;
pub use node::{Node, NodeHandle};

/// Current version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
