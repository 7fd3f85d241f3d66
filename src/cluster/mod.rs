//! Cluster membership: peer table, reverse-bully election and heartbeat
//!
//! All of it hangs off [`Cluster`], one per node. Inbound handlers
//! (`handle_ping`, `handle_election`, `handle_coordinator`,
//! `receive_peer_table`, `send_peer_table`) are called by the HTTP layer or
//! by [`MemoryTransport`]; outbound calls go through a [`PeerTransport`].

pub mod election;
pub mod heartbeat;
pub mod membership;
pub mod peers;
pub mod state;
pub mod transport;

pub use election::ElectionOutcome;
pub use heartbeat::{Heartbeat, TickOutcome};
pub use peers::{PeerTable, Rank};
pub use state::{Cluster, ClusterStatus, Role};
pub use transport::{HttpTransport, MemoryTransport, PeerTransport};
