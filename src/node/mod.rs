//! A running broadside node
//!
//! Wires the [`Cluster`](crate::cluster::Cluster) and the
//! [`SessionRegistry`](crate::game::SessionRegistry) behind one HTTP
//! listener and keeps the heartbeat going for the lifetime of the process.

pub mod context;
pub mod http;
pub mod server;

pub use context::NodeContext;
pub use http::create_router;
pub use server::{Node, NodeHandle};
