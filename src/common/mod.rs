//! Common types shared across broadside

pub mod config;
pub mod error;
pub mod rpc;
pub mod tasks;
pub mod tracing_middleware;

pub use config::{normalize_address, ConfigOverrides, NodeConfig, PeerTimeouts};
pub use error::{Error, ErrorBody, ErrorKind, Result};
pub use rpc::{Reply, RpcClient};
pub use tasks::WorkerPool;
