//! Outbound peer calls
//!
//! [`PeerTransport`] is the seam between the election/membership logic and
//! the wire. Every call carries its own timeout; any failure comes back as
//! [`Error::Unreachable`].

use crate::cluster::{Cluster, PeerTable, Rank};
use crate::common::rpc::{PingRequest, Reply, RpcClient};
use crate::common::{Error, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock, Weak};
use std::time::Duration;

#[async_trait]
pub trait PeerTransport: Send + Sync {
    /// Heartbeat `peer`, identifying ourselves as `address`/`rank`.
    async fn ping(&self, peer: &str, address: &str, rank: Rank, timeout: Duration) -> Result<Reply>;

    async fn send_peer_table(&self, peer: &str, timeout: Duration) -> Result<PeerTable>;

    async fn receive_peer_table(&self, peer: &str, table: &PeerTable, timeout: Duration) -> Result<Reply>;

    async fn election(&self, peer: &str, rank: Rank, timeout: Duration) -> Result<Reply>;

    async fn coordinator(&self, peer: &str, address: &str, rank: Rank, timeout: Duration) -> Result<Reply>;
}

/// JSON-over-HTTP transport used by real nodes.
#[derive(Clone, Default)]
pub struct HttpTransport {
    client: RpcClient,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PeerTransport for HttpTransport {
    async fn ping(&self, peer: &str, address: &str, rank: Rank, timeout: Duration) -> Result<Reply> {
        let req = PingRequest {
            address: address.to_string(),
            rank,
        };
        self.client.ping(peer, &req, timeout).await
    }

    async fn send_peer_table(&self, peer: &str, timeout: Duration) -> Result<PeerTable> {
        self.client.send_peer_table(peer, timeout).await
    }

    async fn receive_peer_table(&self, peer: &str, table: &PeerTable, timeout: Duration) -> Result<Reply> {
        self.client.receive_peer_table(peer, table, timeout).await
    }

    async fn election(&self, peer: &str, rank: Rank, timeout: Duration) -> Result<Reply> {
        self.client.election(peer, rank, timeout).await
    }

    async fn coordinator(&self, peer: &str, address: &str, rank: Rank, timeout: Duration) -> Result<Reply> {
        self.client.coordinator(peer, address, rank, timeout).await
    }
}

/// In-process transport: routes calls straight to registered clusters.
///
/// Lets a whole cluster run inside one process. Addresses marked down
/// behave like crashed nodes.
#[derive(Default)]
pub struct MemoryTransport {
    nodes: RwLock<HashMap<String, Weak<Cluster>>>,
    down: RwLock<HashSet<String>>,
}

impl MemoryTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn register(&self, cluster: &Arc<Cluster>) {
        self.nodes
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(cluster.address().to_string(), Arc::downgrade(cluster));
    }

    pub fn set_down(&self, address: &str, down: bool) {
        let mut set = self.down.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        if down {
            set.insert(address.to_string());
        } else {
            set.remove(address);
        }
    }

    fn resolve(&self, peer: &str) -> Result<Arc<Cluster>> {
        if self
            .down
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .contains(peer)
        {
            return Err(Error::unreachable(peer, "node is down"));
        }
        self.nodes
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(peer)
            .and_then(Weak::upgrade)
            .ok_or_else(|| Error::unreachable(peer, "no such node"))
    }
}

#[async_trait]
impl PeerTransport for MemoryTransport {
    async fn ping(&self, peer: &str, address: &str, rank: Rank, _timeout: Duration) -> Result<Reply> {
        Ok(self.resolve(peer)?.handle_ping(address, rank))
    }

    async fn send_peer_table(&self, peer: &str, _timeout: Duration) -> Result<PeerTable> {
        Ok(self.resolve(peer)?.send_peer_table())
    }

    async fn receive_peer_table(&self, peer: &str, table: &PeerTable, _timeout: Duration) -> Result<Reply> {
        self.resolve(peer)?.receive_peer_table(table);
        Ok(Reply::Ok)
    }

    async fn election(&self, peer: &str, rank: Rank, _timeout: Duration) -> Result<Reply> {
        Ok(self.resolve(peer)?.handle_election(rank))
    }

    async fn coordinator(&self, peer: &str, address: &str, rank: Rank, _timeout: Duration) -> Result<Reply> {
        Ok(self.resolve(peer)?.handle_coordinator(address, rank))
    }
}
