//! Peer-table synchronization
//!
//! Tables only grow: merges add unknown addresses and never downgrade a
//! rank already recorded locally. Convergence is eventual; concurrent joins
//! may briefly leave nodes with different views.

use crate::cluster::{Cluster, PeerTable, Rank};
use crate::common::rpc::Reply;
use futures_util::future::join_all;
use std::sync::Arc;

impl Cluster {
    /// Pull the coordinator's table on startup. Failure leaves the local
    /// table untouched and is only logged.
    pub async fn fetch_peer_table(&self, bootstrap: &str) -> usize {
        if bootstrap == self.address {
            tracing::info!("[{}] bootstrapping as coordinator, nothing to sync", self.address);
            return 0;
        }
        match self.transport.send_peer_table(bootstrap, self.timeouts.sync).await {
            Ok(remote) => {
                let mut state = self.state();
                let added = state.peers.merge(&remote);
                tracing::info!(
                    "[{}] synced peer table from {}: {}",
                    self.address,
                    bootstrap,
                    state.peers
                );
                added
            }
            Err(e) => {
                tracing::warn!(
                    "[{}] failed to sync peer table from {}: {}; using local table only",
                    self.address,
                    bootstrap,
                    e
                );
                0
            }
        }
    }

    /// Merge a table pushed by a peer.
    pub fn receive_peer_table(&self, incoming: &PeerTable) -> usize {
        let mut state = self.state();
        let added = state.peers.merge(incoming);
        if added > 0 {
            tracing::info!("[{}] peer table updated: {}", self.address, state.peers);
        } else {
            tracing::debug!("[{}] peer table unchanged", self.address);
        }
        added
    }

    pub fn send_peer_table(&self) -> PeerTable {
        self.state().peers.clone()
    }

    /// Insert or update one entry, then push the full table to every peer.
    pub async fn update_peer_entry(&self, address: &str, rank: Rank) -> usize {
        {
            let mut state = self.state();
            state.peers.upsert(address, rank);
            tracing::info!("[{}] peer table updated: {}", self.address, state.peers);
        }
        self.broadcast_peer_table().await
    }

    /// Best-effort push of the local table. Returns how many peers took it.
    pub async fn broadcast_peer_table(&self) -> usize {
        let table = self.send_peer_table();
        let table = &table;
        let targets: Vec<&String> = table.others(&self.address).map(|(address, _)| address).collect();

        let results = join_all(targets.into_iter().map(|peer| async move {
            let res = self
                .transport
                .receive_peer_table(peer, table, self.timeouts.broadcast)
                .await;
            (peer, res)
        }))
        .await;

        let mut delivered = 0;
        for (peer, res) in results {
            match res {
                Ok(_) => delivered += 1,
                Err(e) => tracing::warn!("[{}] failed to broadcast table to {}: {}", self.address, peer, e),
            }
        }
        delivered
    }

    /// Heartbeat from another node. Unknown callers are registered right
    /// away so the reply already reflects them; the table update and
    /// rebroadcast run in the background.
    pub fn handle_ping(self: &Arc<Self>, address: &str, rank: Rank) -> Reply {
        if address.is_empty() || address == self.address {
            return Reply::Pong;
        }

        let registered = {
            let mut state = self.state();
            !state.peers.contains(address) && {
                state.peers.upsert(address, rank);
                true
            }
        };

        if registered {
            tracing::info!("[{}] ping from new peer {} (rank {})", self.address, address, rank);
            let this = Arc::clone(self);
            let address = address.to_string();
            self.workers.spawn("update-peer-entry", async move {
                this.update_peer_entry(&address, rank).await;
            });
        }
        Reply::Pong
    }
}

#[cfg(test)]
mod tests {
    use crate::cluster::transport::MemoryTransport;
    use crate::cluster::{Cluster, PeerTable};
    use std::sync::Arc;
    use std::time::Duration;

    fn node(net: &Arc<MemoryTransport>, address: &str, rank: i64) -> Arc<Cluster> {
        let cluster = Arc::new(Cluster::new(address, rank, net.clone()));
        net.register(&cluster);
        cluster
    }

    #[tokio::test]
    async fn test_fetch_merges_bootstrap_table() {
        let net = MemoryTransport::new();
        let a = node(&net, "A", 5);
        a.receive_peer_table(&[("C", 9)].into_iter().collect());
        let b = node(&net, "B", 2);

        assert_eq!(b.fetch_peer_table("A").await, 2);
        let expected: PeerTable = [("A", 5), ("B", 2), ("C", 9)].into_iter().collect();
        assert_eq!(b.peers(), expected);
    }

    #[tokio::test]
    async fn test_fetch_failure_keeps_local_table() {
        let net = MemoryTransport::new();
        let b = node(&net, "B", 2);
        assert_eq!(b.fetch_peer_table("nowhere").await, 0);
        assert_eq!(b.peers(), PeerTable::with_self("B", 2));
    }

    #[tokio::test]
    async fn test_update_broadcasts_past_dead_peers() {
        let net = MemoryTransport::new();
        let a = node(&net, "A", 5);
        let c = node(&net, "C", 9);
        a.receive_peer_table(&[("C", 9), ("dead", 4)].into_iter().collect());

        let delivered = a.update_peer_entry("B", 2).await;
        assert_eq!(delivered, 1);
        assert_eq!(c.peers().get("B"), Some(2));
        assert_eq!(c.peers().get("dead"), Some(4));
    }

    #[tokio::test]
    async fn test_ping_registers_unknown_caller() {
        let net = MemoryTransport::new();
        let a = node(&net, "A", 5);
        let c = node(&net, "C", 9);
        a.receive_peer_table(&[("C", 9)].into_iter().collect());

        assert_eq!(a.handle_ping("B", 2), crate::common::rpc::Reply::Pong);
        assert_eq!(a.peers().get("B"), Some(2));

        // the rebroadcast reaches C in the background
        tokio::time::timeout(Duration::from_secs(2), async {
            while c.peers().get("B").is_none() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        // anonymous and repeat pings change nothing
        a.handle_ping("", 0);
        a.handle_ping("B", 1);
        assert_eq!(a.peers().len(), 3);
        assert_eq!(a.peers().get("B"), Some(2));
    }
}
