//! Per-node membership state

use crate::cluster::transport::PeerTransport;
use crate::cluster::{PeerTable, Rank};
use crate::common::config::{NodeConfig, PeerTimeouts};
use crate::common::tasks::WorkerPool;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Coordinator,
    Member,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Coordinator => write!(f, "coordinator"),
            Role::Member => write!(f, "member"),
        }
    }
}

/// Everything guarded by the node's single membership lock.
#[derive(Debug)]
pub(crate) struct ClusterState {
    pub(crate) peers: PeerTable,
    pub(crate) coordinator: String,
    pub(crate) election_underway: bool,
    /// Latches once the coordinator has answered a heartbeat.
    pub(crate) connected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterStatus {
    pub address: String,
    pub rank: Rank,
    pub role: Role,
    pub coordinator: String,
    pub peers: PeerTable,
    pub election_underway: bool,
    pub connected: bool,
}

/// Membership, election and heartbeat state of one node.
pub struct Cluster {
    pub(crate) address: String,
    pub(crate) rank: Rank,
    state: Mutex<ClusterState>,
    pub(crate) transport: Arc<dyn PeerTransport>,
    pub(crate) timeouts: PeerTimeouts,
    pub(crate) workers: WorkerPool,
}

impl Cluster {
    /// A node that starts out believing it is the coordinator.
    pub fn new(address: impl Into<String>, rank: Rank, transport: Arc<dyn PeerTransport>) -> Self {
        let address = address.into();
        Self {
            state: Mutex::new(ClusterState {
                peers: PeerTable::with_self(address.clone(), rank),
                coordinator: address.clone(),
                election_underway: false,
                connected: false,
            }),
            address,
            rank,
            transport,
            timeouts: PeerTimeouts::default(),
            workers: WorkerPool::new(8),
        }
    }

    pub fn from_config(config: &NodeConfig, transport: Arc<dyn PeerTransport>) -> Self {
        Self::new(config.address.clone(), config.rank, transport)
            .with_coordinator(config.bootstrap_address())
            .with_timeouts(config.timeouts())
            .with_workers(WorkerPool::new(config.worker_pool_size))
    }

    pub fn with_coordinator(mut self, coordinator: impl Into<String>) -> Self {
        self.state
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .coordinator = coordinator.into();
        self
    }

    /// Seed the peer table with known nodes (self is always kept).
    pub fn with_peers(mut self, peers: &PeerTable) -> Self {
        self.state
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .peers
            .merge(peers);
        self
    }

    pub fn with_timeouts(mut self, timeouts: PeerTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn with_workers(mut self, workers: WorkerPool) -> Self {
        self.workers = workers;
        self
    }

    pub(crate) fn state(&self) -> MutexGuard<'_, ClusterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn rank(&self) -> Rank {
        self.rank
    }

    pub fn coordinator(&self) -> String {
        self.state().coordinator.clone()
    }

    pub fn is_coordinator(&self) -> bool {
        self.state().coordinator == self.address
    }

    pub fn role(&self) -> Role {
        if self.is_coordinator() {
            Role::Coordinator
        } else {
            Role::Member
        }
    }

    pub fn peers(&self) -> PeerTable {
        self.state().peers.clone()
    }

    pub fn election_underway(&self) -> bool {
        self.state().election_underway
    }

    pub fn connected(&self) -> bool {
        self.state().connected
    }

    pub fn status(&self) -> ClusterStatus {
        let state = self.state();
        ClusterStatus {
            address: self.address.clone(),
            rank: self.rank,
            role: if state.coordinator == self.address {
                Role::Coordinator
            } else {
                Role::Member
            },
            coordinator: state.coordinator.clone(),
            peers: state.peers.clone(),
            election_underway: state.election_underway,
            connected: state.connected,
        }
    }
}

impl std::fmt::Debug for Cluster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cluster")
            .field("address", &self.address)
            .field("rank", &self.rank)
            .field("state", &*self.state())
            .finish_non_exhaustive()
    }
}
