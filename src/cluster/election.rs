//! Reverse-bully coordinator election
//!
//! Lower rank wins. A candidate asks every lower-ranked peer to take over;
//! if any answers it steps aside, otherwise it declares itself coordinator
//! and announces that to everyone. Announcements from a rank that does not
//! beat the receiver's own are ignored.

use crate::cluster::{Cluster, Rank};
use crate::common::rpc::Reply;
use futures_util::future::join_all;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElectionOutcome {
    /// No lower-ranked peer answered; this node is now coordinator.
    Elected,
    /// A lower-ranked peer answered and will run its own round.
    Deferred,
    /// A round was already in flight on this node.
    AlreadyRunning,
}

impl Cluster {
    pub async fn start_election(&self) -> ElectionOutcome {
        let candidates = {
            let mut state = self.state();
            if state.election_underway {
                tracing::debug!("[{}] election already underway", self.address);
                return ElectionOutcome::AlreadyRunning;
            }
            state.election_underway = true;
            state.peers.lower_ranked(&self.address, self.rank)
        };

        tracing::info!(
            "[{}] starting election (rank {}), {} lower-ranked peer(s)",
            self.address,
            self.rank,
            candidates.len()
        );

        let replies = join_all(candidates.iter().map(|(peer, peer_rank)| async move {
            tracing::debug!("[{}] sending ELECTION to {} (rank {})", self.address, peer, peer_rank);
            let reply = self
                .transport
                .election(peer, self.rank, self.timeouts.election)
                .await;
            (peer, reply)
        }))
        .await;

        let mut answered = false;
        for (peer, reply) in replies {
            match reply {
                Ok(Reply::Ok) => {
                    tracing::debug!("[{}] OK from {}", self.address, peer);
                    answered = true;
                }
                Ok(other) => tracing::warn!("[{}] unexpected election reply from {}: {}", self.address, peer, other),
                Err(e) => tracing::debug!("[{}] {} sits this round out: {}", self.address, peer, e),
            }
        }

        if answered {
            self.state().election_underway = false;
            tracing::info!("[{}] a lower-ranked peer is alive, deferring", self.address);
            return ElectionOutcome::Deferred;
        }

        {
            let mut state = self.state();
            state.coordinator = self.address.clone();
            state.election_underway = false;
        }
        tracing::info!("[{}] no lower-ranked peer answered, taking over as coordinator", self.address);
        self.announce_coordinator().await;
        ElectionOutcome::Elected
    }

    /// Tell every known peer that this node is coordinator. Returns how many
    /// accepted.
    async fn announce_coordinator(&self) -> usize {
        let peers = self.send_peer_table();
        let targets: Vec<&String> = peers.others(&self.address).map(|(address, _)| address).collect();

        let replies = join_all(targets.into_iter().map(|peer| async move {
            let reply = self
                .transport
                .coordinator(peer, &self.address, self.rank, self.timeouts.election)
                .await;
            (peer, reply)
        }))
        .await;

        let mut accepted = 0;
        for (peer, reply) in replies {
            match reply {
                Ok(Reply::Ok) => {
                    accepted += 1;
                    tracing::debug!("[{}] {} accepted the announcement", self.address, peer);
                }
                Ok(other) => tracing::info!("[{}] {} replied {}", self.address, peer, other),
                Err(e) => tracing::warn!("[{}] failed to announce to {}: {}", self.address, peer, e),
            }
        }
        accepted
    }

    /// ELECTION from `sender_rank`. Replies at once; if we outrank the
    /// sender we start our own round in the background.
    pub fn handle_election(self: &Arc<Self>, sender_rank: Rank) -> Reply {
        tracing::info!("[{}] ELECTION message from rank {}", self.address, sender_rank);
        if self.rank < sender_rank {
            let this = Arc::clone(self);
            self.workers.spawn("election", async move {
                this.start_election().await;
            });
        }
        Reply::Ok
    }

    /// COORDINATOR announcement. Accepted only from a strictly better rank.
    pub fn handle_coordinator(&self, address: &str, rank: Rank) -> Reply {
        if rank < self.rank {
            let mut state = self.state();
            state.coordinator = address.to_string();
            state.election_underway = false;
            tracing::info!("[{}] new coordinator {} (rank {})", self.address, address, rank);
            Reply::Ok
        } else {
            let err = crate::Error::StaleAuthority {
                address: address.to_string(),
                rank,
            };
            tracing::info!("[{}] ignoring announcement: {}", self.address, err);
            Reply::Ignored
        }
    }
}
