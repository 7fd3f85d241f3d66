//! Coordinator liveness monitor
//!
//! A fixed-period ticker pings the current coordinator. The first answered
//! ping latches the node as connected; after that, a failed ping starts an
//! election. Each ping is bounded by the ping timeout, which config
//! validation keeps below the tick period.

use crate::cluster::Cluster;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// What a single tick observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// This node is the coordinator; nothing to check.
    SelfCoordinator,
    /// Coordinator answered.
    Alive,
    /// Coordinator answered but ranks worse than us; an election was started.
    Preempting,
    /// Coordinator did not answer after having been reachable; an election
    /// was started.
    CoordinatorLost,
    /// Failure ignored: never connected, or a round is already running.
    Ignored,
}

impl Cluster {
    /// Ping the coordinator once and react to the result.
    ///
    /// Elections are handed to the worker pool so the tick itself stays
    /// bounded by the ping timeout.
    pub async fn heartbeat_tick(self: &Arc<Self>) -> TickOutcome {
        let coordinator = {
            let state = self.state();
            if state.coordinator == self.address {
                return TickOutcome::SelfCoordinator;
            }
            state.coordinator.clone()
        };

        let result = self
            .transport
            .ping(&coordinator, &self.address, self.rank, self.timeouts.ping)
            .await;

        match result {
            Ok(_) => {
                let preempt = {
                    let mut state = self.state();
                    if !state.connected {
                        tracing::info!("[{}] connected to coordinator {}", self.address, coordinator);
                    }
                    state.connected = true;
                    let worse = state
                        .peers
                        .get(&coordinator)
                        .map_or(false, |rank| rank > self.rank);
                    worse && !state.election_underway
                };
                if preempt {
                    tracing::info!(
                        "[{}] coordinator {} ranks below us, starting election",
                        self.address,
                        coordinator
                    );
                    self.spawn_election();
                    TickOutcome::Preempting
                } else {
                    tracing::trace!("[{}] coordinator {} alive", self.address, coordinator);
                    TickOutcome::Alive
                }
            }
            Err(e) => {
                let trigger = {
                    let state = self.state();
                    state.connected && !state.election_underway
                };
                if trigger {
                    tracing::warn!(
                        "[{}] coordinator {} unreachable ({}), starting election",
                        self.address,
                        coordinator,
                        e
                    );
                    self.spawn_election();
                    TickOutcome::CoordinatorLost
                } else {
                    tracing::debug!("[{}] ping to {} failed: {}", self.address, coordinator, e);
                    TickOutcome::Ignored
                }
            }
        }
    }

    fn spawn_election(self: &Arc<Self>) {
        let this = Arc::clone(self);
        self.workers.spawn("election", async move {
            this.start_election().await;
        });
    }
}

/// Handle to a running heartbeat ticker.
pub struct Heartbeat {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl Heartbeat {
    pub fn start(cluster: Arc<Cluster>, period: Duration) -> Self {
        let (shutdown, mut stop) = watch::channel(false);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // the first tick completes immediately; skip it so a fresh node
            // gets one full period to sync before its first ping
            ticker.tick().await;

            tracing::info!(
                "[{}] heartbeat started, period {}ms",
                cluster.address(),
                period.as_millis()
            );
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        cluster.heartbeat_tick().await;
                    }
                    changed = stop.changed() => {
                        if changed.is_err() || *stop.borrow() {
                            break;
                        }
                    }
                }
            }
            tracing::info!("[{}] heartbeat stopped", cluster.address());
        });
        Self { shutdown, handle }
    }

    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.handle.await {
            tracing::warn!("heartbeat task ended abnormally: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::transport::MemoryTransport;
    use crate::cluster::PeerTable;

    fn node(net: &Arc<MemoryTransport>, address: &str, rank: i64, coordinator: &str) -> Arc<Cluster> {
        let cluster = Arc::new(Cluster::new(address, rank, net.clone()).with_coordinator(coordinator));
        net.register(&cluster);
        cluster
    }

    async fn wait_for<F: Fn() -> bool>(cond: F) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while !cond() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached");
    }

    #[tokio::test]
    async fn test_coordinator_tick_is_a_no_op() {
        let net = MemoryTransport::new();
        let a = node(&net, "A", 5, "A");
        assert_eq!(a.heartbeat_tick().await, TickOutcome::SelfCoordinator);
        assert!(!a.connected());
    }

    #[tokio::test]
    async fn test_failure_before_first_contact_is_ignored() {
        let net = MemoryTransport::new();
        let c = node(&net, "C", 9, "A");
        assert_eq!(c.heartbeat_tick().await, TickOutcome::Ignored);
        assert!(!c.election_underway());
        assert_eq!(c.coordinator(), "A");
    }

    #[tokio::test]
    async fn test_success_latches_and_registers_caller() {
        let net = MemoryTransport::new();
        let a = node(&net, "A", 5, "A");
        let c = node(&net, "C", 9, "A");

        assert_eq!(c.heartbeat_tick().await, TickOutcome::Alive);
        assert!(c.connected());
        assert_eq!(a.peers().get("C"), Some(9));
    }

    #[tokio::test]
    async fn test_lost_coordinator_triggers_election() {
        let net = MemoryTransport::new();
        let a = node(&net, "A", 5, "A");
        let c = node(&net, "C", 9, "A");
        c.receive_peer_table(&PeerTable::with_self("A", 5));
        c.heartbeat_tick().await;

        net.set_down("A", true);
        assert_eq!(c.heartbeat_tick().await, TickOutcome::CoordinatorLost);
        wait_for(|| c.coordinator() == "C" && !c.election_underway()).await;
        drop(a);
    }

    #[tokio::test]
    async fn test_lost_coordinator_during_election_is_ignored() {
        let net = MemoryTransport::new();
        let _a = node(&net, "A", 5, "A");
        let c = node(&net, "C", 9, "A");
        assert_eq!(c.heartbeat_tick().await, TickOutcome::Alive);

        c.state().election_underway = true;
        net.set_down("A", true);
        assert_eq!(c.heartbeat_tick().await, TickOutcome::Ignored);

        // no second round was spawned to resolve or clear the running one
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(c.election_underway());
        assert_eq!(c.coordinator(), "A");
    }

    #[tokio::test]
    async fn test_worse_ranked_coordinator_is_preempted() {
        let net = MemoryTransport::new();
        let a = node(&net, "A", 5, "A");
        let b = node(&net, "B", 2, "A");
        b.receive_peer_table(&PeerTable::with_self("A", 5));

        assert_eq!(b.heartbeat_tick().await, TickOutcome::Preempting);
        wait_for(|| b.is_coordinator() && a.coordinator() == "B").await;
    }

    #[tokio::test]
    async fn test_shutdown_stops_ticker() {
        let net = MemoryTransport::new();
        let _a = node(&net, "A", 5, "A");
        let c = node(&net, "C", 9, "A");

        let heartbeat = Heartbeat::start(c.clone(), Duration::from_millis(10));
        wait_for(|| c.connected()).await;
        tokio::time::timeout(Duration::from_secs(1), heartbeat.shutdown())
            .await
            .unwrap();
    }
}
