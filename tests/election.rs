//! Reverse-bully election across in-process clusters

use broadside::cluster::{Cluster, ElectionOutcome, MemoryTransport, PeerTable, TickOutcome};
use futures_util::future::join_all;
use std::sync::Arc;
use std::time::Duration;

fn spawn_cluster(net: &Arc<MemoryTransport>, table: &PeerTable) -> Vec<Arc<Cluster>> {
    table
        .iter()
        .map(|(address, &rank)| {
            let node = Arc::new(Cluster::new(address.clone(), rank, net.clone()).with_peers(table));
            net.register(&node);
            node
        })
        .collect()
}

fn by_address<'a>(nodes: &'a [Arc<Cluster>], address: &str) -> &'a Arc<Cluster> {
    nodes.iter().find(|n| n.address() == address).unwrap()
}

async fn wait_until<F: Fn() -> bool>(what: &str, cond: F) {
    let reached = tokio::time::timeout(Duration::from_secs(5), async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(reached.is_ok(), "timed out waiting for: {}", what);
}

fn settled(nodes: &[&Arc<Cluster>], coordinator: &str) -> bool {
    nodes
        .iter()
        .all(|n| n.coordinator() == coordinator && !n.election_underway())
}

#[tokio::test]
async fn test_single_round_converges_on_lowest_rank() {
    let net = MemoryTransport::new();
    let table: PeerTable = [("n1", 7), ("n2", 3), ("n3", 9), ("n4", 1), ("n5", 5)]
        .into_iter()
        .collect();
    let nodes = spawn_cluster(&net, &table);

    // the worst-ranked node notices first
    let outcome = by_address(&nodes, "n3").start_election().await;
    assert_eq!(outcome, ElectionOutcome::Deferred);

    let all: Vec<&Arc<Cluster>> = nodes.iter().collect();
    wait_until("everyone follows n4", || settled(&all, "n4")).await;
    assert!(by_address(&nodes, "n4").is_coordinator());
}

#[tokio::test]
async fn test_concurrent_rounds_still_converge() {
    let net = MemoryTransport::new();
    let table: PeerTable = [("n1", 7), ("n2", 3), ("n3", 9), ("n4", 1), ("n5", 5)]
        .into_iter()
        .collect();
    let nodes = spawn_cluster(&net, &table);

    let outcomes = join_all(nodes.iter().map(|n| n.start_election())).await;
    // n4 has nobody to defer to
    let n4 = nodes.iter().position(|n| n.address() == "n4").unwrap();
    assert_eq!(outcomes[n4], ElectionOutcome::Elected);

    let all: Vec<&Arc<Cluster>> = nodes.iter().collect();
    wait_until("everyone follows n4", || settled(&all, "n4")).await;
}

/// Ranks {A:5, B:2, C:9}. B drops out, A takes over and C follows; B comes
/// back, notices A ranks worse, and wins the cluster back.
#[tokio::test]
async fn test_failover_and_recovery_scenario() {
    let net = MemoryTransport::new();
    let table: PeerTable = [("A", 5), ("B", 2), ("C", 9)].into_iter().collect();
    let nodes = spawn_cluster(&net, &table);
    let (a, b, c) = (by_address(&nodes, "A"), by_address(&nodes, "B"), by_address(&nodes, "C"));

    assert_eq!(b.start_election().await, ElectionOutcome::Elected);
    wait_until("B leads", || settled(&[a, b, c], "B")).await;
    assert_eq!(a.heartbeat_tick().await, TickOutcome::Alive);
    assert_eq!(c.heartbeat_tick().await, TickOutcome::Alive);

    net.set_down("B", true);
    assert_eq!(a.heartbeat_tick().await, TickOutcome::CoordinatorLost);
    wait_until("A takes over", || settled(&[a, c], "A")).await;

    // B restarts with only itself known and A as its bootstrap
    net.set_down("B", false);
    let b = Arc::new(Cluster::new("B", 2, net.clone()).with_coordinator("A"));
    net.register(&b);
    assert_eq!(b.fetch_peer_table("A").await, 2);

    assert_eq!(b.heartbeat_tick().await, TickOutcome::Preempting);
    wait_until("B leads again", || settled(&[a, &b, c], "B")).await;
}

#[tokio::test]
async fn test_stale_announcement_does_not_override_better_coordinator() {
    let net = MemoryTransport::new();
    let table: PeerTable = [("A", 5), ("B", 2), ("C", 9)].into_iter().collect();
    let nodes = spawn_cluster(&net, &table);
    let (a, b, c) = (by_address(&nodes, "A"), by_address(&nodes, "B"), by_address(&nodes, "C"));

    b.start_election().await;
    wait_until("B leads", || settled(&[a, b, c], "B")).await;

    // A's late announcement reaches B, which outranks it
    assert_eq!(
        b.handle_coordinator("A", 5),
        broadside::common::Reply::Ignored
    );
    assert!(b.is_coordinator());
}

#[tokio::test]
async fn test_new_node_joins_through_ping_and_takes_over() {
    let net = MemoryTransport::new();
    let table: PeerTable = [("A", 5), ("C", 9)].into_iter().collect();
    let nodes = spawn_cluster(&net, &table);
    let (a, c) = (by_address(&nodes, "A"), by_address(&nodes, "C"));
    a.start_election().await;
    wait_until("A leads", || settled(&[a, c], "A")).await;

    let d = Arc::new(Cluster::new("D", 1, net.clone()).with_coordinator("A"));
    net.register(&d);
    // first contact: A learns about D and pushes the table to C
    d.heartbeat_tick().await;
    wait_until("C hears about D", || c.peers().get("D") == Some(1)).await;

    d.receive_peer_table(&a.send_peer_table());
    assert_eq!(d.heartbeat_tick().await, TickOutcome::Preempting);
    wait_until("D leads", || settled(&[a, c, &d], "D")).await;
}
