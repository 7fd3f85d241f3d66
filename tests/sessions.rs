//! Session registry under concurrent load

use broadside::game::{
    Battleship, EngineFactory, GameEngine, MemoryStatsStore, SessionRegistry, SessionStatus, Ship, Slot, StatsStore,
};
use std::collections::HashMap;
use std::sync::Arc;

fn one_shot_registry() -> (Arc<SessionRegistry>, Arc<MemoryStatsStore>) {
    let stats = Arc::new(MemoryStatsStore::new());
    let factory: EngineFactory = Arc::new(|| -> Box<dyn GameEngine> {
        Box::new(Battleship::with_fleets(&[Ship::horizontal(9, 9, 1)], &[Ship::horizontal(4, 4, 1)]).unwrap())
    });
    let registry = Arc::new(SessionRegistry::with_engine_factory(stats.clone(), factory));
    (registry, stats)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_registrations_pair_exactly() {
    let (registry, _) = one_shot_registry();

    let handles: Vec<_> = (0..64)
        .map(|i| {
            let registry = registry.clone();
            tokio::spawn(async move { registry.register_player(&format!("player-{}", i)).unwrap() })
        })
        .collect();

    let mut by_session: HashMap<String, Vec<Slot>> = HashMap::new();
    for handle in handles {
        let reg = handle.await.unwrap();
        by_session.entry(reg.session_id).or_default().push(reg.slot);
    }

    assert_eq!(by_session.len(), 32);
    assert_eq!(registry.session_count(), 32);
    assert_eq!(registry.waiting_player(), None);
    for slots in by_session.values_mut() {
        slots.sort_by_key(|s| s.number());
        assert_eq!(slots, &vec![Slot::One, Slot::Two]);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_winning_shots_record_once() {
    let (registry, stats) = one_shot_registry();
    let sid = registry.register_player("Alice").unwrap().session_id;
    registry.register_player("Bob").unwrap();

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let registry = registry.clone();
            let sid = sid.clone();
            tokio::spawn(async move { registry.fire(&sid, Slot::One, 4, 4) })
        })
        .collect();

    let mut wins = 0;
    for handle in handles {
        if let Ok(outcome) = handle.await.unwrap() {
            assert_eq!(outcome.winner, Some(Slot::One));
            wins += 1;
        }
    }
    assert_eq!(wins, 1);

    let alice = stats.lookup("Alice").unwrap().unwrap();
    let bob = stats.lookup("Bob").unwrap().unwrap();
    assert_eq!((alice.games_won, alice.games_lost), (1, 0));
    assert_eq!((bob.games_won, bob.games_lost), (0, 1));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_quit_races_with_fire() {
    let (registry, stats) = one_shot_registry();
    let sid = registry.register_player("Alice").unwrap().session_id;
    registry.register_player("Bob").unwrap();

    let quitter = {
        let registry = registry.clone();
        let sid = sid.clone();
        tokio::spawn(async move { registry.quit(&sid, Slot::Two).unwrap() })
    };
    let shooter = {
        let registry = registry.clone();
        let sid = sid.clone();
        tokio::spawn(async move { registry.fire(&sid, Slot::One, 4, 4) })
    };
    let quit_status = quitter.await.unwrap();
    let shot = shooter.await.unwrap();

    let state = registry.get_state(&sid).unwrap();
    match shot {
        // the shot landed first: the win stands and quit leaves it alone
        Ok(_) => {
            assert_eq!(state.status, SessionStatus::Finished { winner: Slot::One });
            assert_eq!(quit_status, state.status);
            assert_eq!(stats.all().unwrap().len(), 2);
        }
        Err(_) => {
            assert_eq!(state.status, SessionStatus::Cancelled { by: Slot::Two });
            assert!(stats.all().unwrap().is_empty());
        }
    }
}
