//! Player win/loss statistics
//!
//! Records are created lazily the first time a player finishes a match.
//! Two backends: an in-memory map and a sled tree for persistence across
//! restarts.

use crate::common::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;

const STATS_TREE: &str = "statistics";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerStats {
    pub player_id: u64,
    pub player_name: String,
    pub games_won: u64,
    pub games_lost: u64,
    pub updated_at: DateTime<Utc>,
}

impl PlayerStats {
    fn new(player_id: u64, player_name: &str) -> Self {
        Self {
            player_id,
            player_name: player_name.to_string(),
            games_won: 0,
            games_lost: 0,
            updated_at: Utc::now(),
        }
    }

    fn apply(&mut self, won: bool) {
        if won {
            self.games_won += 1;
        } else {
            self.games_lost += 1;
        }
        self.updated_at = Utc::now();
    }
}

/// Keyed increment/lookup store for match results.
pub trait StatsStore: Send + Sync {
    fn record_result(&self, player_name: &str, won: bool) -> Result<PlayerStats>;

    fn lookup(&self, player_name: &str) -> Result<Option<PlayerStats>>;

    /// All records, ordered by player id.
    fn all(&self) -> Result<Vec<PlayerStats>>;
}

/// In-memory store (default)
#[derive(Default)]
pub struct MemoryStatsStore {
    inner: Mutex<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    next_id: u64,
    players: BTreeMap<String, PlayerStats>,
}

impl MemoryStatsStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn inner(&self) -> std::sync::MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl StatsStore for MemoryStatsStore {
    fn record_result(&self, player_name: &str, won: bool) -> Result<PlayerStats> {
        let mut inner = self.inner();
        if !inner.players.contains_key(player_name) {
            inner.next_id += 1;
            let record = PlayerStats::new(inner.next_id, player_name);
            inner.players.insert(player_name.to_string(), record);
        }
        let record = inner
            .players
            .get_mut(player_name)
            .ok_or_else(|| crate::Error::Internal(format!("stats entry for {} vanished", player_name)))?;
        record.apply(won);
        Ok(record.clone())
    }

    fn lookup(&self, player_name: &str) -> Result<Option<PlayerStats>> {
        Ok(self.inner().players.get(player_name).cloned())
    }

    fn all(&self) -> Result<Vec<PlayerStats>> {
        let mut all: Vec<_> = self.inner().players.values().cloned().collect();
        all.sort_by_key(|s| s.player_id);
        Ok(all)
    }
}

/// Sled-backed store
pub struct SledStatsStore {
    db: sled::Db,
    tree: sled::Tree,
}

impl SledStatsStore {
    /// Open or create the store
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = sled::open(path)?;
        let tree = db.open_tree(STATS_TREE)?;
        Ok(Self { db, tree })
    }

    /// Flush to disk
    pub fn flush(&self) -> Result<()> {
        self.tree.flush()?;
        Ok(())
    }
}

impl StatsStore for SledStatsStore {
    fn record_result(&self, player_name: &str, won: bool) -> Result<PlayerStats> {
        let key = player_name.as_bytes();
        // compare-and-swap loop keeps concurrent increments from clobbering each other
        loop {
            let current = self.tree.get(key)?;
            let mut record = match &current {
                Some(bytes) => bincode::deserialize::<PlayerStats>(bytes)?,
                None => PlayerStats::new(self.db.generate_id()? + 1, player_name),
            };
            record.apply(won);
            let encoded = bincode::serialize(&record)?;

            match self.tree.compare_and_swap(key, current, Some(encoded))? {
                Ok(()) => {
                    self.flush()?;
                    return Ok(record);
                }
                Err(_) => {
                    tracing::debug!(player = player_name, "stats update raced, retrying");
                }
            }
        }
    }

    fn lookup(&self, player_name: &str) -> Result<Option<PlayerStats>> {
        match self.tree.get(player_name.as_bytes())? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    fn all(&self) -> Result<Vec<PlayerStats>> {
        let mut all = Vec::new();
        for item in self.tree.iter() {
            let (_, value) = item?;
            all.push(bincode::deserialize::<PlayerStats>(&value)?);
        }
        all.sort_by_key(|s| s.player_id);
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn exercise(store: &dyn StatsStore) {
        assert!(store.lookup("Alice").unwrap().is_none());

        store.record_result("Alice", true).unwrap();
        store.record_result("Bob", false).unwrap();
        let alice = store.record_result("Alice", false).unwrap();
        assert_eq!((alice.games_won, alice.games_lost), (1, 1));

        let bob = store.lookup("Bob").unwrap().unwrap();
        assert_eq!((bob.games_won, bob.games_lost), (0, 1));

        let names: Vec<_> = store.all().unwrap().into_iter().map(|s| s.player_name).collect();
        assert_eq!(names, vec!["Alice".to_string(), "Bob".to_string()]);
    }

    #[test]
    fn test_memory_store() {
        exercise(&MemoryStatsStore::new());
    }

    #[test]
    fn test_sled_store() {
        let dir = tempdir().unwrap();
        exercise(&SledStatsStore::open(dir.path().join("stats")).unwrap());
    }

    #[test]
    fn test_sled_store_persists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stats");
        {
            let store = SledStatsStore::open(&path).unwrap();
            store.record_result("VP", true).unwrap();
        }
        let store = SledStatsStore::open(&path).unwrap();
        assert_eq!(store.lookup("VP").unwrap().unwrap().games_won, 1);
    }

    #[test]
    fn test_sled_concurrent_increments() {
        let dir = tempdir().unwrap();
        let store = Arc::new(SledStatsStore::open(dir.path().join("stats")).unwrap());
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for _ in 0..10 {
                        store.record_result("Juhani", true).unwrap();
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }
        assert_eq!(store.lookup("Juhani").unwrap().unwrap().games_won, 80);
    }
}
