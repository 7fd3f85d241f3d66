//! Session registry: pairing, per-session turn state, outcome reporting
//!
//! Locking: one registry lock covers the pending-registration slot and the
//! id → session map; each session sits behind its own lock so fires on
//! different sessions never serialize against each other.

use crate::common::{Error, Result};
use crate::game::board::{Battleship, GameEngine, ShotOutcome, Slot};
use crate::game::session::{GameSession, MatchResult, SessionSnapshot, SessionStatus};
use crate::game::stats::{PlayerStats, StatsStore};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub type EngineFactory = Arc<dyn Fn() -> Box<dyn GameEngine> + Send + Sync>;

/// Reply to `register_player`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    pub slot: Slot,
    pub session_id: String,
}

struct Pending {
    name: String,
    session_id: String,
}

#[derive(Default)]
struct Inner {
    pending: Option<Pending>,
    sessions: HashMap<String, Arc<Mutex<GameSession>>>,
}

pub struct SessionRegistry {
    inner: Mutex<Inner>,
    engines: EngineFactory,
    stats: Arc<dyn StatsStore>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SessionRegistry {
    /// Registry dealing randomly placed fleets.
    pub fn new(stats: Arc<dyn StatsStore>) -> Self {
        Self::with_engine_factory(stats, Arc::new(|| Box::new(Battleship::random()) as Box<dyn GameEngine>))
    }

    pub fn with_engine_factory(stats: Arc<dyn StatsStore>, engines: EngineFactory) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            engines,
            stats,
        }
    }

    /// First caller waits in slot 1; the next caller completes the pair.
    pub fn register_player(&self, name: &str) -> Result<Registration> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidRequest("player name must not be empty".into()));
        }

        let mut inner = lock(&self.inner);
        match inner.pending.take() {
            None => {
                let session_id = uuid::Uuid::new_v4().to_string();
                inner.pending = Some(Pending {
                    name: name.to_string(),
                    session_id: session_id.clone(),
                });
                tracing::info!(session_id = %session_id, player = name, "player waiting for an opponent");
                Ok(Registration {
                    slot: Slot::One,
                    session_id,
                })
            }
            Some(waiting) => {
                let session = GameSession::new(waiting.session_id.clone(), waiting.name, name, (self.engines)());
                inner
                    .sessions
                    .insert(waiting.session_id.clone(), Arc::new(Mutex::new(session)));
                tracing::info!(session_id = %waiting.session_id, player = name, "session started");
                Ok(Registration {
                    slot: Slot::Two,
                    session_id: waiting.session_id,
                })
            }
        }
    }

    fn session(&self, session_id: &str) -> Result<Arc<Mutex<GameSession>>> {
        lock(&self.inner)
            .sessions
            .get(session_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(session_id.to_string()))
    }

    pub fn fire(&self, session_id: &str, slot: Slot, row: usize, col: usize) -> Result<ShotOutcome> {
        let session = self.session(session_id)?;
        let (outcome, result) = lock(&session).fire(slot, row, col)?;

        if let Some(result) = result {
            tracing::info!(
                session_id,
                winner = %result.winner,
                loser = %result.loser,
                "session finished"
            );
            self.record_match(&result);
        }
        Ok(outcome)
    }

    fn record_match(&self, result: &MatchResult) {
        for (name, won) in [(&result.winner, true), (&result.loser, false)] {
            if let Err(e) = self.stats.record_result(name, won) {
                tracing::error!(player = %name, "failed to record match result: {}", e);
            }
        }
    }

    pub fn get_state(&self, session_id: &str) -> Result<SessionSnapshot> {
        let session = self.session(session_id)?;
        let snapshot = lock(&session).snapshot();
        Ok(snapshot)
    }

    /// Cancel a session. Quitting while still waiting for an opponent frees
    /// the pending slot instead.
    pub fn quit(&self, session_id: &str, slot: Slot) -> Result<SessionStatus> {
        let session = {
            let mut inner = lock(&self.inner);
            if inner.pending.as_ref().is_some_and(|p| p.session_id == session_id) {
                if slot != Slot::One {
                    return Err(Error::InvalidRequest(format!(
                        "session {} has no player in slot {} yet",
                        session_id, slot
                    )));
                }
                inner.pending = None;
                tracing::info!(session_id, "waiting player left");
                return Ok(SessionStatus::Cancelled { by: slot });
            }
            inner
                .sessions
                .get(session_id)
                .cloned()
                .ok_or_else(|| Error::NotFound(session_id.to_string()))?
        };
        let status = lock(&session).quit(slot);
        tracing::info!(session_id, player = %slot, ?status, "quit");
        Ok(status)
    }

    pub fn statistics(&self) -> Result<Vec<PlayerStats>> {
        self.stats.all()
    }

    pub fn session_count(&self) -> usize {
        lock(&self.inner).sessions.len()
    }

    pub fn waiting_player(&self) -> Option<String> {
        lock(&self.inner).pending.as_ref().map(|p| p.name.clone())
    }
}
