//! A single two-player game session

use crate::common::{Error, Result};
use crate::game::board::{BoardSnapshot, GameEngine, ShotOutcome, Slot};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of a session. Terminal states are never left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Finished { winner: Slot },
    Cancelled { by: Slot },
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionStatus::Active)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub slot: Slot,
    pub name: String,
}

/// Names to credit once a session produces a winner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    pub winner: String,
    pub loser: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub players: Vec<Player>,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub board: BoardSnapshot,
}

pub struct GameSession {
    id: String,
    players: [Player; 2],
    engine: Box<dyn GameEngine>,
    status: SessionStatus,
    outcome_recorded: bool,
    created_at: DateTime<Utc>,
}

impl GameSession {
    pub fn new(
        id: impl Into<String>,
        first: impl Into<String>,
        second: impl Into<String>,
        engine: Box<dyn GameEngine>,
    ) -> Self {
        Self {
            id: id.into(),
            players: [
                Player {
                    slot: Slot::One,
                    name: first.into(),
                },
                Player {
                    slot: Slot::Two,
                    name: second.into(),
                },
            ],
            engine,
            status: SessionStatus::Active,
            outcome_recorded: false,
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn player_name(&self, slot: Slot) -> &str {
        &self.players[slot.index()].name
    }

    /// Apply a shot. The returned [`MatchResult`] is handed out at most once
    /// over the session's lifetime.
    pub fn fire(&mut self, slot: Slot, row: usize, col: usize) -> Result<(ShotOutcome, Option<MatchResult>)> {
        match self.status {
            SessionStatus::Cancelled { by } => {
                return Err(Error::InvalidMove(format!("session cancelled by player {}", by)))
            }
            SessionStatus::Finished { winner } => {
                return Err(Error::InvalidMove(format!("game already won by player {}", winner)))
            }
            SessionStatus::Active => {}
        }

        let outcome = self.engine.fire(slot, row, col)?;

        let mut result = None;
        if let Some(winner) = outcome.winner {
            self.status = SessionStatus::Finished { winner };
            if !self.outcome_recorded {
                self.outcome_recorded = true;
                result = Some(MatchResult {
                    winner: self.player_name(winner).to_string(),
                    loser: self.player_name(winner.other()).to_string(),
                });
            }
        }
        Ok((outcome, result))
    }

    /// Cancel an active session. Finished sessions keep their result.
    pub fn quit(&mut self, slot: Slot) -> SessionStatus {
        if self.status == SessionStatus::Active {
            self.status = SessionStatus::Cancelled { by: slot };
        }
        self.status
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.id.clone(),
            players: self.players.to_vec(),
            status: self.status,
            created_at: self.created_at,
            board: self.engine.snapshot(),
        }
    }
}

impl std::fmt::Debug for GameSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameSession")
            .field("id", &self.id)
            .field("players", &self.players)
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}
