//! Game data plane
//!
//! - Rules engine for a single battleship match
//! - Session lifecycle and the registry pairing waiting players
//! - Win/loss statistics

pub mod board;
pub mod registry;
pub mod session;
pub mod stats;

pub use board::{Battleship, BoardSnapshot, GameEngine, Ship, ShotOutcome, ShotResult, Slot};
pub use registry::{EngineFactory, Registration, SessionRegistry};
pub use session::{GameSession, SessionSnapshot, SessionStatus};
pub use stats::{MemoryStatsStore, PlayerStats, SledStatsStore, StatsStore};
