//! Battleship rules engine
//!
//! Each session owns one [`Battleship`] value. The registry only relies on
//! the [`GameEngine`] surface: fire a shot, read the winner, take a snapshot.

use crate::common::{Error, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};

pub const GRID_SIZE: usize = 10;
pub const SHIP_SIZES: [usize; 5] = [5, 4, 3, 3, 2];

/// Player slot inside a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Slot {
    One,
    Two,
}

impl Slot {
    pub fn number(self) -> u8 {
        match self {
            Slot::One => 1,
            Slot::Two => 2,
        }
    }

    pub fn other(self) -> Slot {
        match self {
            Slot::One => Slot::Two,
            Slot::Two => Slot::One,
        }
    }

    pub(crate) fn index(self) -> usize {
        self.number() as usize - 1
    }
}

impl TryFrom<u8> for Slot {
    type Error = String;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            1 => Ok(Slot::One),
            2 => Ok(Slot::Two),
            other => Err(format!("player slot must be 1 or 2, got {}", other)),
        }
    }
}

impl From<Slot> for u8 {
    fn from(slot: Slot) -> u8 {
        slot.number()
    }
}

impl std::fmt::Display for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.number())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShotResult {
    Hit,
    Miss,
}

/// Reply to a single shot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShotOutcome {
    pub result: ShotResult,
    pub winner: Option<Slot>,
    pub next_player: Slot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Horizontal,
    Vertical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ship {
    pub row: usize,
    pub col: usize,
    pub len: usize,
    pub orientation: Orientation,
}

impl Ship {
    pub fn horizontal(row: usize, col: usize, len: usize) -> Self {
        Self {
            row,
            col,
            len,
            orientation: Orientation::Horizontal,
        }
    }

    pub fn vertical(row: usize, col: usize, len: usize) -> Self {
        Self {
            row,
            col,
            len,
            orientation: Orientation::Vertical,
        }
    }

    fn cells(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        (0..self.len).map(move |i| match self.orientation {
            Orientation::Horizontal => (self.row, self.col + i),
            Orientation::Vertical => (self.row + i, self.col),
        })
    }

    fn fits(&self) -> bool {
        self.len > 0
            && match self.orientation {
                Orientation::Horizontal => self.row < GRID_SIZE && self.col + self.len <= GRID_SIZE,
                Orientation::Vertical => self.col < GRID_SIZE && self.row + self.len <= GRID_SIZE,
            }
    }
}

pub type Grid = Vec<Vec<char>>;

/// Board state as exposed to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardSnapshot {
    pub p1_grid: Grid,
    pub p2_grid: Grid,
    pub p1_tracking: Grid,
    pub p2_tracking: Grid,
    pub current_player: Slot,
    pub winner: Option<Slot>,
    pub grid_size: usize,
    pub ship_sizes: Vec<usize>,
}

/// Rules engine boundary used by the session registry.
pub trait GameEngine: Send {
    /// Apply one shot by `slot` against the opponent's ocean.
    fn fire(&mut self, slot: Slot, row: usize, col: usize) -> Result<ShotOutcome>;

    fn snapshot(&self) -> BoardSnapshot;

    fn winner(&self) -> Option<Slot>;

    fn current_player(&self) -> Slot;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cell {
    Water,
    Ship,
    Hit,
    Miss,
}

impl Cell {
    fn glyph(self) -> char {
        match self {
            Cell::Water => '~',
            Cell::Ship => 'S',
            Cell::Hit => 'X',
            Cell::Miss => 'O',
        }
    }

    /// What the opponent sees of this cell.
    fn tracked_glyph(self) -> char {
        match self {
            Cell::Hit => 'X',
            Cell::Miss => 'O',
            Cell::Water | Cell::Ship => '~',
        }
    }
}

#[derive(Debug, Clone)]
struct Ocean {
    cells: [[Cell; GRID_SIZE]; GRID_SIZE],
    afloat: usize,
}

impl Ocean {
    fn empty() -> Self {
        Self {
            cells: [[Cell::Water; GRID_SIZE]; GRID_SIZE],
            afloat: 0,
        }
    }

    fn place(&mut self, ship: &Ship) -> Result<()> {
        if !ship.fits() {
            return Err(Error::InvalidRequest(format!("ship {:?} does not fit the grid", ship)));
        }
        if ship.cells().any(|(r, c)| self.cells[r][c] != Cell::Water) {
            return Err(Error::InvalidRequest(format!("ship {:?} overlaps another ship", ship)));
        }
        for (r, c) in ship.cells() {
            self.cells[r][c] = Cell::Ship;
        }
        self.afloat += ship.len;
        Ok(())
    }

    fn random_fleet<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut ocean = Self::empty();
        for &len in SHIP_SIZES.iter() {
            loop {
                let ship = if rng.gen_bool(0.5) {
                    Ship::horizontal(rng.gen_range(0..GRID_SIZE), rng.gen_range(0..=GRID_SIZE - len), len)
                } else {
                    Ship::vertical(rng.gen_range(0..=GRID_SIZE - len), rng.gen_range(0..GRID_SIZE), len)
                };
                if ocean.place(&ship).is_ok() {
                    break;
                }
            }
        }
        ocean
    }

    fn grid(&self, glyph: fn(Cell) -> char) -> Grid {
        self.cells
            .iter()
            .map(|row| row.iter().map(|&cell| glyph(cell)).collect())
            .collect()
    }
}

/// Two-player battleship on a 10×10 grid.
#[derive(Debug, Clone)]
pub struct Battleship {
    oceans: [Ocean; 2],
    current: Slot,
    winner: Option<Slot>,
}

impl Battleship {
    pub fn random() -> Self {
        Self::random_with(&mut rand::thread_rng())
    }

    pub fn random_with<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self {
            oceans: [Ocean::random_fleet(rng), Ocean::random_fleet(rng)],
            current: Slot::One,
            winner: None,
        }
    }

    /// Build a game from explicit fleets (player 1's, player 2's).
    pub fn with_fleets(p1: &[Ship], p2: &[Ship]) -> Result<Self> {
        let mut oceans = [Ocean::empty(), Ocean::empty()];
        for (ocean, fleet) in oceans.iter_mut().zip([p1, p2]) {
            for ship in fleet {
                ocean.place(ship)?;
            }
        }
        Ok(Self {
            oceans,
            current: Slot::One,
            winner: None,
        })
    }
}

impl Default for Battleship {
    fn default() -> Self {
        Self::random()
    }
}

impl GameEngine for Battleship {
    fn fire(&mut self, slot: Slot, row: usize, col: usize) -> Result<ShotOutcome> {
        if let Some(winner) = self.winner {
            return Err(Error::InvalidMove(format!("game already won by player {}", winner)));
        }
        if slot != self.current {
            return Err(Error::InvalidMove(format!("not player {}'s turn", slot)));
        }
        if row >= GRID_SIZE || col >= GRID_SIZE {
            return Err(Error::InvalidMove(format!(
                "cell ({}, {}) is outside the {}x{} grid",
                row, col, GRID_SIZE, GRID_SIZE
            )));
        }

        let target = &mut self.oceans[slot.other().index()];
        let result = match target.cells[row][col] {
            Cell::Hit | Cell::Miss => {
                return Err(Error::InvalidMove(format!("cell ({}, {}) already targeted", row, col)))
            }
            Cell::Ship => {
                target.cells[row][col] = Cell::Hit;
                target.afloat -= 1;
                ShotResult::Hit
            }
            Cell::Water => {
                target.cells[row][col] = Cell::Miss;
                ShotResult::Miss
            }
        };

        if target.afloat == 0 {
            self.winner = Some(slot);
        }
        self.current = slot.other();

        Ok(ShotOutcome {
            result,
            winner: self.winner,
            next_player: self.current,
        })
    }

    fn snapshot(&self) -> BoardSnapshot {
        let [p1, p2] = &self.oceans;
        BoardSnapshot {
            p1_grid: p1.grid(Cell::glyph),
            p2_grid: p2.grid(Cell::glyph),
            // each player's view of the opponent's ocean
            p1_tracking: p2.grid(Cell::tracked_glyph),
            p2_tracking: p1.grid(Cell::tracked_glyph),
            current_player: self.current,
            winner: self.winner,
            grid_size: GRID_SIZE,
            ship_sizes: SHIP_SIZES.to_vec(),
        }
    }

    fn winner(&self) -> Option<Slot> {
        self.winner
    }

    fn current_player(&self) -> Slot {
        self.current
    }
}
