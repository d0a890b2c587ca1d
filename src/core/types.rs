use serde::{Deserialize, Serialize};
use std::fmt;

/// 手番を持つ側
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Player {
    Cpu,
    Opponent,
}

impl Player {
    pub fn opponent(self) -> Player {
        match self {
            Player::Cpu => Player::Opponent,
            Player::Opponent => Player::Cpu,
        }
    }

    /// Score of a forced win for this side.
    pub fn win_score(self) -> f64 {
        match self {
            Player::Cpu => 1.0,
            Player::Opponent => -1.0,
        }
    }
}

impl fmt::Display for Player {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Player::Cpu => write!(f, "CPU"),
            Player::Opponent => write!(f, "Player"),
        }
    }
}

/// マスの状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Cell {
    #[default]
    Empty,
    Taken(Player),
}

impl Cell {
    pub const EMPTY_SYMBOL: char = '=';
    pub const CPU_SYMBOL: char = 'C';
    pub const OPPONENT_SYMBOL: char = 'P';

    pub fn symbol(self) -> char {
        match self {
            Cell::Empty => Self::EMPTY_SYMBOL,
            Cell::Taken(Player::Cpu) => Self::CPU_SYMBOL,
            Cell::Taken(Player::Opponent) => Self::OPPONENT_SYMBOL,
        }
    }

    pub fn from_symbol(symbol: char) -> Option<Cell> {
        match symbol {
            Self::EMPTY_SYMBOL => Some(Cell::Empty),
            Self::CPU_SYMBOL => Some(Cell::Taken(Player::Cpu)),
            Self::OPPONENT_SYMBOL => Some(Cell::Taken(Player::Opponent)),
            _ => None,
        }
    }

    pub fn owner(self) -> Option<Player> {
        match self {
            Cell::Empty => None,
            Cell::Taken(p) => Some(p),
        }
    }

    pub fn is_empty(self) -> bool {
        self == Cell::Empty
    }
}
