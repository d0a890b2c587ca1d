pub mod board;
pub mod serialization;
pub mod setup;
pub mod types;

pub use board::{Board, Placement, WIN_LENGTH};
pub use types::{Cell, Player};
