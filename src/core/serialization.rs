//! Wire form of a [`Board`]: its row strings, top row first.

use crate::core::Board;
use crate::error::BoardError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BoardRows(pub Vec<String>);

impl From<Board> for BoardRows {
    fn from(board: Board) -> Self {
        BoardRows(board.rows())
    }
}

impl TryFrom<BoardRows> for Board {
    type Error = BoardError;

    fn try_from(rows: BoardRows) -> Result<Self, Self::Error> {
        let refs: Vec<&str> = rows.0.iter().map(String::as_str).collect();
        Board::from_rows(&refs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Player;

    #[test]
    fn test_board_serializes_as_rows() {
        let mut board = Board::new(3, 2);
        board.place(1, Player::Opponent);
        let json = serde_json::to_string(&board).unwrap();
        assert_eq!(json, r#"["===","=P="]"#);

        let back: Board = serde_json::from_str(&json).unwrap();
        assert_eq!(back, board);
    }

    #[test]
    fn test_rejects_floating_piece() {
        let err = serde_json::from_str::<Board>(r#"["C==","==="]"#).unwrap_err();
        assert!(err.to_string().contains("floating piece"));
    }
}
