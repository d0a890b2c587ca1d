//! Error types shared by the board, the input loop and the cluster protocol.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BoardError {
    #[error("board has no rows")]
    Empty,

    #[error("row {row} has {got} cells, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        got: usize,
    },

    #[error("invalid cell symbol '{symbol}' at row {row}, column {column}")]
    InvalidSymbol {
        symbol: char,
        row: usize,
        column: usize,
    },

    #[error("floating piece at row {row}, column {column} (cell below is empty)")]
    FloatingPiece { row: usize, column: usize },
}

/// 人間の入力エラー
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    #[error("'{input}' is not a column number")]
    NotANumber { input: String },

    #[error("column {column} is out of range (0-{max})")]
    OutOfRange { column: i64, max: usize },

    #[error("column {column} is full")]
    ColumnFull { column: usize },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProtocolError {
    #[error("invalid task id '{input}' (expected '<cpu>-<opponent>')")]
    InvalidTaskId { input: String },

    #[error("invalid task outcome '{input}' (expected '<cpu>-<opponent>=<score>')")]
    InvalidOutcome { input: String },

    #[error("score {score} is outside [-1, 1]")]
    ScoreOutOfRange { score: f64 },
}
