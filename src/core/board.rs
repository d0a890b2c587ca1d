use super::types::{Cell, Player};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Deref, DerefMut};

/// Number of same-owner cells in a line that wins the game.
pub const WIN_LENGTH: usize = 4;

pub const DEFAULT_WIDTH: usize = 7;
pub const DEFAULT_HEIGHT: usize = 7;

/// Line directions as (row step, column step): horizontal, vertical, `\` and `/`.
const DIRECTIONS: [(isize, isize); 4] = [(0, 1), (1, 0), (1, 1), (1, -1)];

/// 盤面
///
/// Row 0 is the top of the grid. Pieces fall to the lowest empty row of a
/// column, so a cell is only ever occupied if every cell below it is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    try_from = "crate::core::serialization::BoardRows",
    into = "crate::core::serialization::BoardRows"
)]
pub struct Board {
    width: usize,
    height: usize,
    cells: Vec<Cell>,
}

impl Default for Board {
    fn default() -> Self {
        Board::new(DEFAULT_WIDTH, DEFAULT_HEIGHT)
    }
}

impl Board {
    pub fn new(width: usize, height: usize) -> Self {
        Board {
            width,
            height,
            cells: vec![Cell::Empty; width * height],
        }
    }

    pub(crate) fn from_cells(width: usize, height: usize, cells: Vec<Cell>) -> Self {
        debug_assert_eq!(cells.len(), width * height);
        Board {
            width,
            height,
            cells,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn cell(&self, row: usize, column: usize) -> Cell {
        self.cells[row * self.width + column]
    }

    fn set(&mut self, row: usize, column: usize, cell: Cell) {
        self.cells[row * self.width + column] = cell;
    }

    /// 合法手判定: the column exists and its top cell is still empty.
    pub fn is_legal(&self, column: usize) -> bool {
        column < self.width && self.height > 0 && self.cell(0, column).is_empty()
    }

    pub fn legal_columns(&self) -> Vec<usize> {
        (0..self.width).filter(|&c| self.is_legal(c)).collect()
    }

    pub fn is_full(&self) -> bool {
        (0..self.width).all(|c| !self.is_legal(c))
    }

    /// Row of the topmost occupied cell in `column`, if any.
    pub fn top_row(&self, column: usize) -> Option<usize> {
        if column >= self.width {
            return None;
        }
        (0..self.height).find(|&row| !self.cell(row, column).is_empty())
    }

    /// Drops a piece into `column`. Returns false and leaves the board
    /// untouched if the move is illegal.
    pub fn place(&mut self, column: usize, player: Player) -> bool {
        if !self.is_legal(column) {
            return false;
        }
        let row = match self.top_row(column) {
            Some(top) => top - 1,
            None => self.height - 1,
        };
        self.set(row, column, Cell::Taken(player));
        true
    }

    /// Removes the topmost piece of `column`.
    ///
    /// Precondition: retractions mirror placements in strict reverse order.
    /// Retracting a column with nothing pending, or out of order relative to
    /// interleaved placements, leaves the board in an unspecified state.
    /// Prefer [`Board::play`], whose guard keeps that order by construction.
    pub fn retract(&mut self, column: usize) {
        let top = self.top_row(column);
        debug_assert!(top.is_some(), "retract on empty column {}", column);
        if let Some(row) = top {
            self.set(row, column, Cell::Empty);
        }
    }

    /// Places a piece and hands back a guard that retracts it when dropped.
    pub fn play(&mut self, column: usize, player: Player) -> Option<Placement<'_>> {
        if self.place(column, player) {
            Some(Placement {
                board: self,
                column,
            })
        } else {
            None
        }
    }

    /// 勝敗判定
    ///
    /// Looks at the piece most recently dropped into `column` and reports its
    /// owner if a line of [`WIN_LENGTH`] passes through that cell's row, column
    /// or either diagonal.
    pub fn detect_win(&self, column: usize) -> Option<Player> {
        let row = self.top_row(column)?;
        let player = self.cell(row, column).owner()?;

        DIRECTIONS
            .iter()
            .any(|&(dr, dc)| self.longest_run(row, column, dr, dc, player) >= WIN_LENGTH)
            .then_some(player)
    }

    /// Walks from (row, column) back to the board edge along the direction,
    /// then scans the whole line forward and returns the longest run of
    /// `player` cells seen anywhere on it.
    fn longest_run(&self, row: usize, column: usize, dr: isize, dc: isize, player: Player) -> usize {
        let (mut r, mut c) = (row as isize, column as isize);
        while self.in_bounds(r - dr, c - dc) {
            r -= dr;
            c -= dc;
        }

        let target = Cell::Taken(player);
        let mut run = 0;
        let mut longest = 0;
        while self.in_bounds(r, c) {
            if self.cell(r as usize, c as usize) == target {
                run += 1;
                longest = longest.max(run);
            } else {
                run = 0;
            }
            r += dr;
            c += dc;
        }
        longest
    }

    fn in_bounds(&self, row: isize, column: isize) -> bool {
        row >= 0 && column >= 0 && (row as usize) < self.height && (column as usize) < self.width
    }

    /// Row strings, top row first, one symbol per cell.
    pub fn rows(&self) -> Vec<String> {
        self.cells
            .chunks(self.width.max(1))
            .take(self.height)
            .map(|row| row.iter().map(|c| c.symbol()).collect())
            .collect()
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for row in self.rows() {
            writeln!(f, "{}", row)?;
        }
        Ok(())
    }
}

/// A piece placed through [`Board::play`]; retracted again on drop.
pub struct Placement<'a> {
    board: &'a mut Board,
    column: usize,
}

impl Placement<'_> {
    pub fn column(&self) -> usize {
        self.column
    }
}

impl Deref for Placement<'_> {
    type Target = Board;

    fn deref(&self) -> &Board {
        self.board
    }
}

impl DerefMut for Placement<'_> {
    fn deref_mut(&mut self) -> &mut Board {
        self.board
    }
}

impl Drop for Placement<'_> {
    fn drop(&mut self) {
        self.board.retract(self.column);
    }
}
