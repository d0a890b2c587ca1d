use crate::core::{Board, Cell};
use crate::error::BoardError;

impl Board {
    /// 文字列配列から盤面を初期化する
    ///
    /// Rows are given top first, one symbol per cell: `=` empty, `C` CPU,
    /// `P` opponent. Whitespace inside a row is ignored.
    pub fn from_rows(rows: &[&str]) -> Result<Board, BoardError> {
        let parsed: Vec<Vec<char>> = rows
            .iter()
            .map(|row| row.chars().filter(|c| !c.is_whitespace()).collect())
            .collect();

        let height = parsed.len();
        let width = parsed.first().map(Vec::len).unwrap_or(0);
        if height == 0 || width == 0 {
            return Err(BoardError::Empty);
        }

        let mut cells = Vec::with_capacity(width * height);
        for (row, symbols) in parsed.iter().enumerate() {
            if symbols.len() != width {
                return Err(BoardError::RaggedRow {
                    row,
                    expected: width,
                    got: symbols.len(),
                });
            }
            for (column, &symbol) in symbols.iter().enumerate() {
                let cell = Cell::from_symbol(symbol).ok_or(BoardError::InvalidSymbol {
                    symbol,
                    row,
                    column,
                })?;
                cells.push(cell);
            }
        }

        // gravity: nothing may rest on an empty cell
        for row in 0..height - 1 {
            for column in 0..width {
                let here = cells[row * width + column];
                let below = cells[(row + 1) * width + column];
                if !here.is_empty() && below.is_empty() {
                    return Err(BoardError::FloatingPiece { row, column });
                }
            }
        }

        Ok(Board::from_cells(width, height, cells))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Player;

    #[test]
    fn test_from_rows() {
        let board = Board::from_rows(&["= = =", "P = =", "P C ="]).unwrap();
        assert_eq!(board.width(), 3);
        assert_eq!(board.height(), 3);
        assert_eq!(board.cell(2, 1), Cell::Taken(Player::Cpu));
        assert_eq!(board.top_row(0), Some(1));
        assert_eq!(board.to_string(), "===\nP==\nPC=\n");
    }

    #[test]
    fn test_from_rows_errors() {
        assert_eq!(Board::from_rows(&[]), Err(BoardError::Empty));
        assert_eq!(
            Board::from_rows(&["===", "=="]),
            Err(BoardError::RaggedRow {
                row: 1,
                expected: 3,
                got: 2
            })
        );
        assert_eq!(
            Board::from_rows(&["=X="]),
            Err(BoardError::InvalidSymbol {
                symbol: 'X',
                row: 0,
                column: 1
            })
        );
        assert_eq!(
            Board::from_rows(&["=P=", "==="]),
            Err(BoardError::FloatingPiece { row: 0, column: 1 })
        );
    }
}
