use crate::core::{Board, Cell, Player};
use crate::logic::ColumnScore;
use crossterm::style::Stylize;
use std::io::{self, Write};

/// 盤面を1行1段で出力する
///
/// Without colour the output is exactly `board.to_string()`. With colour, CPU
/// pieces are cyan and opponent pieces magenta.
pub fn write_board<W: Write>(out: &mut W, board: &Board, color: bool) -> io::Result<()> {
    if !color {
        return write!(out, "{}", board);
    }
    for row in 0..board.height() {
        for column in 0..board.width() {
            let cell = board.cell(row, column);
            let symbol = cell.symbol().to_string();
            match cell {
                Cell::Empty => write!(out, "{}", symbol.dark_grey())?,
                Cell::Taken(Player::Cpu) => write!(out, "{}", symbol.cyan().bold())?,
                Cell::Taken(Player::Opponent) => write!(out, "{}", symbol.magenta().bold())?,
            }
        }
        writeln!(out)?;
    }
    Ok(())
}

/// Per-column scores, three decimals each, space separated.
pub fn format_scores(scores: &[ColumnScore]) -> String {
    scores
        .iter()
        .map(|s| format!("{:.3}", s.score))
        .collect::<Vec<_>>()
        .join(" ")
}
