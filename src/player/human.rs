use crate::core::Board;
use crate::error::InputError;
use std::io::Write;
use tokio::io::{AsyncBufRead, Lines};

/// Parses one line of human input into a playable column.
pub fn parse_column(line: &str, board: &Board) -> Result<usize, InputError> {
    let input = line.trim();
    let value: i64 = input.parse().map_err(|_| InputError::NotANumber {
        input: input.to_string(),
    })?;

    let max = board.width() - 1;
    let column = usize::try_from(value)
        .ok()
        .filter(|&c| c <= max)
        .ok_or(InputError::OutOfRange { column: value, max })?;

    if !board.is_legal(column) {
        return Err(InputError::ColumnFull { column });
    }
    Ok(column)
}

/// 合法な列が入力されるまで繰り返す
///
/// Returns `None` at end of input.
pub async fn read_move<R, W>(
    lines: &mut Lines<R>,
    out: &mut W,
    board: &Board,
) -> anyhow::Result<Option<usize>>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    loop {
        write!(out, "Your move (0-{}): ", board.width() - 1)?;
        out.flush()?;

        let Some(line) = lines.next_line().await? else {
            return Ok(None);
        };
        match parse_column(&line, board) {
            Ok(column) => return Ok(Some(column)),
            Err(e) => writeln!(out, "{}", e)?,
        }
    }
}
