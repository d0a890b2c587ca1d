use crate::core::{Board, Player};
use crate::display::{format_scores, write_board};
use crate::player::{read_move, CpuPlayer};
use log::{debug, info};
use std::io::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Won(Player),
    Draw,
    /// Input ended before the game did.
    Abandoned,
}

/// 1局分の状態
pub struct Game {
    board: Board,
    turn: u32,
    history: Vec<(Player, usize)>,
    color: bool,
}

impl Game {
    pub fn new(board: Board) -> Self {
        Game {
            board,
            turn: 0,
            history: Vec::new(),
            color: false,
        }
    }

    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn turn(&self) -> u32 {
        self.turn
    }

    pub fn history(&self) -> &[(Player, usize)] {
        &self.history
    }

    /// Plays human (reading `input`) against `cpu` until someone wins, the
    /// board fills up or the input runs out. The CPU is told the game is over
    /// on every exit path.
    pub async fn play<R, W>(&mut self, cpu: &mut CpuPlayer, input: R, out: &mut W) -> anyhow::Result<Outcome>
    where
        R: AsyncBufRead + Unpin,
        W: Write,
    {
        info!(
            "new game on a {}x{} board against {}",
            self.board.width(),
            self.board.height(),
            cpu.name()
        );
        let result = self.run(cpu, input, out).await;
        cpu.game_over();
        if let Ok(outcome) = &result {
            info!("game over after {} turns: {:?}", self.turn, outcome);
        }
        result
    }

    async fn run<R, W>(&mut self, cpu: &mut CpuPlayer, input: R, out: &mut W) -> anyhow::Result<Outcome>
    where
        R: AsyncBufRead + Unpin,
        W: Write,
    {
        let mut lines = input.lines();
        loop {
            self.turn += 1;

            let Some(column) = read_move(&mut lines, out, &self.board).await? else {
                return Ok(Outcome::Abandoned);
            };
            if let Some(outcome) = self.apply(Player::Opponent, column)? {
                return self.finish(outcome, out);
            }

            let Some(decision) = cpu.choose(&self.board).await? else {
                return self.finish(Outcome::Draw, out);
            };
            debug!(
                "turn {}: cpu plays {} ({:.3})",
                self.turn,
                decision.column,
                decision.best_score()
            );
            let outcome = self.apply(Player::Cpu, decision.column)?;

            writeln!(out, "{}", format_scores(&decision.scores))?;
            write_board(out, &self.board, self.color)?;

            if let Some(outcome) = outcome {
                return self.finish(outcome, out);
            }
        }
    }

    fn apply(&mut self, player: Player, column: usize) -> anyhow::Result<Option<Outcome>> {
        anyhow::ensure!(
            self.board.place(column, player),
            "{} cannot play column {}",
            player,
            column
        );
        self.history.push((player, column));

        if let Some(winner) = self.board.detect_win(column) {
            return Ok(Some(Outcome::Won(winner)));
        }
        if self.board.is_full() {
            return Ok(Some(Outcome::Draw));
        }
        Ok(None)
    }

    fn finish<W: Write>(&self, outcome: Outcome, out: &mut W) -> anyhow::Result<Outcome> {
        match outcome {
            Outcome::Won(Player::Opponent) => {
                write_board(out, &self.board, self.color)?;
                writeln!(out, "You win!")?;
            }
            Outcome::Won(Player::Cpu) => writeln!(out, "CPU wins!")?,
            Outcome::Draw => writeln!(out, "Draw.")?,
            Outcome::Abandoned => {}
        }
        Ok(outcome)
    }
}
