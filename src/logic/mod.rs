//! Position scoring.
//!
//! Scores live in [-1, 1]: 1 is a forced CPU win, -1 a forced opponent win,
//! 0 is both "unknown at this depth" and a drawn (full) board. Between the
//! forced-win shortcuts, sibling scores are averaged, i.e. both sides are
//! treated as picking uniformly among their replies.

use crate::core::{Board, Player};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Scores `board` after `last_mover` dropped a piece into `last_column`.
pub fn evaluate(board: &mut Board, last_mover: Player, last_column: usize, depth: u32) -> f64 {
    // 終局判定は深さ制限より先
    if let Some(winner) = board.detect_win(last_column) {
        return winner.win_score();
    }
    if depth == 0 {
        return 0.0;
    }

    let mover = last_mover.opponent();
    let mut sum = 0.0;
    let mut count = 0usize;
    let mut all_cpu_wins = true;
    let mut all_opponent_wins = true;

    for column in 0..board.width() {
        let Some(mut child) = board.play(column, mover) else {
            continue;
        };
        let score = evaluate(&mut child, mover, column, depth - 1);

        if score > -1.0 {
            all_opponent_wins = false;
        }
        if score < 1.0 {
            all_cpu_wins = false;
        }
        // a side with a winning reply always takes it
        if mover == Player::Cpu && score >= 1.0 {
            return 1.0;
        }
        if mover == Player::Opponent && score <= -1.0 {
            return -1.0;
        }

        sum += score;
        count += 1;
    }

    if count == 0 {
        // full board, no line: draw
        return 0.0;
    }
    if all_cpu_wins {
        1.0
    } else if all_opponent_wins {
        -1.0
    } else {
        sum / count as f64
    }
}

/// Scores the two-ply line "CPU plays `cpu_move`, opponent answers
/// `opponent_move`" on a private copy of `board`.
///
/// An illegal move on either ply scores 0. Otherwise a CPU move that already
/// wins scores 1 whatever the reply.
pub fn evaluate_task(board: &Board, cpu_move: usize, opponent_move: usize, depth: u32) -> f64 {
    let mut snapshot = board.clone();
    if !snapshot.place(cpu_move, Player::Cpu) || !snapshot.is_legal(opponent_move) {
        return 0.0;
    }
    if snapshot.detect_win(cpu_move) == Some(Player::Cpu) {
        return 1.0;
    }
    snapshot.place(opponent_move, Player::Opponent);
    evaluate(&mut snapshot, Player::Opponent, opponent_move, depth)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColumnScore {
    pub column: usize,
    pub score: f64,
}

/// The CPU's chosen column together with the per-column scores behind it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub column: usize,
    pub scores: Vec<ColumnScore>,
}

impl Decision {
    /// Picks the strictly greatest score, scanning in column order, so ties
    /// keep the lowest column. `None` when there is nothing to choose from.
    pub fn select(scores: Vec<ColumnScore>) -> Option<Decision> {
        let mut best = *scores.first()?;
        for candidate in &scores[1..] {
            if candidate.score > best.score {
                best = *candidate;
            }
        }
        Some(Decision {
            column: best.column,
            scores,
        })
    }

    pub fn best_score(&self) -> f64 {
        self.scores
            .iter()
            .find(|s| s.column == self.column)
            .map(|s| s.score)
            .unwrap_or(0.0)
    }
}

/// Rounds to three decimals, folding -0.0 into 0.0.
pub fn round_score(score: f64) -> f64 {
    let rounded = (score * 1000.0).round() / 1000.0;
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

/// Single-process move choice.
///
/// Every legal column is scored with [`evaluate`] at `max_depth`. If the whole
/// search comes back at the neutral 0, the depth is halved and the search
/// repeated, down to depth 0. Columns are scored in parallel, each on its own
/// board snapshot.
pub fn solve_locally(board: &Board, max_depth: u32) -> Option<Decision> {
    let candidates = board.legal_columns();
    if candidates.is_empty() {
        return None;
    }

    let mut depth = max_depth;
    loop {
        let scores: Vec<ColumnScore> = candidates
            .par_iter()
            .map(|&column| {
                let mut snapshot = board.clone();
                snapshot.place(column, Player::Cpu);
                let score = evaluate(&mut snapshot, Player::Cpu, column, depth.saturating_sub(1));
                ColumnScore {
                    column,
                    score: round_score(score),
                }
            })
            .collect();
        log::debug!("local search at depth {}: {:?}", depth, scores);

        let saturated = scores.iter().all(|s| s.score == 0.0);
        depth /= 2;
        if !saturated || depth == 0 {
            return Decision::select(scores);
        }
    }
}
