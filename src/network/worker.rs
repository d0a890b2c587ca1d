use super::mailbox::WorkerMailbox;
use super::protocol::{NetMessage, TaskId, TaskOutcome};
use crate::core::Board;
use crate::logic::evaluate_task;
use log::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    AwaitingBoard,
    Requesting,
    AwaitingAssignment,
    Evaluating(TaskId),
    Terminated,
}

/// Evaluator role: scores the tasks the master hands out until `GameOver`.
pub struct Worker {
    mailbox: WorkerMailbox,
    state: WorkerState,
    board: Board,
    turn: u64,
    depth: u32,
    tasks_done: usize,
}

impl Worker {
    pub fn new(mailbox: WorkerMailbox) -> Self {
        Self {
            mailbox,
            state: WorkerState::AwaitingBoard,
            board: Board::default(),
            turn: 0,
            depth: 0,
            tasks_done: 0,
        }
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// Runs the state machine to completion and returns how many tasks this
    /// worker scored.
    pub async fn run(mut self) -> anyhow::Result<usize> {
        while self.state != WorkerState::Terminated {
            self.state = self.step().await?;
        }
        info!("worker done after {} tasks", self.tasks_done);
        Ok(self.tasks_done)
    }

    async fn step(&mut self) -> anyhow::Result<WorkerState> {
        match self.state {
            WorkerState::AwaitingBoard => Ok(match self.mailbox.recv().await {
                None => self.master_lost(),
                Some(NetMessage::GameOver) => WorkerState::Terminated,
                Some(NetMessage::BoardSync { turn, board, depth }) if turn > self.turn => {
                    self.adopt(turn, board, depth);
                    WorkerState::Requesting
                }
                Some(other) => {
                    debug!("ignoring {} while awaiting board", other.kind());
                    WorkerState::AwaitingBoard
                }
            }),
            WorkerState::Requesting => {
                self.mailbox.send(NetMessage::TaskRequest { turn: self.turn })?;
                Ok(WorkerState::AwaitingAssignment)
            }
            WorkerState::AwaitingAssignment => Ok(match self.mailbox.recv().await {
                None => self.master_lost(),
                Some(NetMessage::GameOver) => WorkerState::Terminated,
                Some(NetMessage::TaskAssignment { turn, task }) if turn == self.turn => {
                    WorkerState::Evaluating(task)
                }
                Some(NetMessage::WorkDone { turn }) if turn == self.turn => WorkerState::AwaitingBoard,
                // the master moved on while our request was in flight
                Some(NetMessage::BoardSync { turn, board, depth }) if turn > self.turn => {
                    self.adopt(turn, board, depth);
                    WorkerState::Requesting
                }
                Some(other) => {
                    debug!("ignoring stale {} (turn {:?})", other.kind(), other.turn());
                    WorkerState::AwaitingAssignment
                }
            }),
            WorkerState::Evaluating(task) => {
                let score = self.evaluate(task).await?;
                self.tasks_done += 1;
                self.mailbox.send(NetMessage::TaskResult {
                    turn: self.turn,
                    outcome: TaskOutcome { task, score },
                })?;
                Ok(WorkerState::Requesting)
            }
            WorkerState::Terminated => Ok(WorkerState::Terminated),
        }
    }

    fn adopt(&mut self, turn: u64, board: Board, depth: u32) {
        debug!("turn {}: board synced, depth {}", turn, depth);
        self.turn = turn;
        self.board = board;
        self.depth = depth;
    }

    fn master_lost(&self) -> WorkerState {
        warn!("master link closed, stopping");
        WorkerState::Terminated
    }

    /// Search runs on the blocking pool so in-process workers do not starve
    /// the runtime.
    async fn evaluate(&self, task: TaskId) -> anyhow::Result<f64> {
        let board = self.board.clone();
        let depth = self.depth;
        let score = tokio::task::spawn_blocking(move || {
            evaluate_task(&board, task.cpu_move, task.opponent_move, depth)
        })
        .await?;
        debug!("task {} = {}", task, score);
        Ok(score)
    }
}
