use super::mailbox::{Inbound, MasterMailbox, WorkerId};
use super::protocol::{NetMessage, TaskId, TaskOutcome};
use super::registry::{Recorded, TaskRegistry};
use crate::core::{Board, Player};
use crate::logic::{evaluate_task, ColumnScore, Decision};
use log::{debug, info, warn};
use rayon::prelude::*;
use std::time::{Duration, Instant};

/// Plies the master plays itself (the CPU move and the opponent reply) before
/// handing the rest of the depth to a worker.
const TASK_PLIES: u32 = 2;

const MIN_POLL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MasterConfig {
    pub max_depth: u32,
    /// Requeue a task whose worker has not answered within this long.
    pub task_timeout: Option<Duration>,
}

/// Bookkeeping for the last finished turn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TurnStats {
    pub turn: u64,
    pub tasks_created: usize,
    pub tasks_completed: usize,
    pub requeued: usize,
    pub evaluated_locally: usize,
    pub ignored_messages: usize,
}

/// Coordinator role: fans the two-ply cross-product out to the workers and
/// turns their scores into a move.
pub struct Master {
    mailbox: MasterMailbox,
    config: MasterConfig,
    turn: u64,
    last_stats: TurnStats,
}

/// State of one decision turn.
struct TurnState<'a> {
    board: &'a Board,
    registry: TaskRegistry,
    /// Workers that asked for work after the cross-product ran out.
    parked: Vec<WorkerId>,
    stats: TurnStats,
}

impl Master {
    pub fn new(mailbox: MasterMailbox, config: MasterConfig) -> Self {
        Self {
            mailbox,
            config,
            turn: 0,
            last_stats: TurnStats::default(),
        }
    }

    pub fn worker_count(&self) -> usize {
        self.mailbox.worker_count()
    }

    pub fn last_stats(&self) -> TurnStats {
        self.last_stats
    }

    fn task_depth(&self) -> u32 {
        self.config.max_depth.saturating_sub(TASK_PLIES)
    }

    /// Runs one distributed decision for the CPU. `None` if the CPU has no
    /// legal column.
    pub async fn decide(&mut self, board: &Board) -> anyhow::Result<Option<Decision>> {
        if board.legal_columns().is_empty() {
            return Ok(None);
        }

        self.turn += 1;
        let started = Instant::now();
        info!(
            "turn {}: distributing {} tasks to {} workers",
            self.turn,
            board.width() * board.width(),
            self.mailbox.worker_count()
        );

        self.mailbox.broadcast(NetMessage::BoardSync {
            turn: self.turn,
            board: board.clone(),
            depth: self.task_depth(),
        });

        let mut state = TurnState {
            board,
            registry: TaskRegistry::new(board.width()),
            parked: Vec::new(),
            stats: TurnStats {
                turn: self.turn,
                ..TurnStats::default()
            },
        };

        while !state.registry.is_complete() {
            if self.mailbox.worker_count() == 0 {
                self.finish_locally(&mut state);
                break;
            }

            let event = match self.config.task_timeout {
                Some(limit) => {
                    match tokio::time::timeout(limit.max(MIN_POLL), self.mailbox.recv()).await {
                        Ok(event) => event,
                        Err(_) => {
                            self.requeue_to_parked(&mut state);
                            continue;
                        }
                    }
                }
                None => self.mailbox.recv().await,
            };

            match event {
                // every link closed; the next pass finishes locally
                None => continue,
                Some(Inbound::Disconnected(worker)) => self.on_disconnect(&mut state, worker),
                Some(Inbound::Message(worker, msg)) => self.on_message(&mut state, worker, msg),
            }
        }

        // barrier: nothing is aggregated until every task has a score
        self.mailbox
            .broadcast(NetMessage::WorkDone { turn: self.turn });

        state.stats.tasks_created = state.registry.created();
        state.stats.tasks_completed = state.registry.completed();
        self.last_stats = state.stats;

        let scores = aggregate(board, &state.registry);
        let decision = Decision::select(scores);
        info!(
            "turn {}: done in {:.2?}, chose {:?}",
            self.turn,
            started.elapsed(),
            decision.as_ref().map(|d| d.column)
        );
        Ok(decision)
    }

    /// Tells every worker to stop for good.
    pub fn game_over(&mut self) {
        info!("broadcasting game over to {} workers", self.mailbox.worker_count());
        self.mailbox.broadcast(NetMessage::GameOver);
    }

    fn on_message(&mut self, state: &mut TurnState, worker: WorkerId, msg: NetMessage) {
        match msg {
            NetMessage::TaskRequest { turn } if turn == self.turn => self.assign(state, worker),
            NetMessage::TaskResult { turn, outcome } if turn == self.turn => {
                self.record(state, worker, outcome)
            }
            NetMessage::TaskRequest { .. } | NetMessage::TaskResult { .. } => {
                debug!(
                    "dropping stale {} from worker {} (turn {:?}, now {})",
                    msg.kind(),
                    worker,
                    msg.turn(),
                    self.turn
                );
                state.stats.ignored_messages += 1;
            }
            other => {
                warn!("unexpected {} from worker {}", other.kind(), worker);
                state.stats.ignored_messages += 1;
            }
        }
    }

    fn assign(&mut self, state: &mut TurnState, worker: WorkerId) {
        let now = Instant::now();
        let task = match state.registry.issue_next(worker, now) {
            Some(task) => Some(task),
            None => {
                let requeued = state
                    .registry
                    .reissue(worker, now, self.config.task_timeout);
                if let Some(task) = requeued {
                    warn!("requeueing task {} to worker {}", task, worker);
                    state.stats.requeued += 1;
                }
                requeued
            }
        };

        match task {
            Some(task) => self.send_task(state, worker, task),
            // cross-product exhausted: wait here for a requeue or the barrier
            None => state.parked.push(worker),
        }
    }

    fn send_task(&mut self, state: &mut TurnState, worker: WorkerId, task: TaskId) {
        debug!("task {} -> worker {}", task, worker);
        let sent = self.mailbox.send(
            worker,
            NetMessage::TaskAssignment {
                turn: self.turn,
                task,
            },
        );
        if !sent {
            state.registry.release(worker);
        }
    }

    fn record(&mut self, state: &mut TurnState, worker: WorkerId, outcome: TaskOutcome) {
        match state.registry.record(outcome.task, outcome.score) {
            Recorded::Stored => debug!(
                "worker {}: {} ({}/{})",
                worker,
                outcome,
                state.registry.completed(),
                state.registry.total()
            ),
            Recorded::Duplicate => {
                debug!("duplicate result {} from worker {}", outcome, worker);
                state.stats.ignored_messages += 1;
            }
            Recorded::NeverIssued => {
                warn!("result for unissued task {} from worker {}", outcome.task, worker);
                state.stats.ignored_messages += 1;
            }
        }
    }

    fn on_disconnect(&mut self, state: &mut TurnState, worker: WorkerId) {
        self.mailbox.remove(worker);
        state.parked.retain(|&w| w != worker);
        let released = state.registry.release(worker);
        warn!(
            "worker {} disconnected, {} task(s) released, {} workers left",
            worker,
            released,
            self.mailbox.worker_count()
        );
        if released > 0 {
            self.requeue_to_parked(state);
        }
    }

    /// Gives orphaned or overdue tasks to workers that are waiting for work.
    fn requeue_to_parked(&mut self, state: &mut TurnState) {
        while !state.parked.is_empty() {
            let worker = state.parked[0];
            let Some(task) = state
                .registry
                .reissue(worker, Instant::now(), self.config.task_timeout)
            else {
                break;
            };
            state.parked.remove(0);
            warn!("requeueing task {} to idle worker {}", task, worker);
            state.stats.requeued += 1;
            self.send_task(state, worker, task);
        }
    }

    /// No workers left: score whatever is missing on this process.
    fn finish_locally(&mut self, state: &mut TurnState) {
        let outstanding = state.registry.outstanding();
        warn!(
            "no workers left, evaluating {} task(s) locally",
            outstanding.len()
        );
        let board = state.board;
        let depth = self.task_depth();
        let scored: Vec<(TaskId, f64)> = outstanding
            .par_iter()
            .map(|&task| {
                (
                    task,
                    evaluate_task(board, task.cpu_move, task.opponent_move, depth),
                )
            })
            .collect();

        let now = Instant::now();
        for (task, score) in scored {
            state.registry.complete_locally(task, score, now);
        }
        state.stats.evaluated_locally += outstanding.len();
    }
}

/// Folds task scores into one score per legal CPU column.
///
/// A column averages the tasks whose opponent reply is legal after the CPU
/// move; illegal replies count in neither sum nor denominator. Any reply that
/// wins for the opponent forces the column to -1. A CPU move that wins on the
/// spot scores 1, and a move that leaves no legal reply scores 0.
pub fn aggregate(board: &Board, registry: &TaskRegistry) -> Vec<ColumnScore> {
    let mut scratch = board.clone();
    let mut scores = Vec::new();

    for cpu_move in 0..board.width() {
        let Some(after) = scratch.play(cpu_move, Player::Cpu) else {
            continue;
        };

        let score = if after.detect_win(cpu_move) == Some(Player::Cpu) {
            1.0
        } else {
            let mut sum = 0.0;
            let mut replies = 0usize;
            let mut forced_loss = false;
            for opponent_move in 0..after.width() {
                if !after.is_legal(opponent_move) {
                    continue;
                }
                replies += 1;
                let task_score = registry
                    .score(TaskId::new(cpu_move, opponent_move))
                    .unwrap_or(0.0);
                if task_score == -1.0 {
                    forced_loss = true;
                    break;
                }
                sum += task_score;
            }

            if forced_loss {
                -1.0
            } else if replies == 0 {
                0.0
            } else {
                sum / replies as f64
            }
        };

        scores.push(ColumnScore {
            column: cpu_move,
            score,
        });
    }
    scores
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::mailbox::{local_cluster, WorkerMailbox};
    use crate::network::worker::Worker;

    fn config(max_depth: u32) -> MasterConfig {
        MasterConfig {
            max_depth,
            task_timeout: None,
        }
    }

    fn spawn_workers(mailboxes: Vec<WorkerMailbox>) -> Vec<tokio::task::JoinHandle<anyhow::Result<usize>>> {
        mailboxes
            .into_iter()
            .map(|mb| tokio::spawn(Worker::new(mb).run()))
            .collect()
    }

    fn threat_board() -> Board {
        // opponent has three stacked in column 0 with the cell above open
        Board::from_rows(&[
            "=======", "=======", "=======", "=======", "P======", "P=====C", "P=C===C",
        ])
        .unwrap()
    }

    fn filled_registry(width: usize, score: impl Fn(TaskId) -> f64) -> TaskRegistry {
        let mut registry = TaskRegistry::new(width);
        let now = Instant::now();
        while let Some(task) = registry.issue_next(0, now) {
            registry.record(task, score(task));
        }
        registry
    }

    #[test]
    fn test_aggregate_divides_by_legal_replies() {
        // column 6 has one open cell: after the CPU fills it, reply 6 is illegal
        let board = Board::from_rows(&[
            "=======", "======P", "======C", "======P", "======C", "======P", "======C",
        ])
        .unwrap();
        let registry = filled_registry(7, |task| {
            if task.cpu_move == 6 && task.opponent_move == 6 {
                0.0
            } else {
                0.6
            }
        });

        let scores = aggregate(&board, &registry);
        assert_eq!(scores.len(), 7);
        for s in &scores {
            assert!((s.score - 0.6).abs() < 1e-12, "{:?}", s);
        }
    }

    #[test]
    fn test_aggregate_forces_minus_one_and_skips_illegal_columns() {
        let board = Board::from_rows(&["P==", "C==", "P=="]).unwrap();
        let registry = filled_registry(3, |task| match (task.cpu_move, task.opponent_move) {
            (1, 2) => -1.0,
            (1, _) => 1.0,
            (2, _) => 0.3,
            _ => 0.9,
        });

        let scores = aggregate(&board, &registry);
        assert_eq!(
            scores,
            vec![
                ColumnScore { column: 1, score: -1.0 },
                ColumnScore { column: 2, score: 0.3 },
            ]
        );
        assert_eq!(Decision::select(scores).unwrap().column, 2);
    }

    #[test]
    fn test_aggregate_without_any_legal_reply_is_neutral() {
        // one open cell left; the CPU move fills the board
        let board = Board::from_rows(&["CP=", "PCP", "CPC"]).unwrap();
        let registry = filled_registry(3, |_| 0.0);
        assert_eq!(
            aggregate(&board, &registry),
            vec![ColumnScore { column: 2, score: 0.0 }]
        );
    }

    #[tokio::test]
    async fn test_creates_full_cross_product_per_turn() {
        let (mailbox, workers) = local_cluster(3);
        let handles = spawn_workers(workers);
        let mut master = Master::new(mailbox, config(3));

        let mut board = Board::default();
        let decision = master.decide(&board).await.unwrap().unwrap();
        assert!(decision.column < 7);
        assert_eq!(decision.scores.len(), 7);
        let stats = master.last_stats();
        assert_eq!(stats.tasks_created, 49);
        assert_eq!(stats.tasks_completed, 49);
        assert_eq!(stats.evaluated_locally, 0);

        // a second turn on the same cluster
        board.place(decision.column, Player::Cpu);
        board.place(3, Player::Opponent);
        let second = master.decide(&board).await.unwrap().unwrap();
        assert!(board.is_legal(second.column));
        assert_eq!(master.last_stats().turn, 2);
        assert_eq!(master.last_stats().tasks_created, 49);

        master.game_over();
        let mut done = 0;
        for handle in handles {
            done += handle.await.unwrap().unwrap();
        }
        assert_eq!(done, 98);
    }

    #[tokio::test]
    async fn test_opponent_threat_forces_block() {
        let (mailbox, workers) = local_cluster(2);
        let handles = spawn_workers(workers);
        let mut master = Master::new(mailbox, config(3));

        let board = threat_board();
        let decision = master.decide(&board).await.unwrap().unwrap();
        assert_eq!(decision.column, 0);
        for s in &decision.scores {
            if s.column != 0 {
                assert_eq!(s.score, -1.0, "column {} should lose", s.column);
            }
        }

        master.game_over();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
    }

    #[tokio::test]
    async fn test_requeues_tasks_of_disconnected_worker() {
        let (mailbox, mut workers) = local_cluster(2);
        let mut flaky = workers.pop().unwrap();
        let (assigned_tx, assigned_rx) = tokio::sync::oneshot::channel::<()>();

        // takes the first task, then vanishes without answering
        let flaky_handle = tokio::spawn(async move {
            let Some(NetMessage::BoardSync { turn, .. }) = flaky.recv().await else {
                panic!("expected board sync");
            };
            flaky.send(NetMessage::TaskRequest { turn }).unwrap();
            let assigned = flaky.recv().await;
            assert_eq!(
                assigned,
                Some(NetMessage::TaskAssignment {
                    turn,
                    task: TaskId::new(0, 0)
                })
            );
            assigned_tx.send(()).unwrap();
        });
        // the healthy worker only starts once the flaky one holds a task
        let healthy = tokio::spawn(async move {
            assigned_rx.await.unwrap();
            spawn_workers(workers)
        });

        let mut master = Master::new(mailbox, config(3));
        let decision = master.decide(&Board::default()).await.unwrap();
        flaky_handle.await.unwrap();
        let handles = healthy.await.unwrap();

        assert!(decision.is_some());
        let stats = master.last_stats();
        assert_eq!(stats.tasks_completed, 49);
        assert_eq!(master.worker_count(), 1);

        master.game_over();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
    }

    #[tokio::test]
    async fn test_requeues_overdue_task_after_timeout() {
        let (mailbox, mut workers) = local_cluster(2);
        let mut stalled = workers.pop().unwrap();
        let (assigned_tx, assigned_rx) = tokio::sync::oneshot::channel::<()>();
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();

        // keeps its mailbox open but never reports back
        let stalled_handle = tokio::spawn(async move {
            let Some(NetMessage::BoardSync { turn, .. }) = stalled.recv().await else {
                panic!("expected board sync");
            };
            stalled.send(NetMessage::TaskRequest { turn }).unwrap();
            let assigned = stalled.recv().await;
            assert!(matches!(assigned, Some(NetMessage::TaskAssignment { .. })));
            assigned_tx.send(()).unwrap();
            let _ = release_rx.await;
        });
        let healthy = tokio::spawn(async move {
            assigned_rx.await.unwrap();
            spawn_workers(workers)
        });

        let mut master = Master::new(
            mailbox,
            MasterConfig {
                max_depth: 3,
                task_timeout: Some(Duration::from_millis(50)),
            },
        );
        let decision = master.decide(&Board::default()).await.unwrap();
        let handles = healthy.await.unwrap();
        assert!(decision.is_some());
        let stats = master.last_stats();
        assert_eq!(stats.tasks_completed, 49);
        assert!(stats.requeued >= 1);

        release_tx.send(()).unwrap();
        stalled_handle.await.unwrap();
        master.game_over();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
    }

    #[tokio::test]
    async fn test_without_workers_master_scores_everything_itself() {
        let (mailbox, _) = local_cluster(0);
        let mut master = Master::new(mailbox, config(3));
        let decision = master.decide(&threat_board()).await.unwrap().unwrap();
        assert_eq!(decision.column, 0);
        assert_eq!(master.last_stats().evaluated_locally, 49);
        assert_eq!(master.last_stats().tasks_completed, 49);
    }

    #[tokio::test]
    async fn test_no_legal_column_means_no_decision() {
        let (mailbox, _) = local_cluster(0);
        let mut master = Master::new(mailbox, config(3));
        let full = Board::from_rows(&["CPC", "PCP", "CPC"]).unwrap();
        assert_eq!(master.decide(&full).await.unwrap(), None);
    }
}
