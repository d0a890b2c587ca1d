use crate::core::Board;
use crate::error::ProtocolError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

/// One (cpu move, opponent move) pair of the two-ply cross-product.
///
/// Encoded on the wire as `"<cpu>-<opponent>"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TaskId {
    pub cpu_move: usize,
    pub opponent_move: usize,
}

impl TaskId {
    pub fn new(cpu_move: usize, opponent_move: usize) -> Self {
        TaskId {
            cpu_move,
            opponent_move,
        }
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}-{}", self.cpu_move, self.opponent_move)
    }
}

impl FromStr for TaskId {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ProtocolError::InvalidTaskId {
            input: s.to_string(),
        };
        let (cpu, opponent) = s.split_once('-').ok_or_else(invalid)?;
        Ok(TaskId {
            cpu_move: cpu.parse().map_err(|_| invalid())?,
            opponent_move: opponent.parse().map_err(|_| invalid())?,
        })
    }
}

impl TryFrom<String> for TaskId {
    type Error = ProtocolError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<TaskId> for String {
    fn from(task: TaskId) -> Self {
        task.to_string()
    }
}

/// A finished task, encoded as `"<cpu>-<opponent>=<score>"`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TaskOutcome {
    pub task: TaskId,
    pub score: f64,
}

impl fmt::Display for TaskOutcome {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}={}", self.task, self.score)
    }
}

impl FromStr for TaskOutcome {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ProtocolError::InvalidOutcome {
            input: s.to_string(),
        };
        let (task, score) = s.split_once('=').ok_or_else(invalid)?;
        let task: TaskId = task.parse().map_err(|_| invalid())?;
        let score: f64 = score.parse().map_err(|_| invalid())?;
        if !(-1.0..=1.0).contains(&score) {
            return Err(ProtocolError::ScoreOutOfRange { score });
        }
        Ok(TaskOutcome { task, score })
    }
}

impl TryFrom<String> for TaskOutcome {
    type Error = ProtocolError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<TaskOutcome> for String {
    fn from(outcome: TaskOutcome) -> Self {
        outcome.to_string()
    }
}

/// Master/worker messages. Per-turn messages carry the turn number they
/// belong to so traffic that outlived its turn can be told apart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tag", content = "payload")]
pub enum NetMessage {
    // Master -> Worker
    BoardSync {
        turn: u64,
        board: Board,
        depth: u32,
    },
    TaskAssignment {
        turn: u64,
        task: TaskId,
    },
    WorkDone {
        turn: u64,
    },
    GameOver,

    // Worker -> Master
    TaskRequest {
        turn: u64,
    },
    TaskResult {
        turn: u64,
        outcome: TaskOutcome,
    },
}

impl NetMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            NetMessage::BoardSync { .. } => "BoardSync",
            NetMessage::TaskAssignment { .. } => "TaskAssignment",
            NetMessage::WorkDone { .. } => "WorkDone",
            NetMessage::GameOver => "GameOver",
            NetMessage::TaskRequest { .. } => "TaskRequest",
            NetMessage::TaskResult { .. } => "TaskResult",
        }
    }

    pub fn turn(&self) -> Option<u64> {
        match self {
            NetMessage::BoardSync { turn, .. }
            | NetMessage::TaskAssignment { turn, .. }
            | NetMessage::WorkDone { turn }
            | NetMessage::TaskRequest { turn }
            | NetMessage::TaskResult { turn, .. } => Some(*turn),
            NetMessage::GameOver => None,
        }
    }
}

async fn send_msg<W>(writer: &mut W, msg: &NetMessage) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let json = serde_json::to_string(msg)? + "\n";
    writer.write_all(json.as_bytes()).await?;
    Ok(())
}

/// Drains `rx` onto `writer`, one JSON message per line, until the channel
/// closes.
pub async fn write_loop<W>(mut writer: W, mut rx: mpsc::UnboundedReceiver<NetMessage>) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(msg) = rx.recv().await {
        let last = msg == NetMessage::GameOver;
        send_msg(&mut writer, &msg).await?;
        if last {
            break;
        }
    }
    writer.shutdown().await?;
    Ok(())
}

/// Parses JSON lines from `reader` and hands each message to `deliver` until
/// end of stream or until `deliver` returns false.
pub async fn read_loop<R, F>(reader: R, mut deliver: F) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    F: FnMut(NetMessage) -> bool,
{
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let msg: NetMessage = serde_json::from_str(&line)?;
        if !deliver(msg) {
            break;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Player;

    #[test]
    fn test_task_id_text_form() {
        let task = TaskId::new(3, 6);
        assert_eq!(task.to_string(), "3-6");
        assert_eq!("3-6".parse::<TaskId>().unwrap(), task);
        assert!("3".parse::<TaskId>().is_err());
        assert!("a-1".parse::<TaskId>().is_err());
        assert!("-1-2".parse::<TaskId>().is_err());
    }

    #[test]
    fn test_outcome_text_form() {
        let outcome = TaskOutcome {
            task: TaskId::new(0, 4),
            score: -0.25,
        };
        assert_eq!(outcome.to_string(), "0-4=-0.25");
        assert_eq!("0-4=-0.25".parse::<TaskOutcome>().unwrap(), outcome);
        assert_eq!("2-2=1".parse::<TaskOutcome>().unwrap().score, 1.0);
        assert!(matches!(
            "2-2=1.5".parse::<TaskOutcome>(),
            Err(ProtocolError::ScoreOutOfRange { .. })
        ));
        assert!(matches!(
            "2-2".parse::<TaskOutcome>(),
            Err(ProtocolError::InvalidOutcome { .. })
        ));
    }

    #[test]
    fn test_envelope_shape() {
        let msg = NetMessage::TaskResult {
            turn: 2,
            outcome: TaskOutcome {
                task: TaskId::new(1, 5),
                score: 0.5,
            },
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["tag"], "TaskResult");
        assert_eq!(json["payload"]["outcome"], "1-5=0.5");
        assert_eq!(json["payload"]["turn"], 2);

        let over = serde_json::to_string(&NetMessage::GameOver).unwrap();
        assert_eq!(over, r#"{"tag":"GameOver"}"#);
    }

    #[test]
    fn test_board_sync_carries_rows() {
        let mut board = Board::new(4, 2);
        board.place(0, Player::Cpu);
        let msg = NetMessage::BoardSync {
            turn: 1,
            board: board.clone(),
            depth: 6,
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""board":["====","C==="]"#));
        let back: NetMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
        assert_eq!(back.turn(), Some(1));
        assert_eq!(back.kind(), "BoardSync");
    }

    #[tokio::test]
    async fn test_line_codec_over_pipe() {
        let (client, server) = tokio::io::duplex(1024);
        let (tx, rx) = mpsc::unbounded_channel();
        let writer = tokio::spawn(write_loop(client, rx));

        tx.send(NetMessage::TaskRequest { turn: 4 }).unwrap();
        tx.send(NetMessage::WorkDone { turn: 4 }).unwrap();
        tx.send(NetMessage::GameOver).unwrap();

        let mut received = Vec::new();
        read_loop(tokio::io::BufReader::new(server), |msg| {
            received.push(msg);
            true
        })
        .await
        .unwrap();
        writer.await.unwrap().unwrap();

        assert_eq!(
            received,
            vec![
                NetMessage::TaskRequest { turn: 4 },
                NetMessage::WorkDone { turn: 4 },
                NetMessage::GameOver,
            ]
        );
    }
}
