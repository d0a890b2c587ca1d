use crate::core::Board;
use crate::logic::{solve_locally, Decision};
use crate::network::Master;

/// CPUの思考方式
pub enum CpuPlayer {
    /// Searches on this process only.
    Local { max_depth: u32 },
    /// Fans the search out to a worker cluster.
    Cluster(Master),
}

impl CpuPlayer {
    pub fn name(&self) -> &str {
        match self {
            CpuPlayer::Local { .. } => "CPU (local)",
            CpuPlayer::Cluster(_) => "CPU (cluster)",
        }
    }

    /// `None` when the CPU has no legal column.
    pub async fn choose(&mut self, board: &Board) -> anyhow::Result<Option<Decision>> {
        match self {
            CpuPlayer::Local { max_depth } => {
                let snapshot = board.clone();
                let depth = *max_depth;
                let decision =
                    tokio::task::spawn_blocking(move || solve_locally(&snapshot, depth)).await?;
                Ok(decision)
            }
            CpuPlayer::Cluster(master) => master.decide(board).await,
        }
    }

    pub fn game_over(&mut self) {
        if let CpuPlayer::Cluster(master) = self {
            master.game_over();
        }
    }
}
