use crate::core::Board;
use crate::network::MasterConfig;
use log::warn;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "connect4_config.json";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub board: BoardConfig,
    pub search: SearchConfig,
    pub cluster: ClusterConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    pub width: usize,
    pub height: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// 全体の探索深さ (ワーカーは2手少ない深さで評価)
    pub max_depth: u32,
    pub task_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    pub listen: String,
    /// TCP workers the master waits for before the game starts
    pub workers: usize,
    /// in-process workers spawned next to the master
    pub local_workers: usize,
    pub connect_attempts: u32,
}

impl Default for BoardConfig {
    fn default() -> Self {
        BoardConfig {
            width: crate::core::board::DEFAULT_WIDTH,
            height: crate::core::board::DEFAULT_HEIGHT,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            max_depth: 8,
            task_timeout_ms: Some(5_000),
        }
    }
}

impl Default for ClusterConfig {
    fn default() -> Self {
        ClusterConfig {
            listen: "127.0.0.1:7878".to_string(),
            workers: 0,
            local_workers: 0,
            connect_attempts: 20,
        }
    }
}

impl EngineConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let config_str = std::fs::read_to_string(path)?;
        let config: EngineConfig = serde_json::from_str(&config_str)?;
        config.validate()?;
        Ok(config)
    }

    /// A missing file silently yields the defaults; an unreadable one is
    /// reported and then ignored.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        Self::load(path).unwrap_or_else(|e| {
            warn!("ignoring {}: {:#}", path.display(), e);
            Self::default()
        })
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.board.width == 0 || self.board.height == 0 {
            anyhow::bail!(
                "board must be at least 1x1, got {}x{}",
                self.board.width,
                self.board.height
            );
        }
        Ok(())
    }

    pub fn new_board(&self) -> Board {
        Board::new(self.board.width, self.board.height)
    }

    pub fn master_config(&self) -> MasterConfig {
        MasterConfig {
            max_depth: self.search.max_depth,
            task_timeout: self.search.task_timeout_ms.map(Duration::from_millis),
        }
    }
}
