use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Search settings for one engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Rollout workers; 1 runs rollouts on the calling thread
    pub parallelism: usize,
    pub seed: u64,
    /// Thinking time per move
    pub think_time_ms: u64,
    /// Stop thinking early after this many rollouts
    pub max_rollouts_per_move: Option<u32>,
}

impl EngineConfig {
    pub fn think_time(&self) -> Duration {
        Duration::from_millis(self.think_time_ms)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            parallelism: 1,
            seed: 0xA3A2_0105,
            think_time_ms: 15_000,
            max_rollouts_per_move: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    pub time_per_move_ms: u64,
    /// A game cannot outlast the 92 empty squares of the opening
    pub max_moves: usize,
}

impl MatchConfig {
    pub fn time_per_move(&self) -> Duration {
        Duration::from_millis(self.time_per_move_ms)
    }
}

impl Default for MatchConfig {
    fn default() -> Self {
        MatchConfig {
            time_per_move_ms: 30_000,
            max_moves: 92,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaConfig {
    pub engine: EngineConfig,
    #[serde(rename = "match")]
    pub match_config: MatchConfig,
}

impl ArenaConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }
}
