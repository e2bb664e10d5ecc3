use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_DIFFICULTY, DEFAULT_MINING_REWARD};

/// Static parameters fixed when a [`crate::Ledger`] is built.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Required number of leading `0` hex digits in a mined block hash.
    pub difficulty: u32,
    /// Amount credited to the miner by the reward transaction.
    pub mining_reward: f64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            difficulty: DEFAULT_DIFFICULTY,
            mining_reward: DEFAULT_MINING_REWARD,
        }
    }
}
