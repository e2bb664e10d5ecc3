pub const HASH_SIZE: usize = 32;
pub const HASH_HEX_SIZE: usize = HASH_SIZE * 2;
/// Reserved sender label of reward transactions.
pub const MINING_SENDER: &str = "MINING";
pub const GENESIS_PREVIOUS_HASH: &str = "0";
pub const GENESIS_TIMESTAMP: f64 = 0.0;
pub const DEFAULT_DIFFICULTY: u32 = 4;
pub const DEFAULT_MINING_REWARD: f64 = 10.0;
