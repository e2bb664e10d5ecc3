use clap::Parser;
use ledger_core::{
    constants::{DEFAULT_DIFFICULTY, DEFAULT_MINING_REWARD, HASH_HEX_SIZE},
    LedgerConfig,
};
use std::time::Duration;

use crate::constants::{DEFAULT_LISTEN, DEFAULT_NODE_ADDRESS, DEFAULT_PEER_TIMEOUT_SECS};

#[derive(Parser, Debug, Clone)]
#[command(name = "ledger-node")]
#[command(about = "Proof-of-work ledger node")]
pub struct Args {
    /// Address to listen on, e.g. 127.0.0.1:8000
    #[arg(long, env = "LISTEN", default_value = DEFAULT_LISTEN)]
    pub listen: String,

    /// Identity credited with mining rewards
    #[arg(long, env = "NODE_ADDRESS", default_value = DEFAULT_NODE_ADDRESS)]
    pub node_address: String,

    /// Required leading zero hex digits in block hashes, at most the digest length
    #[arg(
        long,
        env = "DIFFICULTY",
        default_value_t = DEFAULT_DIFFICULTY,
        value_parser = clap::value_parser!(u32).range(0..=HASH_HEX_SIZE as i64)
    )]
    pub difficulty: u32,

    /// Amount minted to the miner of each block
    #[arg(long, env = "MINING_REWARD", default_value_t = DEFAULT_MINING_REWARD)]
    pub mining_reward: f64,

    /// Peer to register at startup (host:port); repeatable
    #[arg(long = "peer")]
    pub peers: Vec<String>,

    /// Per-request timeout for calls to peers, in seconds
    #[arg(long, env = "PEER_TIMEOUT_SECS", default_value_t = DEFAULT_PEER_TIMEOUT_SECS)]
    pub peer_timeout_secs: u64,
}

impl Args {
    pub fn ledger_config(&self) -> LedgerConfig {
        LedgerConfig {
            difficulty: self.difficulty,
            mining_reward: self.mining_reward,
        }
    }

    pub fn peer_timeout(&self) -> Duration {
        Duration::from_secs(self.peer_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let args = Args::parse_from(["ledger-node"]);
        assert_eq!(args.ledger_config(), LedgerConfig::default());
        assert_eq!(args.peer_timeout(), Duration::from_secs(5));
        assert!(args.peers.is_empty());
    }

    #[test]
    fn repeated_peers() {
        let args = Args::parse_from([
            "ledger-node",
            "--difficulty",
            "2",
            "--peer",
            "127.0.0.1:8001",
            "--peer",
            "127.0.0.1:8002",
        ]);
        assert_eq!(args.difficulty, 2);
        assert_eq!(args.peers, vec!["127.0.0.1:8001", "127.0.0.1:8002"]);
    }

    #[test]
    fn difficulty_is_bounded_by_digest_length() {
        let args = Args::parse_from(["ledger-node", "--difficulty", "64"]);
        assert_eq!(args.difficulty, HASH_HEX_SIZE as u32);

        let err = Args::try_parse_from(["ledger-node", "--difficulty", "65"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }
}
