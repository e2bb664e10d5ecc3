//! Chain validation and longest-valid-chain fork resolution.

use rayon::prelude::*;
use std::fmt::Display;
use std::future::Future;
use tracing::{info, warn};

use crate::block::Block;
use crate::ledger::Ledger;

/// Check hash linkage and self-consistency of every block after genesis.
///
/// Transaction affordability is not re-checked. A chain of zero or one block
/// is valid.
pub fn validate_chain(chain: &[Block]) -> bool {
    chain
        .par_windows(2)
        .all(|pair| pair[1].links_to(&pair[0]) && pair[1].has_valid_hash())
}

/// Somewhere full chains can be fetched from, keyed by peer address.
pub trait ChainSource: Sync {
    type Error: Display + Send;

    fn fetch_chain(
        &self,
        peer: &str,
    ) -> impl Future<Output = Result<Vec<Block>, Self::Error>> + Send;
}

impl Ledger {
    /// Validate the chain currently held by this ledger.
    pub fn is_valid(&self) -> bool {
        validate_chain(&self.state.lock().chain)
    }

    /// Install `candidate` if it is strictly longer than the current chain and
    /// valid. Balances are replayed and the mempool is dropped on success.
    pub fn replace_chain(&self, candidate: Vec<Block>) -> bool {
        let mut state = self.state.lock();
        if candidate.len() <= state.chain.len() || !validate_chain(&candidate) {
            return false;
        }
        info!(
            from = state.chain.len(),
            to = candidate.len(),
            "replacing chain"
        );
        state.chain = candidate;
        state.recalculate_balances();
        state.mempool.clear();
        true
    }

    /// Ask every known peer for its chain and adopt the longest valid one that
    /// beats the local length. Peers that fail are logged and skipped.
    ///
    /// Fetching happens without holding the ledger lock.
    pub async fn resolve<S: ChainSource>(&self, source: &S) -> bool {
        match longest_valid_chain(source, &self.peers(), self.len()).await {
            Some(chain) => self.replace_chain(chain),
            None => false,
        }
    }
}

/// Fetch every peer's chain and return the longest valid one strictly longer
/// than `local_len`. Ties keep the first peer seen.
pub async fn longest_valid_chain<S: ChainSource>(
    source: &S,
    peers: &[String],
    local_len: usize,
) -> Option<Vec<Block>> {
    let mut best_len = local_len;
    let mut best = None;

    for peer in peers {
        let chain = match source.fetch_chain(peer).await {
            Ok(chain) => chain,
            Err(e) => {
                warn!(peer = %peer, "failed to fetch chain: {e}");
                continue;
            }
        };
        if chain.len() > best_len && validate_chain(&chain) {
            best_len = chain.len();
            best = Some(chain);
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LedgerConfig;
    use crate::transaction::Transaction;
    use std::collections::HashMap;

    fn ledger() -> Ledger {
        Ledger::new(LedgerConfig {
            difficulty: 1,
            mining_reward: 10.0,
        })
    }

    fn mined_chain(miner: &str, blocks: usize) -> Vec<Block> {
        let ledger = ledger();
        for _ in 0..blocks {
            ledger.mine_block(miner);
        }
        ledger.chain()
    }

    #[derive(Default)]
    struct StaticPeers(HashMap<String, Result<Vec<Block>, String>>);

    impl StaticPeers {
        fn with(mut self, peer: &str, chain: Result<Vec<Block>, String>) -> Self {
            self.0.insert(peer.to_string(), chain);
            self
        }
    }

    impl ChainSource for StaticPeers {
        type Error = String;

        async fn fetch_chain(&self, peer: &str) -> Result<Vec<Block>, String> {
            self.0
                .get(peer)
                .cloned()
                .unwrap_or_else(|| Err(format!("{peer} unreachable")))
        }
    }

    #[test]
    fn genesis_only_chain_is_valid() {
        assert!(validate_chain(&[Block::genesis()]));
        assert!(validate_chain(&[]));
        assert!(ledger().is_valid());
    }

    #[test]
    fn mined_chain_is_valid() {
        assert!(validate_chain(&mined_chain("M1", 4)));
    }

    #[test]
    fn tampered_previous_hash_is_invalid() {
        let mut chain = mined_chain("M1", 3);
        chain[2].previous_hash = "0".repeat(64);
        assert!(!validate_chain(&chain));
    }

    #[test]
    fn tampered_contents_are_invalid() {
        let mut chain = mined_chain("M1", 3);
        chain[1].nonce += 1;
        assert!(!validate_chain(&chain));
    }

    #[test]
    fn longer_valid_chain_replaces() {
        let local = ledger();
        local.mine_block("L");
        local.add_transaction(Transaction::coinbase("p", 1.0)).unwrap();

        let remote = mined_chain("R", 3);
        assert!(local.replace_chain(remote.clone()));
        assert_eq!(local.chain(), remote);
        assert_eq!(local.balance_of("R"), 30.0);
        assert_eq!(local.balance_of("L"), 0.0);
        assert!(local.mempool().is_empty());
    }

    #[test]
    fn equal_length_never_replaces() {
        let a = ledger();
        let b = ledger();
        a.mine_block("A");
        b.mine_block("B");
        let chain_a = a.chain();
        let chain_b = b.chain();
        assert!(!a.replace_chain(chain_b.clone()));
        assert!(!b.replace_chain(chain_a.clone()));
        assert_eq!(a.chain(), chain_a);
        assert_eq!(b.chain(), chain_b);
    }

    #[test]
    fn shorter_chain_never_replaces() {
        let local = ledger();
        local.mine_block("L");
        local.mine_block("L");
        assert!(!local.replace_chain(mined_chain("R", 1)));
        assert_eq!(local.len(), 3);
    }

    #[test]
    fn invalid_longer_chain_never_replaces() {
        let local = ledger();
        let mut remote = mined_chain("R", 5);
        remote[3].previous_hash = "bad".into();
        assert!(!local.replace_chain(remote));
        assert_eq!(local.len(), 1);
        assert!(local.balances().is_empty());
    }

    #[tokio::test]
    async fn resolve_adopts_longest_valid_peer_chain() {
        let local = ledger();
        local.mine_block("L");
        for peer in ["a", "b", "c", "d"] {
            local.register_peer(peer);
        }

        let longest = mined_chain("B", 4);
        let mut forged = mined_chain("C", 6);
        forged[2].nonce += 1;
        let peers = StaticPeers::default()
            .with("a", Ok(mined_chain("A", 2)))
            .with("b", Ok(longest.clone()))
            .with("c", Ok(forged))
            .with("d", Err("connection refused".into()));

        assert!(local.resolve(&peers).await);
        assert_eq!(local.chain(), longest);
        assert_eq!(local.balance_of("B"), 40.0);
    }

    #[tokio::test]
    async fn resolve_keeps_local_chain_on_tie() {
        let local = ledger();
        local.mine_block("L");
        local.register_peer("a");
        let peers = StaticPeers::default().with("a", Ok(mined_chain("A", 1)));

        assert!(!local.resolve(&peers).await);
        assert_eq!(local.last_block().transactions()[0].recipient(), "L");
    }

    #[tokio::test]
    async fn longest_valid_chain_needs_to_beat_local_length() {
        let peers = StaticPeers::default().with("a", Ok(mined_chain("A", 2)));
        let names = vec!["a".to_string()];
        assert!(longest_valid_chain(&peers, &names, 3).await.is_none());
        let chain = longest_valid_chain(&peers, &names, 2).await.unwrap();
        assert_eq!(chain.len(), 3);
    }

    #[tokio::test]
    async fn resolve_survives_unreachable_peers() {
        let local = ledger();
        local.register_peer("gone");
        local.register_peer("also-gone");
        assert!(!local.resolve(&StaticPeers::default()).await);
        assert_eq!(local.len(), 1);
        assert_eq!(local.peers().len(), 2);
    }
}
