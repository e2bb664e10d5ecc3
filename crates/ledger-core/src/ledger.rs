use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

use crate::balances::Balances;
use crate::block::Block;
use crate::config::LedgerConfig;
use crate::error::{BlockRejection, LedgerError, Result};
use crate::pow::{self, CandidateBlock};
use crate::transaction::{now_secs, Transaction};

/// Full chain as exchanged between nodes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChainSnapshot {
    pub chain: Vec<Block>,
    pub length: usize,
    pub difficulty: u32,
    #[serde(default)]
    pub nodes: Vec<String>,
}

pub(crate) struct LedgerState {
    pub(crate) chain: Vec<Block>,
    pub(crate) mempool: Vec<Transaction>,
    pub(crate) peers: BTreeSet<String>,
    pub(crate) balances: Balances,
}

impl LedgerState {
    fn genesis() -> Self {
        Self {
            chain: vec![Block::genesis()],
            mempool: Vec::new(),
            peers: BTreeSet::new(),
            balances: Balances::default(),
        }
    }

    pub(crate) fn head(&self) -> &Block {
        // The chain is never empty: it starts at genesis and is only ever
        // replaced by a strictly longer one.
        &self.chain[self.chain.len() - 1]
    }

    pub(crate) fn recalculate_balances(&mut self) {
        self.balances = Balances::from_chain(&self.chain);
    }

    /// Pending transactions plus the reward, on top of the current head.
    fn candidate(&self, miner_address: &str, reward: f64) -> CandidateBlock {
        let mut transactions = self.mempool.clone();
        transactions.push(Transaction::coinbase(miner_address, reward));
        let head = self.head();
        CandidateBlock::new(head.index() + 1, now_secs(), transactions, head.hash())
    }

    fn append_mined(&mut self, block: &Block) {
        self.balances.apply_block(block);
        self.chain.push(block.clone());
        self.mempool.clear();
        info!(
            index = block.index(),
            nonce = block.nonce(),
            hash = block.hash(),
            txs = block.transactions().len(),
            "mined block"
        );
    }
}

/// The ledger engine: chain, mempool, peers and derived balances behind one lock.
///
/// Every operation takes the lock for its whole duration, so mining, chain
/// replacement and transaction intake never interleave.
pub struct Ledger {
    config: LedgerConfig,
    pub(crate) state: Mutex<LedgerState>,
    mining: AtomicBool,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new(LedgerConfig::default())
    }
}

impl Ledger {
    /// A ledger holding only the genesis block.
    pub fn new(config: LedgerConfig) -> Self {
        Self {
            config,
            state: Mutex::new(LedgerState::genesis()),
            mining: AtomicBool::new(false),
        }
    }

    /// Rebuild a ledger from a received snapshot. The snapshot's difficulty
    /// overrides the configured one; balances are replayed from the chain.
    pub fn from_snapshot(snapshot: ChainSnapshot, config: LedgerConfig) -> Self {
        let config = LedgerConfig {
            difficulty: snapshot.difficulty,
            ..config
        };
        let mut state = LedgerState {
            chain: snapshot.chain,
            mempool: Vec::new(),
            peers: snapshot.nodes.into_iter().collect(),
            balances: Balances::default(),
        };
        if state.chain.is_empty() {
            state.chain.push(Block::genesis());
        }
        state.recalculate_balances();
        Self {
            config,
            state: Mutex::new(state),
            mining: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> LedgerConfig {
        self.config
    }

    pub fn difficulty(&self) -> u32 {
        self.config.difficulty
    }

    pub fn mining_reward(&self) -> f64 {
        self.config.mining_reward
    }

    /// Queue a transaction for the next block.
    ///
    /// Reward transactions are accepted as-is. Any other transaction is
    /// refused when the sender's current balance is below its amount.
    pub fn add_transaction(&self, tx: Transaction) -> Result<()> {
        let mut state = self.state.lock();
        if !tx.is_coinbase() {
            let balance = state.balances.get(tx.sender());
            if balance < tx.amount() {
                return Err(LedgerError::InsufficientBalance {
                    sender: tx.sender().to_string(),
                    balance,
                    amount: tx.amount(),
                });
            }
        }
        debug!(txid = tx.txid(), sender = tx.sender(), "transaction queued");
        state.mempool.push(tx);
        Ok(())
    }

    /// Build, check and queue a transfer stamped with the current time.
    pub fn submit_transaction(
        &self,
        sender: impl Into<String>,
        recipient: impl Into<String>,
        amount: f64,
    ) -> Result<Transaction> {
        let tx = Transaction::new(sender, recipient, amount);
        self.add_transaction(tx.clone())?;
        Ok(tx)
    }

    /// Mine the pending transactions plus a reward to `miner_address` into a
    /// new block, append it and clear the mempool.
    ///
    /// Always produces a block, even with an empty mempool. The proof-of-work
    /// search runs under the ledger lock and cannot be interrupted.
    pub fn mine_block(&self, miner_address: &str) -> Block {
        let mut state = self.state.lock();
        let candidate = state.candidate(miner_address, self.config.mining_reward);

        self.mining.store(true, Ordering::SeqCst);
        let block = pow::mine_block(candidate, self.config.difficulty);
        self.mining.store(false, Ordering::SeqCst);

        state.append_mined(&block);
        block
    }

    /// Like [`Ledger::mine_block`], but stops searching once `cancel` is set.
    /// A cancelled search returns `None` and leaves chain, mempool and
    /// balances untouched.
    pub fn mine_block_until(&self, miner_address: &str, cancel: &AtomicBool) -> Option<Block> {
        let mut state = self.state.lock();
        let candidate = state.candidate(miner_address, self.config.mining_reward);

        self.mining.store(true, Ordering::SeqCst);
        let mined = pow::mine_block_until(candidate, self.config.difficulty, cancel);
        self.mining.store(false, Ordering::SeqCst);

        match mined {
            Some(block) => {
                state.append_mined(&block);
                Some(block)
            }
            None => {
                info!(pending = state.mempool.len(), "mining cancelled");
                None
            }
        }
    }

    /// True while a nonce search holds the ledger lock.
    pub fn is_mining(&self) -> bool {
        self.mining.load(Ordering::SeqCst)
    }

    /// Append a block mined elsewhere if it extends the current head and its
    /// hash matches its contents. Balances are replayed and the mempool is
    /// cleared on success; nothing changes on rejection.
    pub fn receive_block(&self, block: Block) -> Result<()> {
        let mut state = self.state.lock();
        let head = state.head();
        if !block.links_to(head) {
            return Err(BlockRejection::PreviousHashMismatch {
                expected: head.hash().to_string(),
                found: block.previous_hash().to_string(),
            }
            .into());
        }
        if !block.has_valid_hash() {
            return Err(BlockRejection::HashMismatch {
                index: block.index(),
            }
            .into());
        }

        info!(index = block.index(), hash = block.hash(), "accepted block");
        state.chain.push(block);
        state.recalculate_balances();
        state.mempool.clear();
        Ok(())
    }

    /// Rebuild the balance table from genesis.
    pub fn recalculate_balances(&self) {
        self.state.lock().recalculate_balances();
    }

    /// Add a peer address. Returns false if it was already known.
    pub fn register_peer(&self, address: impl Into<String>) -> bool {
        self.state.lock().peers.insert(address.into())
    }

    pub fn peers(&self) -> Vec<String> {
        self.state.lock().peers.iter().cloned().collect()
    }

    pub fn chain(&self) -> Vec<Block> {
        self.state.lock().chain.clone()
    }

    pub fn last_block(&self) -> Block {
        self.state.lock().head().clone()
    }

    pub fn len(&self) -> usize {
        self.state.lock().chain.len()
    }

    /// Never true: the chain always holds at least the genesis block.
    pub fn is_empty(&self) -> bool {
        self.state.lock().chain.is_empty()
    }

    pub fn mempool(&self) -> Vec<Transaction> {
        self.state.lock().mempool.clone()
    }

    pub fn balances(&self) -> BTreeMap<String, f64> {
        self.state.lock().balances.as_map().clone()
    }

    pub fn balance_of(&self, who: &str) -> f64 {
        self.state.lock().balances.get(who)
    }

    pub fn snapshot(&self) -> ChainSnapshot {
        let state = self.state.lock();
        ChainSnapshot {
            chain: state.chain.clone(),
            length: state.chain.len(),
            difficulty: self.config.difficulty,
            nodes: state.peers.iter().cloned().collect(),
        }
    }
}
