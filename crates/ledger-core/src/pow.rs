use std::sync::atomic::{AtomicBool, Ordering};

use crate::block::{hash_fields, Block};
use crate::transaction::Transaction;

/// Nonces tried between checks of the cancel flag.
const CANCEL_POLL_INTERVAL: u64 = 1024;

/// Block under construction by the miner. Its nonce and hash change on every
/// attempt; [`CandidateBlock::seal`] turns it into an immutable [`Block`].
#[derive(Debug, Clone)]
pub struct CandidateBlock {
    index: u64,
    timestamp: f64,
    transactions: Vec<Transaction>,
    previous_hash: String,
    nonce: u64,
    hash: String,
}

impl CandidateBlock {
    pub fn new(
        index: u64,
        timestamp: f64,
        transactions: Vec<Transaction>,
        previous_hash: impl Into<String>,
    ) -> Self {
        let previous_hash = previous_hash.into();
        let hash = hash_fields(index, timestamp, &transactions, &previous_hash, 0);
        Self {
            index,
            timestamp,
            transactions,
            previous_hash,
            nonce: 0,
            hash,
        }
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// Advance the nonce by one and rehash.
    pub fn next_nonce(&mut self) {
        self.nonce = self.nonce.wrapping_add(1);
        self.hash = hash_fields(
            self.index,
            self.timestamp,
            &self.transactions,
            &self.previous_hash,
            self.nonce,
        );
    }

    pub fn seal(self) -> Block {
        Block {
            index: self.index,
            timestamp: self.timestamp,
            transactions: self.transactions,
            previous_hash: self.previous_hash,
            nonce: self.nonce,
            hash: self.hash,
        }
    }
}

/// Count of leading `0` characters in a hex digest.
pub fn count_leading_zero_digits(hash: &str) -> u32 {
    hash.bytes().take_while(|b| *b == b'0').count() as u32
}

pub fn meets_difficulty(hash: &str, difficulty: u32) -> bool {
    count_leading_zero_digits(hash) >= difficulty
}

/// Search nonces from the candidate's current value upward, one at a time,
/// until the hash has at least `difficulty` leading zero hex digits.
pub fn mine_block(mut candidate: CandidateBlock, difficulty: u32) -> Block {
    while !meets_difficulty(&candidate.hash, difficulty) {
        candidate.next_nonce();
    }
    candidate.seal()
}

/// Same search as [`mine_block`], but gives up and returns `None` once
/// `cancel` is set. The flag is polled every few hundred nonces.
pub fn mine_block_until(
    mut candidate: CandidateBlock,
    difficulty: u32,
    cancel: &AtomicBool,
) -> Option<Block> {
    let mut attempts: u64 = 0;
    while !meets_difficulty(&candidate.hash, difficulty) {
        if attempts % CANCEL_POLL_INTERVAL == 0 && cancel.load(Ordering::Relaxed) {
            return None;
        }
        candidate.next_nonce();
        attempts += 1;
    }
    Some(candidate.seal())
}
