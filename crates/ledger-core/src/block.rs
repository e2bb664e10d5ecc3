use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::canonical;
use crate::constants::{GENESIS_PREVIOUS_HASH, GENESIS_TIMESTAMP};
use crate::transaction::{CanonicalTransaction, Transaction};

/// A sealed block. Fields are read-only outside the crate; the only way to
/// produce a block with a searched nonce is through [`crate::pow`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub(crate) index: u64,
    pub(crate) timestamp: f64,
    pub(crate) transactions: Vec<Transaction>,
    pub(crate) previous_hash: String,
    pub(crate) nonce: u64,
    pub(crate) hash: String,
}

/// Hashing form of a block. Fields are declared in sorted key order so the
/// encoding does not depend on map ordering.
#[derive(Serialize)]
struct CanonicalBlock<'a> {
    index: u64,
    nonce: u64,
    previous_hash: &'a str,
    timestamp: f64,
    transactions: Vec<CanonicalTransaction<'a>>,
}

/// SHA-256 hex digest of the canonical JSON encoding of the hashed fields.
///
/// See [`crate::canonical`] for the exact byte layout.
pub fn hash_fields(
    index: u64,
    timestamp: f64,
    transactions: &[Transaction],
    previous_hash: &str,
    nonce: u64,
) -> String {
    let canonical = CanonicalBlock {
        index,
        nonce,
        previous_hash,
        timestamp,
        transactions: transactions.iter().map(Transaction::canonical).collect(),
    };
    // Plain structs of strings and numbers always encode.
    let bytes = canonical::to_vec(&canonical).expect("canonical block encodes");
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    hex::encode(hasher.finalize())
}

impl Block {
    pub fn new(
        index: u64,
        timestamp: f64,
        transactions: Vec<Transaction>,
        previous_hash: impl Into<String>,
        nonce: u64,
    ) -> Self {
        let previous_hash = previous_hash.into();
        let hash = hash_fields(index, timestamp, &transactions, &previous_hash, nonce);
        Self {
            index,
            timestamp,
            transactions,
            previous_hash,
            nonce,
            hash,
        }
    }

    /// Fixed first block shared by every node.
    pub fn genesis() -> Self {
        Self::new(0, GENESIS_TIMESTAMP, Vec::new(), GENESIS_PREVIOUS_HASH, 0)
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn previous_hash(&self) -> &str {
        &self.previous_hash
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// Recompute the digest from the current fields.
    pub fn compute_hash(&self) -> String {
        hash_fields(
            self.index,
            self.timestamp,
            &self.transactions,
            &self.previous_hash,
            self.nonce,
        )
    }

    /// True when the stored hash matches the block's contents.
    pub fn has_valid_hash(&self) -> bool {
        self.hash == self.compute_hash()
    }

    /// True when this block's previous hash points at `parent`.
    pub fn links_to(&self, parent: &Block) -> bool {
        self.previous_hash == parent.hash
    }
}
