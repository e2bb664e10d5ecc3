use serde::Serialize;
use std::collections::BTreeMap;

use crate::block::Block;
use crate::transaction::Transaction;

/// Balance per identity, derived by replaying chain transactions.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Balances(BTreeMap<String, f64>);

impl Balances {
    /// Replay every transaction of `chain` from genesis, in order.
    pub fn from_chain(chain: &[Block]) -> Self {
        let mut balances = Self::default();
        for block in chain {
            balances.apply_block(block);
        }
        balances
    }

    pub fn apply_block(&mut self, block: &Block) {
        for tx in block.transactions() {
            self.apply(tx);
        }
    }

    /// Debit the sender unless the transaction is a reward, credit the recipient.
    pub fn apply(&mut self, tx: &Transaction) {
        if !tx.is_coinbase() {
            *self.0.entry(tx.sender().to_string()).or_default() -= tx.amount();
        }
        *self.0.entry(tx.recipient().to_string()).or_default() += tx.amount();
    }

    /// Balance of `who`, zero if it never appeared on chain.
    pub fn get(&self, who: &str) -> f64 {
        self.0.get(who).copied().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &BTreeMap<String, f64> {
        &self.0
    }

    pub fn into_map(self) -> BTreeMap<String, f64> {
        self.0
    }
}
