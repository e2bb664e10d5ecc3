use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::canonical::float_repr;
use crate::constants::MINING_SENDER;

/// Seconds since the unix epoch, with sub-second precision.
pub fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}

/// A value transfer between two identities.
///
/// The `txid` is derived from the other four fields, so two transfers with the
/// same sender, recipient, amount and timestamp share an id. It is advisory and
/// never used for deduplication.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawTransaction")]
pub struct Transaction {
    sender: String,
    recipient: String,
    amount: f64,
    timestamp: f64,
    txid: String,
}

/// Wire form, where `timestamp` and `txid` may be left out by the submitter.
#[derive(Deserialize)]
struct RawTransaction {
    sender: String,
    recipient: String,
    amount: f64,
    #[serde(default)]
    timestamp: Option<f64>,
    #[serde(default)]
    txid: Option<String>,
}

impl From<RawTransaction> for Transaction {
    fn from(raw: RawTransaction) -> Self {
        let timestamp = raw.timestamp.unwrap_or_else(now_secs);
        match raw.txid {
            Some(txid) => Self {
                sender: raw.sender,
                recipient: raw.recipient,
                amount: raw.amount,
                timestamp,
                txid,
            },
            None => Self::with_timestamp(raw.sender, raw.recipient, raw.amount, timestamp),
        }
    }
}

impl Transaction {
    /// Create a transfer stamped with the current time.
    pub fn new(sender: impl Into<String>, recipient: impl Into<String>, amount: f64) -> Self {
        Self::with_timestamp(sender, recipient, amount, now_secs())
    }

    pub fn with_timestamp(
        sender: impl Into<String>,
        recipient: impl Into<String>,
        amount: f64,
        timestamp: f64,
    ) -> Self {
        let sender = sender.into();
        let recipient = recipient.into();
        let txid = compute_txid(&sender, &recipient, amount, timestamp);
        Self {
            sender,
            recipient,
            amount,
            timestamp,
            txid,
        }
    }

    /// Reward transaction minting `amount` to `miner`.
    pub fn coinbase(miner: impl Into<String>, amount: f64) -> Self {
        Self::new(MINING_SENDER, miner, amount)
    }

    pub fn sender(&self) -> &str {
        &self.sender
    }

    pub fn recipient(&self) -> &str {
        &self.recipient
    }

    pub fn amount(&self) -> f64 {
        self.amount
    }

    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    pub fn txid(&self) -> &str {
        &self.txid
    }

    pub fn is_coinbase(&self) -> bool {
        self.sender == MINING_SENDER
    }

    /// Recompute the identifier from the current fields.
    pub fn compute_txid(&self) -> String {
        compute_txid(&self.sender, &self.recipient, self.amount, self.timestamp)
    }

    pub(crate) fn canonical(&self) -> CanonicalTransaction<'_> {
        CanonicalTransaction {
            amount: self.amount,
            recipient: &self.recipient,
            sender: &self.sender,
            timestamp: self.timestamp,
            txid: &self.txid,
        }
    }
}

/// Hashing form of a transaction. Fields are declared in sorted key order.
#[derive(Serialize)]
pub(crate) struct CanonicalTransaction<'a> {
    amount: f64,
    recipient: &'a str,
    sender: &'a str,
    timestamp: f64,
    txid: &'a str,
}

fn compute_txid(sender: &str, recipient: &str, amount: f64, timestamp: f64) -> String {
    let amount = float_repr(amount);
    let timestamp = float_repr(timestamp);
    let mut hasher = Sha256::new();
    hasher.update(format!("{sender}{recipient}{amount}{timestamp}").as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::HASH_HEX_SIZE;

    fn alice_to_bob() -> Transaction {
        Transaction::with_timestamp("Alice", "Bob", 10.0, 1_600_000_000.0)
    }

    #[test]
    fn txid_is_deterministic() {
        let a = alice_to_bob();
        let b = alice_to_bob();
        assert_eq!(a.txid(), b.txid());
        assert_eq!(a.txid(), a.compute_txid());
        assert_eq!(a.txid().len(), HASH_HEX_SIZE);
    }

    #[test]
    fn txid_matches_known_digests() {
        let reward = Transaction::with_timestamp("MINING", "M1", 10.0, 1_600_000_000.5);
        assert_eq!(
            reward.txid(),
            "b3a3a291be51fa00b1e2af05ae16feebfb086651197dba8baae0469284a062bf"
        );
        // Exponent-form floats on both numeric fields.
        let tiny = Transaction::with_timestamp("Zo\u{eb}", "\u{65e5}\u{672c}\u{1F600}\u{7f}\n\"q", 1e16, 1e-5);
        assert_eq!(
            tiny.txid(),
            "96cd29d69d3d803915523e4c97d8ef75dd61e42f2d8729655cd0b3fda35d9d0e"
        );
    }

    #[test]
    fn txid_changes_with_each_field() {
        let base = alice_to_bob();
        let variants = [
            Transaction::with_timestamp("Eve", "Bob", 10.0, 1_600_000_000.0),
            Transaction::with_timestamp("Alice", "Charlie", 10.0, 1_600_000_000.0),
            Transaction::with_timestamp("Alice", "Bob", 20.0, 1_600_000_000.0),
            Transaction::with_timestamp("Alice", "Bob", 10.0, 1_600_000_001.0),
        ];
        for other in variants {
            assert_ne!(base.txid(), other.txid());
        }
    }

    #[test]
    fn coinbase_uses_reserved_sender() {
        let tx = Transaction::coinbase("M1", 10.0);
        assert!(tx.is_coinbase());
        assert_eq!(tx.sender(), MINING_SENDER);
        assert_eq!(tx.recipient(), "M1");
        assert!(tx.timestamp() > 0.0);
        assert!(!alice_to_bob().is_coinbase());
    }

    #[test]
    fn wire_format_field_names() {
        let tx = alice_to_bob();
        let value = serde_json::to_value(&tx).unwrap();
        assert_eq!(value["sender"], "Alice");
        assert_eq!(value["recipient"], "Bob");
        assert_eq!(value["amount"], 10.0);
        assert_eq!(value["timestamp"], 1_600_000_000.0);
        assert_eq!(value["txid"], tx.txid());
    }

    #[test]
    fn deserialize_fills_missing_txid() {
        let json = r#"{"sender":"Alice","recipient":"Bob","amount":10.0,"timestamp":1600000000.0}"#;
        let tx: Transaction = serde_json::from_str(json).unwrap();
        assert_eq!(tx, alice_to_bob());
    }

    #[test]
    fn deserialize_defaults_timestamp_to_now() {
        let json = r#"{"sender":"Alice","recipient":"Bob","amount":1.5}"#;
        let tx: Transaction = serde_json::from_str(json).unwrap();
        assert!(tx.timestamp() > 1_600_000_000.0);
        assert_eq!(tx.txid(), tx.compute_txid());
    }

    #[test]
    fn deserialize_keeps_supplied_txid() {
        let json = r#"{"sender":"A","recipient":"B","amount":1.0,"timestamp":5.0,"txid":"abc"}"#;
        let tx: Transaction = serde_json::from_str(json).unwrap();
        assert_eq!(tx.txid(), "abc");
    }
}
