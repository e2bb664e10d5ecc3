//! Proof-of-work ledger engine: transactions, blocks, mining, chain
//! validation, longest-chain resolution and derived balances.

pub mod balances;
pub mod block;
pub mod canonical;
pub mod config;
pub mod consensus;
pub mod constants;
pub mod error;
pub mod ledger;
pub mod pow;
pub mod transaction;

pub use balances::Balances;
pub use block::Block;
pub use config::LedgerConfig;
pub use consensus::{longest_valid_chain, validate_chain, ChainSource};
pub use error::{BlockRejection, LedgerError, Result};
pub use ledger::{ChainSnapshot, Ledger};
pub use pow::CandidateBlock;
pub use transaction::Transaction;
