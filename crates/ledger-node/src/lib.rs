//! HTTP adapter driving a [`ledger_core::Ledger`]: client routes, block
//! gossip to peers and chain fetching for fork resolution.

pub mod api;
pub mod config;
mod constants;
pub mod peers;

pub use api::{router, AppState};
pub use config::Args;
pub use peers::{PeerClient, PeerError};
