//! HTTP calls to other nodes. Each call is independent: one failing peer is
//! logged and never fails the whole broadcast or resolve.

use ledger_core::{Block, ChainSnapshot, ChainSource};
use reqwest::{Client, StatusCode};
use std::{sync::Arc, time::Duration};
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum PeerError {
    #[error("peer {peer} unreachable: {source}")]
    Request {
        peer: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("peer {peer} answered {status}")]
    Status { peer: String, status: StatusCode },
}

#[derive(Clone)]
pub struct PeerClient {
    http: Client,
}

/// Peers are registered as `host:port`; a full URL is also accepted.
fn peer_url(peer: &str, path: &str) -> String {
    if peer.starts_with("http://") || peer.starts_with("https://") {
        format!("{}{path}", peer.trim_end_matches('/'))
    } else {
        format!("http://{peer}{path}")
    }
}

impl PeerClient {
    /// Client whose every request gives up after `timeout`.
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self { http })
    }

    pub async fn push_block(&self, peer: &str, block: &Block) -> Result<(), PeerError> {
        let res = self
            .http
            .post(peer_url(peer, "/blocks/new"))
            .json(block)
            .send()
            .await
            .map_err(|source| PeerError::Request {
                peer: peer.to_string(),
                source,
            })?;
        if !res.status().is_success() {
            return Err(PeerError::Status {
                peer: peer.to_string(),
                status: res.status(),
            });
        }
        Ok(())
    }

    /// Push `block` to every peer concurrently. Returns how many accepted it.
    pub async fn broadcast_block(&self, peers: Vec<String>, block: Block) -> usize {
        let block = Arc::new(block);
        let mut tasks = JoinSet::new();
        for peer in peers {
            let client = self.clone();
            let block = Arc::clone(&block);
            tasks.spawn(async move {
                let result = client.push_block(&peer, &block).await;
                (peer, result)
            });
        }

        let mut delivered = 0;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((peer, Ok(()))) => {
                    debug!(peer = %peer, "block delivered");
                    delivered += 1;
                }
                Ok((peer, Err(e))) => warn!(peer = %peer, "failed to broadcast block: {e}"),
                Err(e) => warn!("broadcast task aborted: {e}"),
            }
        }
        delivered
    }
}

impl ChainSource for PeerClient {
    type Error = PeerError;

    async fn fetch_chain(&self, peer: &str) -> Result<Vec<Block>, PeerError> {
        let request_err = |source| PeerError::Request {
            peer: peer.to_string(),
            source,
        };
        let res = self
            .http
            .get(peer_url(peer, "/chain"))
            .send()
            .await
            .map_err(request_err)?;
        if res.status() != StatusCode::OK {
            return Err(PeerError::Status {
                peer: peer.to_string(),
                status: res.status(),
            });
        }
        let snapshot: ChainSnapshot = res.json().await.map_err(request_err)?;
        Ok(snapshot.chain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_address_gets_http_scheme() {
        assert_eq!(
            peer_url("127.0.0.1:8001", "/chain"),
            "http://127.0.0.1:8001/chain"
        );
    }

    #[test]
    fn full_url_is_kept() {
        assert_eq!(
            peer_url("https://node.example/", "/blocks/new"),
            "https://node.example/blocks/new"
        );
    }
}
