use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use ledger_core::{longest_valid_chain, Block, ChainSnapshot, Ledger, LedgerError, Transaction};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::{atomic::AtomicBool, Arc};
use thiserror::Error;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

use crate::peers::PeerClient;

#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<Ledger>,
    pub peers: PeerClient,
    /// Identity credited with the reward of blocks mined by this node.
    pub node_address: String,
    /// Set on shutdown to abandon an in-flight nonce search.
    pub cancel_mining: Arc<AtomicBool>,
}

impl AppState {
    pub fn new(ledger: Arc<Ledger>, peers: PeerClient, node_address: impl Into<String>) -> Self {
        Self {
            ledger,
            peers,
            node_address: node_address.into(),
            cancel_mining: Arc::new(AtomicBool::new(false)),
        }
    }
}

/// Run a ledger call on the blocking pool. The ledger lock can be held for a
/// whole nonce search, so waiting on it must never park a runtime worker.
async fn with_ledger<T, F>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Ledger) -> T + Send + 'static,
    T: Send + 'static,
{
    let ledger = Arc::clone(&state.ledger);
    Ok(tokio::task::spawn_blocking(move || f(&ledger)).await?)
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid transaction: {0}")]
    InvalidTransaction(&'static str),

    #[error("no nodes provided")]
    NoNodes,

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("mining was cancelled")]
    MiningCancelled,

    #[error("ledger task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

#[derive(Serialize)]
struct ErrorBody {
    detail: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::InvalidTransaction(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::NoNodes | ApiError::Ledger(_) => StatusCode::BAD_REQUEST,
            ApiError::MiningCancelled => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let detail = self.to_string();
        (status, Json(ErrorBody { detail })).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterNodes {
    pub nodes: Vec<String>,
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(Health { status: "ok" }) }))
        .route("/chain", get(get_chain))
        .route("/transactions/new", post(new_transaction))
        .route("/mine", get(mine))
        .route("/blocks/new", post(receive_block))
        .route("/nodes", get(get_nodes))
        .route("/nodes/register", post(register_nodes))
        .route("/nodes/resolve", get(resolve))
        .route("/mempool", get(get_mempool))
        .route("/balances", get(get_balances))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn get_chain(State(state): State<AppState>) -> Result<Json<ChainSnapshot>, ApiError> {
    Ok(Json(with_ledger(&state, |ledger| ledger.snapshot()).await?))
}

fn check_shape(tx: &Transaction) -> Result<(), ApiError> {
    if tx.sender().is_empty() || tx.recipient().is_empty() {
        return Err(ApiError::InvalidTransaction("sender and recipient are required"));
    }
    if !tx.amount().is_finite() || tx.amount() < 0.0 {
        return Err(ApiError::InvalidTransaction(
            "amount must be a non-negative number",
        ));
    }
    Ok(())
}

async fn new_transaction(
    State(state): State<AppState>,
    Json(tx): Json<Transaction>,
) -> Result<impl IntoResponse, ApiError> {
    check_shape(&tx)?;
    let queued = tx.clone();
    if let Err(e) = with_ledger(&state, move |ledger| ledger.add_transaction(queued)).await? {
        warn!(txid = tx.txid(), "rejected transaction: {e}");
        return Err(e.into());
    }
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Transaction will be added to the next block.",
            "transaction": tx,
        })),
    ))
}

async fn mine(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let miner = state.node_address.clone();
    let cancel = Arc::clone(&state.cancel_mining);
    let mined = with_ledger(&state, move |ledger| {
        ledger
            .mine_block_until(&miner, &cancel)
            .map(|block| (block, ledger.peers()))
    })
    .await?;
    let Some((block, peers)) = mined else {
        return Err(ApiError::MiningCancelled);
    };

    let delivered = state.peers.broadcast_block(peers, block.clone()).await;
    info!(index = block.index(), delivered, "broadcast mined block");

    Ok(Json(json!({
        "message": "Block mined",
        "block": block,
        "delivered": delivered,
    })))
}

async fn receive_block(
    State(state): State<AppState>,
    Json(block): Json<Block>,
) -> Result<impl IntoResponse, ApiError> {
    let index = block.index();
    if let Err(e) = with_ledger(&state, move |ledger| ledger.receive_block(block)).await? {
        warn!(index, "rejected block: {e}");
        return Err(e.into());
    }
    Ok(Json(json!({ "message": "Block added" })))
}

async fn get_nodes(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let nodes = with_ledger(&state, |ledger| ledger.peers()).await?;
    Ok(Json(json!({ "nodes": nodes })))
}

async fn register_nodes(
    State(state): State<AppState>,
    Json(body): Json<RegisterNodes>,
) -> Result<impl IntoResponse, ApiError> {
    if body.nodes.is_empty() {
        return Err(ApiError::NoNodes);
    }
    let total = with_ledger(&state, move |ledger| {
        for node in body.nodes {
            if ledger.register_peer(node.clone()) {
                info!(peer = %node, "registered peer");
            }
        }
        ledger.peers()
    })
    .await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "New nodes have been added",
            "total_nodes": total,
        })),
    ))
}

async fn resolve(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let (peers, local_len) = with_ledger(&state, |ledger| (ledger.peers(), ledger.len())).await?;
    let replaced = match longest_valid_chain(&state.peers, &peers, local_len).await {
        Some(chain) => with_ledger(&state, move |ledger| ledger.replace_chain(chain)).await?,
        None => false,
    };
    let message = if replaced {
        "Chain replaced"
    } else {
        "Chain is authoritative"
    };
    let snapshot = with_ledger(&state, |ledger| ledger.snapshot()).await?;
    Ok(Json(json!({
        "message": message,
        "replaced": replaced,
        "chain": snapshot,
    })))
}

async fn get_mempool(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let mempool = with_ledger(&state, |ledger| ledger.mempool()).await?;
    Ok(Json(json!({ "mempool": mempool })))
}

async fn get_balances(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let balances = with_ledger(&state, |ledger| ledger.balances()).await?;
    Ok(Json(json!({ "balances": balances })))
}
