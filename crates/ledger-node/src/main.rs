use clap::Parser;
use ledger_core::Ledger;
use ledger_node::{router, AppState, Args, PeerClient};
use std::{
    net::SocketAddr,
    sync::{atomic::Ordering, Arc},
};
use tracing::{info, Level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let ledger = Arc::new(Ledger::new(args.ledger_config()));
    for peer in &args.peers {
        ledger.register_peer(peer.clone());
    }

    let state = AppState::new(
        ledger,
        PeerClient::new(args.peer_timeout())?,
        args.node_address.clone(),
    );
    let cancel_mining = Arc::clone(&state.cancel_mining);

    let addr: SocketAddr = args.listen.parse()?;
    info!(
        difficulty = args.difficulty,
        miner = %args.node_address,
        "ledger-node listening on http://{addr}"
    );
    axum::serve(tokio::net::TcpListener::bind(addr).await?, router(state))
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down");
            cancel_mining.store(true, Ordering::SeqCst);
        })
        .await?;
    Ok(())
}
