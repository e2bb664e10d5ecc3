use anyhow::Result;
use clap::{Parser, Subcommand};
use reqwest::{Client, Response};
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "ledger-cli")]
#[command(about = "CLI client for the proof-of-work ledger node")]
struct Cli {
    /// Node base URL (e.g. http://127.0.0.1:8000)
    #[arg(long, global = true, default_value = "http://127.0.0.1:8000")]
    node: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Submit a transaction
    Submit {
        /// Sender
        #[arg(long)]
        sender: String,
        /// Recipient
        #[arg(long)]
        recipient: String,
        /// Amount
        #[arg(long)]
        amount: f64,
    },
    /// Mine a block on the node
    Mine,
    /// Print the node's full chain
    Chain,
    /// Print pending transactions
    Mempool,
    /// Print derived balances
    Balances,
    /// List known peers
    Peers,
    /// Register one or more peers (host:port)
    Register {
        #[arg(required = true)]
        nodes: Vec<String>,
    },
    /// Run longest-chain resolution against known peers
    Resolve,
}

#[derive(Serialize)]
struct Tx {
    sender: String,
    recipient: String,
    amount: f64,
}

#[derive(Serialize)]
struct Register {
    nodes: Vec<String>,
}

async fn print_response(res: Response) -> Result<()> {
    let status = res.status();
    let body = res.text().await?;
    println!("status: {}", status);
    match serde_json::from_str::<serde_json::Value>(&body) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{body}"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .pretty()
        .init();

    let cli = Cli::parse();
    let node = cli.node.trim_end_matches('/');
    let client = Client::new();
    debug!(node, "sending request");

    let res = match cli.cmd {
        Command::Submit {
            sender,
            recipient,
            amount,
        } => {
            let tx = Tx {
                sender,
                recipient,
                amount,
            };
            client
                .post(format!("{node}/transactions/new"))
                .json(&tx)
                .send()
                .await?
        }
        Command::Mine => client.get(format!("{node}/mine")).send().await?,
        Command::Chain => client.get(format!("{node}/chain")).send().await?,
        Command::Mempool => client.get(format!("{node}/mempool")).send().await?,
        Command::Balances => client.get(format!("{node}/balances")).send().await?,
        Command::Peers => client.get(format!("{node}/nodes")).send().await?,
        Command::Register { nodes } => {
            client
                .post(format!("{node}/nodes/register"))
                .json(&Register { nodes })
                .send()
                .await?
        }
        Command::Resolve => client.get(format!("{node}/nodes/resolve")).send().await?,
    };
    print_response(res).await
}
