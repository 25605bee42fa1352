// This is my entry point: either boot a ledger node and serve it over HTTP,
// or run one of the small offline commands against a node's stored chain
use clap::Parser;
use ledger_node::network::node::endpoint;
use ledger_node::{
    address_from_public_key, balance_of, load_or_none, sign_with_private_key, valid_chain,
    validate_address, Blockchain, Command, HttpPeerClient, LedgerOptions, MinerIdentity, NodeArgs,
    NodeConfig, Opt, PublicKey, Server, SledSnapshotStore, SnapshotStore, Transaction,
    TransactionRequest, Wallet,
};
use log::{error, info, warn, LevelFilter};
use std::process;
use std::sync::Arc;
use std::time::Duration;

const SUBMIT_TIMEOUT: Duration = Duration::from_secs(10);

fn main() {
    // Info by default, RUST_LOG still wins when it is set
    env_logger::builder()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();

    let opt = Opt::parse();

    if let Err(e) = run_command(opt.command) {
        error!("Error: {e}");
        process::exit(1);
    }
}

// I resolve the config the same way for every command that touches a node
fn node_config(node: &NodeArgs) -> ledger_node::Result<NodeConfig> {
    let mut config = NodeConfig::load(node.config.as_deref())?;
    if let Some(port) = node.port {
        config.port = port;
    }
    Ok(config)
}

fn open_store(config: &NodeConfig) -> ledger_node::Result<SledSnapshotStore> {
    SledSnapshotStore::open(&config.node_db_path())
}

fn run_command(command: Command) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::StartNode {
            node,
            neighbors,
            no_mining,
        } => {
            let mut config = node_config(&node)?;
            if !neighbors.is_empty() {
                config.neighbors = neighbors;
            }
            if no_mining {
                config.mining.autostart = false;
            }

            // The node keeps its wallet next to its chain so rewards keep
            // landing on the same address across restarts
            let store = Arc::new(open_store(&config)?);
            let wallet = store.load_or_create_wallet()?;
            let peers = Arc::new(HttpPeerClient::new(config.peers.timeout())?);
            let options = LedgerOptions::from_config(&wallet.get_address(), &config);
            let ledger = Arc::new(Blockchain::open(options, store, peers)?);
            info!(
                "Node {} on port {} with {} neighbor(s)",
                ledger.get_blockchain_address(),
                ledger.get_port(),
                config.neighbors.len()
            );

            if ledger.resolve_conflicts() {
                info!("Adopted a longer chain from the neighbors");
            }
            if config.mining.autostart {
                ledger.start_mining();
            }

            let server = Server::new(ledger, MinerIdentity::from_wallet(&wallet)?);
            server.run(&config.bind_addr())?;
        }
        Command::Createwallet => {
            let wallet = Wallet::new()?;
            println!("Address:     {}", wallet.get_address());
            println!("Public key:  {}", wallet.public_key_hex()?);
            println!("Private key: {}", wallet.private_key_hex()?);
        }
        Command::GetBalance { address, node } => {
            let config = node_config(&node)?;
            let snapshot = load_or_none(&open_store(&config)?).ok_or("No stored chain found")?;
            match balance_of(&snapshot.chain, &address) {
                Some(balance) => println!("Balance of {address}: {balance}"),
                None => return Err(format!("Address not found in the blockchain: {address}").into()),
            }
        }
        Command::Printchain { node } => {
            let config = node_config(&node)?;
            let snapshot = load_or_none(&open_store(&config)?).ok_or("No stored chain found")?;
            for block in snapshot.chain.iter().rev() {
                println!("Prev block hash: {}", block.get_prev_hash());
                println!("Cur block hash: {}", block.get_hash());
                println!("Timestamp: {}", block.get_timestamp());
                println!("Nonce: {}", block.get_nonce());
                for tx in block.get_transactions() {
                    println!(
                        "- {} -> {}: {} ({})",
                        tx.get_sender(),
                        tx.get_recipient(),
                        tx.get_value(),
                        tx.get_message()
                    );
                }
                println!()
            }
        }
        Command::ValidateChain { node } => {
            let config = node_config(&node)?;
            let snapshot = load_or_none(&open_store(&config)?).ok_or("No stored chain found")?;
            if valid_chain(&snapshot.chain, config.mining.difficulty) {
                println!("Chain of {} block(s) is valid", snapshot.chain.len());
            } else {
                return Err("Stored chain failed validation".into());
            }
        }
        Command::Reset { node } => {
            let config = node_config(&node)?;
            open_store(&config)?.clear()?;
            println!("Stored chain dropped for port {}", config.port);
        }
        Command::Send {
            node_url,
            from,
            to,
            value,
            message,
            public_key,
            private_key,
        } => {
            // I check both addresses before signing anything
            if !validate_address(&to) {
                return Err(format!("Invalid recipient address: {to}").into());
            }
            let public_key = PublicKey::from_hex(&public_key)?;
            if !validate_address(&from) || address_from_public_key(&public_key) != from {
                return Err(format!("Sender address {from} does not match the public key").into());
            }
            let transaction = Transaction::new(&from, &to, &message, value);
            let signature = sign_with_private_key(&private_key, &public_key, &transaction)?;
            let request = TransactionRequest::from_signed(&transaction, &public_key, &signature);

            let client = reqwest::blocking::Client::builder()
                .timeout(SUBMIT_TIMEOUT)
                .build()?;
            let response = client
                .post(endpoint(&node_url, "/transactions"))
                .json(&request)
                .send()?;
            let status = response.status();
            let body = response.text()?;
            if status.is_success() {
                println!("Success! {body}");
            } else {
                warn!("Node answered {status}");
                return Err(format!("Transaction rejected: {body}").into());
            }
        }
    }
    Ok(())
}
