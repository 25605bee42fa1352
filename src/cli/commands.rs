use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "ledger-node", about = "A minimal HTTP blockchain ledger node")]
pub struct Opt {
    #[command(subcommand)]
    pub command: Command,
}

/// Selects which node's configuration and database a command works on
#[derive(Debug, Clone, Default, Args)]
pub struct NodeArgs {
    #[arg(long, help = "Path to a TOML configuration file")]
    pub config: Option<PathBuf>,
    #[arg(long, help = "Port the node listens on (selects data/node_<PORT>)")]
    pub port: Option<u16>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    #[command(name = "startnode", about = "Start a ledger node")]
    StartNode {
        #[command(flatten)]
        node: NodeArgs,
        #[arg(
            long,
            value_delimiter = ',',
            help = "Neighbor base URLs, comma separated (e.g. http://127.0.0.1:5002)"
        )]
        neighbors: Vec<String>,
        #[arg(long = "no-mining", help = "Do not start the background mining loop")]
        no_mining: bool,
    },
    #[command(name = "createwallet", about = "Generate a key pair and print its address")]
    Createwallet,
    #[command(
        name = "getbalance",
        about = "Get the balance of an address from a node's stored chain"
    )]
    GetBalance {
        #[arg(help = "The wallet address")]
        address: String,
        #[command(flatten)]
        node: NodeArgs,
    },
    #[command(name = "printchain", about = "Print a node's stored chain")]
    Printchain {
        #[command(flatten)]
        node: NodeArgs,
    },
    #[command(name = "validatechain", about = "Check linkage and proof-of-work of a node's stored chain")]
    ValidateChain {
        #[command(flatten)]
        node: NodeArgs,
    },
    #[command(name = "reset", about = "Drop a node's stored chain")]
    Reset {
        #[command(flatten)]
        node: NodeArgs,
    },
    #[command(name = "send", about = "Sign a transfer and submit it to a running node")]
    Send {
        #[arg(long, help = "Base URL of the node to submit to")]
        node_url: String,
        #[arg(long, help = "Sender address")]
        from: String,
        #[arg(long, help = "Recipient address")]
        to: String,
        #[arg(long, help = "Amount to send")]
        value: f32,
        #[arg(long, default_value = "transfer", help = "Free-text message")]
        message: String,
        #[arg(long, help = "Sender public key, 128 hex characters")]
        public_key: String,
        #[arg(long, help = "Sender private key, 64 hex characters")]
        private_key: String,
    },
}
