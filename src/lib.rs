//! # ledger-node
//!
//! A minimal blockchain ledger served over HTTP. Each node keeps a chain of
//! proof-of-work blocks holding signed value transfers, mines its pending
//! pool on a timer, and adopts the longest valid chain among its neighbors.
//!
//! ## Layout
//! - `core/`: blocks, transactions, the ledger, mining and consensus
//! - `wallet/`: P-256 keys, addresses, hex wire formats for keys and signatures
//! - `network/`: the HTTP server, the neighbor client and the outbound queue
//! - `storage/`: chain snapshots in a per-node sled database
//! - `config/`: node settings from defaults, TOML and the environment
//! - `utils/`: hashing, signing and encoding helpers
//! - `cli/`: command-line parsing
//!
//! ## Where to start
//! 1. `core/blockchain.rs` for admission, balances and the locking rules
//! 2. `core/mining.rs` for how a block gets sealed
//! 3. `core/consensus.rs` for chain validation and adoption
//! 4. `network/server.rs` for the REST routes

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod network;
pub mod storage;
pub mod utils;
pub mod wallet;

#[cfg(test)]
pub mod testnet;

// Re-export commonly used types for convenience
pub use cli::{Command, NodeArgs, Opt};
pub use config::{MiningSettings, NodeConfig, PeerSettings};
pub use core::{
    balance_of, valid_chain, Block, Blockchain, LedgerOptions, ProofOfWork, Transaction,
    TransactionRequest, MINING_REWARD, MINING_SENDER,
};
pub use error::{BlockchainError, Result};
pub use network::{
    HttpPeerClient, MinerIdentity, Nodes, Notice, OfflinePeers, PeerClient, RetryPolicy, Server,
};
pub use storage::{
    load_or_none, MemorySnapshotStore, SledSnapshotStore, Snapshot, SnapshotStore,
};
pub use utils::{
    base58_decode, base58_encode, current_timestamp, ecdsa_p256_sha256_sign_digest,
    ecdsa_p256_sha256_sign_verify, new_key_pair, ripemd160_digest, sha256_digest,
};
pub use wallet::{
    address_from_public_key, sign_with_private_key, validate_address, PublicKey, Signature,
    Wallet,
};
