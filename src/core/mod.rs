//! Core ledger
//!
//! Blocks, transactions and the ledger that owns them, plus the mining
//! engine and the longest-chain resolver that operate on it.

pub mod block;
pub mod blockchain;
pub mod consensus;
pub mod mining;
pub mod monetary;
pub mod proof_of_work;
pub mod transaction;

pub use block::{Block, GENESIS_PREV_HASH};
pub use blockchain::{balance_of, Blockchain, LedgerOptions};
pub use consensus::valid_chain;
pub use mining::MAX_SEAL_RETRIES;
pub use monetary::{
    MAX_NONCE_ATTEMPTS, MINING_DIFFICULTY, MINING_REWARD, MINING_REWARD_MESSAGE, MINING_SENDER,
    MINING_TIMER_SEC, RECENT_BLOCKS, REGISTER_WALLET_MESSAGE,
};
pub use proof_of_work::ProofOfWork;
pub use transaction::{Transaction, TransactionRequest};
