//! Ledger-wide constants
//!
//! Mining rewards and wallet registrations are issued by a reserved sender
//! identity that never signs anything and never has its balance checked.

/// Sender identity of system-issued transactions
pub const MINING_SENDER: &str = "THE BLOCKCHAIN";

/// Coins credited to the miner of each sealed block
pub const MINING_REWARD: f32 = 1.0;

/// Required number of leading `'0'` hex characters in a sealed block hash
pub const MINING_DIFFICULTY: usize = 3;

/// Seconds between iterations of the background mining loop
pub const MINING_TIMER_SEC: u64 = 20;

/// Upper bound on nonces tried for one candidate block
pub const MAX_NONCE_ATTEMPTS: u64 = 50_000_000;

/// Message carried by the reward transaction
pub const MINING_REWARD_MESSAGE: &str = "MINING REWARD";

/// Message carried by the zero-value wallet registration marker
pub const REGISTER_WALLET_MESSAGE: &str = "REGISTER USER WALLET";

/// Blocks returned by the miner's recent-blocks view
pub const RECENT_BLOCKS: usize = 10;
