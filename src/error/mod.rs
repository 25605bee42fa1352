//! Error handling for the ledger
//!
//! One error type covers admission, mining, consensus, persistence and the
//! HTTP surface so every layer can propagate with `?`.

use std::fmt;

/// Result type alias for ledger operations
pub type Result<T> = std::result::Result<T, BlockchainError>;

/// Error kinds produced by the ledger and its collaborators
#[derive(Debug, Clone, PartialEq)]
pub enum BlockchainError {
    /// Database-related errors
    Database(String),
    /// Cryptographic operation errors
    Crypto(String),
    /// Network communication errors
    Network(String),
    /// Wallet operation errors
    Wallet(String),
    /// Configuration errors
    Config(String),
    /// Serialization/deserialization errors
    Serialization(String),
    /// File I/O errors
    Io(String),
    /// Malformed or empty address
    InvalidAddress(String),
    /// Transfer value is zero, negative or not a finite number
    InvalidValue(f32),
    /// Signature missing, malformed or not matching the public key
    InvalidSignature(String),
    /// Sender balance does not cover the transfer
    InsufficientBalance { required: f32, available: f32 },
    /// Address never appears in any sealed transaction
    AddressNotFound(String),
    /// Mining was requested with nothing pending
    EmptyPool,
    /// Nonce search exhausted its attempt budget
    ProofNotFound { attempts: u64 },
    /// Nonce search aborted by shutdown
    Cancelled,
    /// Chain or pool kept moving underneath the mined candidate
    StaleCandidate,
    /// Block was sealed but neighbors could not be notified
    NeighborNotify(String),
}

impl fmt::Display for BlockchainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockchainError::Database(msg) => write!(f, "Database error: {msg}"),
            BlockchainError::Crypto(msg) => write!(f, "Cryptographic error: {msg}"),
            BlockchainError::Network(msg) => write!(f, "Network error: {msg}"),
            BlockchainError::Wallet(msg) => write!(f, "Wallet error: {msg}"),
            BlockchainError::Config(msg) => write!(f, "Configuration error: {msg}"),
            BlockchainError::Serialization(msg) => write!(f, "Serialization error: {msg}"),
            BlockchainError::Io(msg) => write!(f, "I/O error: {msg}"),
            BlockchainError::InvalidAddress(addr) => write!(f, "Invalid address: {addr}"),
            BlockchainError::InvalidValue(value) => {
                write!(f, "Invalid value: {value} (must be positive)")
            }
            BlockchainError::InvalidSignature(msg) => write!(f, "Invalid signature: {msg}"),
            BlockchainError::InsufficientBalance {
                required,
                available,
            } => {
                write!(
                    f,
                    "Not enough balance in wallet: required {required}, available {available}"
                )
            }
            BlockchainError::AddressNotFound(addr) => {
                write!(f, "Address not found in the blockchain: {addr}")
            }
            BlockchainError::EmptyPool => write!(f, "Transaction pool is empty"),
            BlockchainError::ProofNotFound { attempts } => {
                write!(f, "No proof of work found within {attempts} attempts")
            }
            BlockchainError::Cancelled => write!(f, "Mining cancelled"),
            BlockchainError::StaleCandidate => {
                write!(f, "Mined candidate went stale while sealing")
            }
            BlockchainError::NeighborNotify(msg) => {
                write!(f, "Block sealed but neighbor notification failed: {msg}")
            }
        }
    }
}

impl std::error::Error for BlockchainError {}

impl From<std::io::Error> for BlockchainError {
    fn from(err: std::io::Error) -> Self {
        BlockchainError::Io(err.to_string())
    }
}

impl From<sled::Error> for BlockchainError {
    fn from(err: sled::Error) -> Self {
        BlockchainError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for BlockchainError {
    fn from(err: serde_json::Error) -> Self {
        BlockchainError::Serialization(err.to_string())
    }
}

impl From<bincode::error::EncodeError> for BlockchainError {
    fn from(err: bincode::error::EncodeError) -> Self {
        BlockchainError::Serialization(err.to_string())
    }
}

impl From<bincode::error::DecodeError> for BlockchainError {
    fn from(err: bincode::error::DecodeError) -> Self {
        BlockchainError::Serialization(err.to_string())
    }
}

impl From<reqwest::Error> for BlockchainError {
    fn from(err: reqwest::Error) -> Self {
        BlockchainError::Network(err.to_string())
    }
}

impl From<toml::de::Error> for BlockchainError {
    fn from(err: toml::de::Error) -> Self {
        BlockchainError::Config(err.to_string())
    }
}
