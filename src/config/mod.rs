//! Node configuration
//!
//! Defaults, an optional TOML file and environment overrides, merged into a
//! single `NodeConfig` that `main` hands to the ledger and the server.

pub mod settings;

pub use settings::{parse_neighbors, MiningSettings, NodeConfig, PeerSettings};
