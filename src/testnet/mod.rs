//! Testnet framework for ledger testing
//!
//! Builds isolated ledgers and wires several of them into an in-process
//! network, so multi-node flows run without sockets or real disks.

pub mod test_utils;

pub use test_utils::*;
