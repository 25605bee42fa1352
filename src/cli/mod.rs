//! Command-line interface
//!
//! Starting a node plus a handful of offline commands that work directly
//! on a node's stored chain.

pub mod commands;

pub use commands::{Command, NodeArgs, Opt};
