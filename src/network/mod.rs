//! Node-to-node and client-facing networking
//!
//! The HTTP server clients and peers talk to, the HTTP client this node
//! uses to reach its neighbors, and the queue that carries notifications
//! to them in the background.

pub mod node;
pub mod outbound;
pub mod peer_client;
pub mod server;

pub use node::{Node, Nodes};
pub use outbound::{Notice, OutboundQueue, RetryPolicy};
pub use peer_client::{HttpPeerClient, OfflinePeers, PeerClient};
pub use server::{ApiResponse, MinerIdentity, Server, SignRequest};
