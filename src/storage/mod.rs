//! Snapshot persistence
//!
//! The chain is saved as one JSON document per node; the node's own wallet
//! sits next to it in the same sled database.

pub mod snapshot;

pub use snapshot::{
    load_or_none, MemorySnapshotStore, SledSnapshotStore, Snapshot, SnapshotStore,
};
