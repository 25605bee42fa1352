use crate::core::Block;
use crate::error::{BlockchainError, Result};
use crate::utils::{deserialize, serialize};
use crate::wallet::Wallet;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use sled::Db;
use std::path::Path;
use std::sync::{Mutex, PoisonError};

const CHAIN_KEY: &str = "blockchain";
const NODE_WALLET_KEY: &str = "node_wallet";
const LEDGER_TREE: &str = "ledger";

/// Persisted ledger state. Only the chain survives a restart; the pool and
/// the neighbor list start empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub chain: Vec<Block>,
}

impl Snapshot {
    pub fn new(chain: Vec<Block>) -> Snapshot {
        Snapshot { chain }
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_json(bytes: &[u8]) -> Result<Snapshot> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

pub trait SnapshotStore: Send + Sync {
    fn save(&self, snapshot: &Snapshot) -> Result<()>;

    /// `Ok(None)` when nothing has been saved yet.
    fn load(&self) -> Result<Option<Snapshot>>;

    fn clear(&self) -> Result<()>;
}

/// Loads a snapshot, treating corrupt or empty data as absent.
pub fn load_or_none(store: &dyn SnapshotStore) -> Option<Snapshot> {
    match store.load() {
        Ok(Some(snapshot)) if !snapshot.chain.is_empty() => Some(snapshot),
        Ok(Some(_)) => {
            warn!("Stored snapshot holds an empty chain, ignoring it");
            None
        }
        Ok(None) => None,
        Err(e) => {
            warn!("Failed to load snapshot, starting fresh: {e}");
            None
        }
    }
}

/// Snapshot store backed by a sled database at `data/node_<port>`.
pub struct SledSnapshotStore {
    db: Db,
    tree: sled::Tree,
}

impl SledSnapshotStore {
    pub fn open(path: &Path) -> Result<SledSnapshotStore> {
        let db = sled::open(path).map_err(|e| {
            BlockchainError::Database(format!(
                "Failed to open database at {}: {e}",
                path.display()
            ))
        })?;
        let tree = db
            .open_tree(LEDGER_TREE)
            .map_err(|e| BlockchainError::Database(format!("Failed to open ledger tree: {e}")))?;
        info!("Opened snapshot store at {}", path.display());
        Ok(SledSnapshotStore { db, tree })
    }

    pub fn load_wallet(&self) -> Result<Option<Wallet>> {
        match self.tree.get(NODE_WALLET_KEY)? {
            Some(bytes) => Ok(Some(deserialize::<Wallet>(bytes.as_ref())?)),
            None => Ok(None),
        }
    }

    pub fn save_wallet(&self, wallet: &Wallet) -> Result<()> {
        self.tree.insert(NODE_WALLET_KEY, serialize(wallet)?)?;
        self.db.flush()?;
        Ok(())
    }

    /// The stored node wallet, or a fresh one that is stored right away.
    pub fn load_or_create_wallet(&self) -> Result<Wallet> {
        match self.load_wallet() {
            Ok(Some(wallet)) => return Ok(wallet),
            Ok(None) => {}
            Err(e) => warn!("Stored node wallet is unreadable, generating a new one: {e}"),
        }
        let wallet = Wallet::new()?;
        self.save_wallet(&wallet)?;
        info!("Generated node wallet {}", wallet.get_address());
        Ok(wallet)
    }
}

impl SnapshotStore for SledSnapshotStore {
    fn save(&self, snapshot: &Snapshot) -> Result<()> {
        self.tree.insert(CHAIN_KEY, snapshot.to_json()?)?;
        self.db.flush()?;
        Ok(())
    }

    fn load(&self) -> Result<Option<Snapshot>> {
        match self.tree.get(CHAIN_KEY)? {
            Some(bytes) => Ok(Some(Snapshot::from_json(bytes.as_ref())?)),
            None => Ok(None),
        }
    }

    fn clear(&self) -> Result<()> {
        self.tree.remove(CHAIN_KEY)?;
        self.db.flush()?;
        Ok(())
    }
}

/// Keeps the snapshot in memory. Used by offline CLI commands and tests.
#[derive(Default)]
pub struct MemorySnapshotStore {
    inner: Mutex<Option<Vec<u8>>>,
}

impl MemorySnapshotStore {
    pub fn new() -> MemorySnapshotStore {
        Self::default()
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn save(&self, snapshot: &Snapshot) -> Result<()> {
        let bytes = snapshot.to_json()?;
        *self.inner.lock().unwrap_or_else(PoisonError::into_inner) = Some(bytes);
        Ok(())
    }

    fn load(&self) -> Result<Option<Snapshot>> {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.as_deref().map(Snapshot::from_json).transpose()
    }

    fn clear(&self) -> Result<()> {
        *self.inner.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}
