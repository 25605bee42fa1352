// This is the ledger - the chain, the pool of pending transactions and the
// neighbors I reconcile with. Mining lives in mining.rs and chain adoption in
// consensus.rs; both are more `impl Blockchain` blocks over the same state.
//
// Locking rules I stick to:
//   - `state` guards chain + pool together, and is never held during
//     proof-of-work or any network call
//   - `mining` serializes whole mining runs
//   - the neighbor list has its own RwLock inside `Nodes`

use crate::config::{MiningSettings, NodeConfig};
use crate::core::{Block, ProofOfWork, Transaction, TransactionRequest, MINING_SENDER};
use crate::error::{BlockchainError, Result};
use crate::network::{Notice, Nodes, OutboundQueue, PeerClient, RetryPolicy};
use crate::storage::{load_or_none, Snapshot, SnapshotStore};
use crate::wallet::{PublicKey, Signature};
use log::{debug, error, info, warn};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

// Chain and pool always change together, so they sit behind one lock
pub(crate) struct LedgerState {
    pub(crate) chain: Vec<Block>,
    pub(crate) pool: Vec<Transaction>,
}

impl LedgerState {
    fn fresh() -> Result<LedgerState> {
        Ok(LedgerState {
            chain: vec![Block::genesis()?],
            pool: vec![],
        })
    }

    pub(crate) fn tip_hash(&self) -> String {
        self.chain
            .last()
            .map(|block| block.get_hash().to_string())
            .unwrap_or_default()
    }
}

/// What a ledger needs besides its storage and its peers.
#[derive(Debug, Clone)]
pub struct LedgerOptions {
    /// Address the node's own mining rewards go to
    pub blockchain_address: String,
    pub port: u16,
    pub neighbors: Vec<String>,
    pub mining: MiningSettings,
    pub retry: RetryPolicy,
}

impl LedgerOptions {
    pub fn new(blockchain_address: &str, port: u16) -> LedgerOptions {
        LedgerOptions {
            blockchain_address: blockchain_address.to_string(),
            port,
            neighbors: vec![],
            mining: MiningSettings::default(),
            retry: RetryPolicy::new(1, std::time::Duration::ZERO),
        }
    }

    pub fn from_config(blockchain_address: &str, config: &NodeConfig) -> LedgerOptions {
        LedgerOptions {
            blockchain_address: blockchain_address.to_string(),
            port: config.port,
            neighbors: config.neighbors.clone(),
            mining: config.mining.clone(),
            retry: RetryPolicy::new(config.peers.max_retries, config.peers.backoff()),
        }
    }
}

pub struct Blockchain {
    state: Mutex<LedgerState>,
    pub(crate) mining: Mutex<()>,
    pub(crate) mining_loop: AtomicBool,
    pub(crate) shutdown: Arc<AtomicBool>,
    neighbors: Arc<Nodes>,
    outbound: OutboundQueue,
    pub(crate) peers: Arc<dyn PeerClient>,
    store: Arc<dyn SnapshotStore>,
    blockchain_address: String,
    port: u16,
    pub(crate) settings: MiningSettings,
}

impl Blockchain {
    // When I boot a node: rehydrate from the stored snapshot if there is a
    // usable one, otherwise start over from a fresh genesis block
    pub fn open(
        options: LedgerOptions,
        store: Arc<dyn SnapshotStore>,
        peers: Arc<dyn PeerClient>,
    ) -> Result<Blockchain> {
        let state = match load_or_none(store.as_ref()) {
            Some(snapshot) => {
                info!(
                    "Loaded chain of {} block(s) from snapshot",
                    snapshot.chain.len()
                );
                LedgerState {
                    chain: snapshot.chain,
                    pool: vec![],
                }
            }
            None => {
                info!("No usable snapshot, creating genesis block");
                let state = LedgerState::fresh()?;
                if let Err(e) = store.save(&Snapshot::new(state.chain.clone())) {
                    error!("Failed to save genesis snapshot: {e}");
                }
                state
            }
        };
        Ok(Self::assemble(options, state, store, peers))
    }

    // When I want a brand new ledger regardless of what is stored
    pub fn new(
        options: LedgerOptions,
        store: Arc<dyn SnapshotStore>,
        peers: Arc<dyn PeerClient>,
    ) -> Result<Blockchain> {
        let state = LedgerState::fresh()?;
        Ok(Self::assemble(options, state, store, peers))
    }

    fn assemble(
        options: LedgerOptions,
        state: LedgerState,
        store: Arc<dyn SnapshotStore>,
        peers: Arc<dyn PeerClient>,
    ) -> Blockchain {
        let neighbors = Arc::new(Nodes::from_addrs(options.neighbors));
        let outbound = OutboundQueue::spawn(neighbors.clone(), peers.clone(), options.retry);
        Blockchain {
            state: Mutex::new(state),
            mining: Mutex::new(()),
            mining_loop: AtomicBool::new(false),
            shutdown: Arc::new(AtomicBool::new(false)),
            neighbors,
            outbound,
            peers,
            store,
            blockchain_address: options.blockchain_address,
            port: options.port,
            settings: options.mining,
        }
    }

    pub(crate) fn state(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get_blockchain_address(&self) -> &str {
        self.blockchain_address.as_str()
    }

    pub fn get_port(&self) -> u16 {
        self.port
    }

    pub fn get_difficulty(&self) -> usize {
        self.settings.difficulty
    }

    pub(crate) fn proof_of_work(&self) -> ProofOfWork {
        ProofOfWork::new(self.settings.difficulty, self.settings.max_nonce_attempts)
    }

    // ---- queries ----

    pub fn chain(&self) -> Vec<Block> {
        self.state().chain.clone()
    }

    pub fn chain_len(&self) -> usize {
        self.state().chain.len()
    }

    pub fn last_block(&self) -> Option<Block> {
        self.state().chain.last().cloned()
    }

    /// The last `n` blocks, most recent first.
    pub fn get_blocks(&self, n: usize) -> Vec<Block> {
        self.state().chain.iter().rev().take(n).cloned().collect()
    }

    pub fn transaction_pool(&self) -> Vec<Transaction> {
        self.state().pool.clone()
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot::new(self.chain())
    }

    /// Net amount `address` received minus what it sent, over sealed blocks only.
    pub fn calculate_total_amount(&self, address: &str) -> Result<f32> {
        let state = self.state();
        balance_of(&state.chain, address)
            .ok_or_else(|| BlockchainError::AddressNotFound(address.to_string()))
    }

    /// Addresses registered through `REGISTER USER WALLET`, sorted.
    pub fn get_wallets(&self) -> Vec<String> {
        let state = self.state();
        let mut wallets = BTreeSet::new();
        for block in &state.chain {
            for tx in block.get_transactions() {
                debug!(
                    "Scanning {} -> {} ({:?})",
                    tx.get_sender(),
                    tx.get_recipient(),
                    tx.get_message()
                );
                if tx.is_registration() {
                    wallets.insert(tx.get_recipient().to_string());
                }
            }
        }
        info!("Found {} registered wallet(s)", wallets.len());
        wallets.into_iter().collect()
    }

    // ---- admission ----

    /// Admits a transaction into the pool.
    ///
    /// System transactions go straight in, so only the node itself may call
    /// this with one. Anything else must carry a positive finite value, a
    /// signature that verifies against `sender_public_key`, and a sender
    /// whose sealed balance, less what it already has pending, covers it.
    pub fn add_transaction(
        &self,
        transaction: Transaction,
        sender_public_key: Option<&PublicKey>,
        signature: Option<&Signature>,
    ) -> Result<()> {
        if transaction.is_system() {
            self.state().pool.push(transaction);
            return Ok(());
        }

        let value = transaction.get_value();
        if !value.is_finite() || value <= 0.0 {
            return Err(BlockchainError::InvalidValue(value));
        }

        let (public_key, signature) = match (sender_public_key, signature) {
            (Some(public_key), Some(signature)) => (public_key, signature),
            _ => {
                return Err(BlockchainError::InvalidSignature(
                    "public key and signature are required".to_string(),
                ))
            }
        };
        if !transaction.verify_signature(public_key, signature) {
            warn!(
                "Rejected transaction from {}: signature does not verify",
                transaction.get_sender()
            );
            return Err(BlockchainError::InvalidSignature(
                "signature does not match transaction".to_string(),
            ));
        }

        // Pending spends count against the sender so queued transfers can
        // never overdraw once they are sealed together
        let mut state = self.state();
        let sender = transaction.get_sender();
        let sealed = balance_of(&state.chain, sender).unwrap_or(0.0);
        let available = sealed - pending_outflow(&state.pool, sender);
        if available < value {
            return Err(BlockchainError::InsufficientBalance {
                required: value,
                available,
            });
        }
        debug!(
            "Admitted {} -> {}: {value}",
            transaction.get_sender(),
            transaction.get_recipient()
        );
        state.pool.push(transaction);
        self.persist(&state);
        Ok(())
    }

    /// Admits a peer-relayed request. It is not relayed any further.
    ///
    /// Requests can never speak for the system sender; rewards and
    /// registrations only enter the pool from inside the node.
    pub fn add_transaction_request(&self, request: &TransactionRequest) -> Result<()> {
        let transaction = request.to_transaction()?;
        if transaction.is_system() {
            warn!(
                "Rejected request claiming the system sender, recipient {}",
                transaction.get_recipient()
            );
            return Err(BlockchainError::InvalidAddress(format!(
                "{MINING_SENDER} cannot send through a transaction request"
            )));
        }
        let (public_key, signature) = request.credentials()?;
        self.add_transaction(transaction, Some(&public_key), Some(&signature))
    }

    /// Admits a client request and relays it to every neighbor.
    pub fn create_transaction(&self, request: &TransactionRequest) -> Result<()> {
        self.add_transaction_request(request)?;
        if let Err(e) = self.notify_neighbors(vec![Notice::RelayTransaction(request.clone())]) {
            warn!("Admitted transaction was not relayed: {e}");
        }
        Ok(())
    }

    /// Admits the registration marker for `address` and mines it into a block.
    pub fn register_new_wallet(&self, address: &str) -> Result<()> {
        if address.is_empty() {
            return Err(BlockchainError::InvalidAddress(
                "wallet address must not be empty".to_string(),
            ));
        }
        self.add_transaction(Transaction::new_registration(address), None, None)?;
        match self.mine() {
            Ok(block) => info!("Registered wallet {address} in block {}", block.get_hash()),
            Err(e) => warn!("Registration of {address} is pending, mining failed: {e}"),
        }
        Ok(())
    }

    pub fn clear_transaction_pool(&self) {
        let mut state = self.state();
        debug!("Clearing {} pending transaction(s)", state.pool.len());
        state.pool.clear();
    }

    // ---- neighbors ----

    pub fn get_neighbors(&self) -> Vec<String> {
        self.neighbors.get_addrs()
    }

    pub fn set_neighbors(&self, neighbors: Vec<String>) {
        self.neighbors.replace(neighbors);
    }

    pub(crate) fn notify_neighbors(&self, notices: Vec<Notice>) -> Result<()> {
        if self.neighbors.is_empty() {
            return Ok(());
        }
        for notice in notices {
            self.outbound.push(notice)?;
        }
        Ok(())
    }

    // ---- lifecycle ----

    /// Back to a single fresh genesis block with no pool and no neighbors.
    pub fn reset(&self) -> Result<()> {
        let fresh = LedgerState::fresh()?;
        let mut state = self.state();
        *state = fresh;
        self.neighbors.clear();
        if let Err(e) = self.store.clear() {
            error!("Failed to clear stored snapshot: {e}");
        }
        self.persist(&state);
        info!("Ledger reset to genesis");
        Ok(())
    }

    /// Stops the mining loop, aborts an in-flight proof-of-work search and
    /// flushes queued neighbor notices.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.outbound.close();
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    // Best-effort: a failed save is logged and the in-memory ledger carries on
    pub(crate) fn persist(&self, state: &LedgerState) {
        if let Err(e) = self.store.save(&Snapshot::new(state.chain.clone())) {
            error!("Failed to save snapshot: {e}");
        }
    }
}

// What `address` has queued to send but not yet sealed
fn pending_outflow(pool: &[Transaction], address: &str) -> f32 {
    pool.iter()
        .filter(|tx| tx.get_sender() == address)
        .map(Transaction::get_value)
        .sum()
}

/// `None` when `address` never appears in a sealed transaction.
pub fn balance_of(chain: &[Block], address: &str) -> Option<f32> {
    let mut total = 0.0f32;
    let mut seen = false;
    for tx in chain.iter().flat_map(|block| block.get_transactions()) {
        if tx.get_recipient() == address {
            total += tx.get_value();
            seen = true;
        }
        if tx.get_sender() == address {
            total -= tx.get_value();
            seen = true;
        }
    }
    seen.then_some(total)
}
