// Mining: drain the pool into a candidate, search for a nonce with no lock
// held, then seal only if nothing moved underneath me in the meantime.

use crate::core::{Block, Blockchain, Transaction};
use crate::error::{BlockchainError, Result};
use crate::network::Notice;
use log::{debug, info, warn};
use std::sync::atomic::Ordering;
use std::sync::{Arc, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

/// Candidate rebuilds allowed when the tip or the pool changed mid-search
pub const MAX_SEAL_RETRIES: usize = 3;

const LOOP_TICK: Duration = Duration::from_millis(100);

impl Blockchain {
    /// Mines one block paying the reward to this node's own address.
    pub fn mine(&self) -> Result<Block> {
        let miner = self.get_blockchain_address().to_string();
        self.mine_block(&miner)
    }

    /// Seals every pending transaction plus a reward for `miner_address`.
    ///
    /// Returns the sealed block. `NeighborNotify` means the block was sealed
    /// but the neighbors could not be told about it.
    pub fn mine_block(&self, miner_address: &str) -> Result<Block> {
        self.mine_with(miner_address, |candidate| {
            self.proof_of_work().run(candidate, &self.shutdown)
        })
    }

    // `search` runs with no ledger lock held and may see the tip or the pool
    // move before it returns
    fn mine_with<F>(&self, miner_address: &str, mut search: F) -> Result<Block>
    where
        F: FnMut(&Block) -> Result<(u64, String)>,
    {
        if miner_address.is_empty() {
            return Err(BlockchainError::InvalidAddress(
                "miner address must not be empty".to_string(),
            ));
        }
        let _mining = self.mining.lock().unwrap_or_else(PoisonError::into_inner);

        for attempt in 0..MAX_SEAL_RETRIES {
            // I only copy what I need and let go of the lock before hashing
            let (pending, tip_hash) = {
                let state = self.state();
                if state.pool.is_empty() {
                    return Err(BlockchainError::EmptyPool);
                }
                (state.pool.clone(), state.tip_hash())
            };

            let mut transactions = pending.clone();
            transactions.push(Transaction::new_reward(miner_address, self.settings.reward));
            let mut block = Block::new(transactions, tip_hash.clone())?;

            let (nonce, hash) = search(&block)?;
            block.set_proof(nonce, hash);

            if self.seal(&block, &tip_hash, &pending) {
                info!(
                    "Sealed block {} with {} transaction(s), chain length {}",
                    block.get_hash(),
                    block.get_transactions().len(),
                    self.chain_len()
                );
                self.notify_neighbors(vec![Notice::ClearPool, Notice::Consensus])
                    .map_err(|e| {
                        BlockchainError::NeighborNotify(format!("block {}: {e}", block.get_hash()))
                    })?;
                return Ok(block);
            }
            warn!(
                "Candidate on {tip_hash} went stale (attempt {}/{MAX_SEAL_RETRIES}), rebuilding",
                attempt + 1
            );
        }
        Err(BlockchainError::StaleCandidate)
    }

    // Appends `block` if the tip is still `expected_tip` and the pool still
    // starts with `included`; drops exactly that prefix from the pool.
    fn seal(&self, block: &Block, expected_tip: &str, included: &[Transaction]) -> bool {
        let mut state = self.state();
        if state.tip_hash() != expected_tip || !state.pool.starts_with(included) {
            return false;
        }
        state.pool.drain(..included.len());
        state.chain.push(block.clone());
        self.persist(&state);
        true
    }

    /// Starts the background mining loop: one `mine()` right away, then one
    /// every mining interval until shutdown. Returns false when a loop is
    /// already running.
    pub fn start_mining(self: &Arc<Self>) -> bool {
        if self.mining_loop.swap(true, Ordering::SeqCst) {
            debug!("Mining loop already running");
            return false;
        }
        let ledger = Arc::clone(self);
        let interval = self.settings.interval();
        thread::spawn(move || {
            info!("Mining loop started, interval {interval:?}");
            while !ledger.is_shut_down() {
                match ledger.mine() {
                    Ok(block) => debug!("Loop sealed {}", block.get_hash()),
                    Err(BlockchainError::EmptyPool) => debug!("Nothing to mine"),
                    Err(BlockchainError::Cancelled) => break,
                    Err(e) => warn!("Mining iteration failed: {e}"),
                }
                let started = Instant::now();
                while started.elapsed() < interval && !ledger.is_shut_down() {
                    thread::sleep(LOOP_TICK.min(interval));
                }
            }
            ledger.mining_loop.store(false, Ordering::SeqCst);
            info!("Mining loop stopped");
        });
        true
    }

}
