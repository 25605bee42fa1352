//! Test utilities for ledger testing

use crate::config::MiningSettings;
use crate::core::{Block, Blockchain, LedgerOptions, Transaction, TransactionRequest};
use crate::error::{BlockchainError, Result};
use crate::network::{OfflinePeers, PeerClient, RetryPolicy};
use crate::storage::{MemorySnapshotStore, SledSnapshotStore};
use crate::wallet::Wallet;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, Weak};
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// Test configuration for ledger testing
pub struct TestConfig {
    pub difficulty: usize,
    pub reward: f32,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            difficulty: 1, // Easy difficulty for fast testing
            reward: 1.0,
        }
    }
}

impl TestConfig {
    fn options(&self, address: &str, port: u16) -> LedgerOptions {
        let mut options = LedgerOptions::new(address, port);
        options.mining = MiningSettings {
            difficulty: self.difficulty,
            reward: self.reward,
            interval_secs: 1,
            ..MiningSettings::default()
        };
        options.retry = RetryPolicy::new(2, Duration::from_millis(5));
        options
    }
}

/// Create a standalone in-memory ledger
pub fn create_test_ledger(address: &str) -> Result<Blockchain> {
    Blockchain::new(
        TestConfig::default().options(address, 5001),
        Arc::new(MemorySnapshotStore::new()),
        Arc::new(OfflinePeers),
    )
}

/// Create a ledger backed by sled in a temporary directory
pub fn create_persistent_ledger(address: &str) -> Result<(Blockchain, TempDir)> {
    let temp_dir = tempfile::tempdir()?;
    let store = SledSnapshotStore::open(&temp_dir.path().join("node_5001"))?;
    let ledger = Blockchain::open(
        TestConfig::default().options(address, 5001),
        Arc::new(store),
        Arc::new(OfflinePeers),
    )?;
    Ok((ledger, temp_dir))
}

/// Give `address` `amount` coins by sealing a system transfer to it
pub fn fund(ledger: &Blockchain, address: &str, amount: f32) -> Result<Block> {
    ledger.add_transaction(Transaction::new_reward(address, amount), None, None)?;
    ledger.mine()
}

/// A signed client request moving `value` from `wallet` to `recipient`
pub fn signed_request(wallet: &Wallet, recipient: &str, value: f32) -> Result<TransactionRequest> {
    let transaction = Transaction::new(&wallet.get_address(), recipient, "test transfer", value);
    let signature = wallet.sign_transaction(&transaction)?;
    Ok(TransactionRequest::from_signed(
        &transaction,
        &wallet.get_public_key()?,
        &signature,
    ))
}

/// Polls `condition` until it holds or `timeout` passes
pub fn wait_until<F: Fn() -> bool>(timeout: Duration, condition: F) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    condition()
}

/// Routes peer calls straight into other in-process ledgers by name
#[derive(Default, Clone)]
pub struct LocalNetwork {
    nodes: Arc<RwLock<HashMap<String, Weak<Blockchain>>>>,
}

impl LocalNetwork {
    fn lookup(&self, neighbor: &str) -> Result<Arc<Blockchain>> {
        self.nodes
            .read()
            .map_err(|_| BlockchainError::Network("network lock poisoned".to_string()))?
            .get(neighbor)
            .and_then(Weak::upgrade)
            .ok_or_else(|| BlockchainError::Network(format!("{neighbor} is not on the network")))
    }

    /// Starts `count` ledgers named `node-0`, `node-1`, ... each listing
    /// all the others as neighbors
    pub fn spawn(count: usize) -> Result<(LocalNetwork, Vec<Arc<Blockchain>>)> {
        let network = LocalNetwork::default();
        let names: Vec<String> = (0..count).map(|i| format!("node-{i}")).collect();
        let mut ledgers = Vec::new();

        for (i, name) in names.iter().enumerate() {
            let mut options = TestConfig::default().options(name, 5001 + i as u16);
            options.neighbors = names.iter().filter(|n| *n != name).cloned().collect();
            let ledger = Arc::new(Blockchain::new(
                options,
                Arc::new(MemorySnapshotStore::new()),
                Arc::new(network.clone()),
            )?);
            network
                .nodes
                .write()
                .map_err(|_| BlockchainError::Network("network lock poisoned".to_string()))?
                .insert(name.clone(), Arc::downgrade(&ledger));
            ledgers.push(ledger);
        }
        Ok((network, ledgers))
    }
}

impl PeerClient for LocalNetwork {
    fn fetch_chain(&self, neighbor: &str) -> Result<Vec<Block>> {
        Ok(self.lookup(neighbor)?.chain())
    }

    fn request_consensus(&self, neighbor: &str) -> Result<()> {
        self.lookup(neighbor)?.resolve_conflicts();
        Ok(())
    }

    fn clear_pool(&self, neighbor: &str) -> Result<()> {
        self.lookup(neighbor)?.clear_transaction_pool();
        Ok(())
    }

    fn relay_transaction(&self, neighbor: &str, request: &TransactionRequest) -> Result<()> {
        self.lookup(neighbor)?.add_transaction_request(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::balance_of;
    use crate::storage::load_or_none;
    use std::collections::BTreeSet;

    const SETTLE: Duration = Duration::from_secs(10);

    #[test]
    fn test_mined_block_propagates_to_neighbors() {
        let (_network, ledgers) = LocalNetwork::spawn(3).unwrap();
        let miner = &ledgers[0];

        for ledger in &ledgers {
            ledger
                .add_transaction(Transaction::new_registration("alice"), None, None)
                .unwrap();
        }
        miner.mine().unwrap();

        for ledger in &ledgers[1..] {
            assert!(wait_until(SETTLE, || ledger.chain() == miner.chain()));
            assert!(wait_until(SETTLE, || ledger.transaction_pool().is_empty()));
        }
    }

    #[test]
    fn test_client_transaction_is_relayed() {
        let (_network, ledgers) = LocalNetwork::spawn(2).unwrap();
        let wallet = Wallet::new().unwrap();
        fund(&ledgers[0], &wallet.get_address(), 10.0).unwrap();
        assert!(wait_until(SETTLE, || ledgers[1].chain_len() == 2));

        let request = signed_request(&wallet, "bob", 4.0).unwrap();
        ledgers[0].create_transaction(&request).unwrap();

        assert_eq!(ledgers[0].transaction_pool().len(), 1);
        assert!(wait_until(SETTLE, || ledgers[1].transaction_pool().len() == 1));
    }

    #[test]
    fn test_spend_then_balances() {
        let ledger = create_test_ledger("miner").unwrap();
        let wallet = Wallet::new().unwrap();
        fund(&ledger, &wallet.get_address(), 10.0).unwrap();

        let request = signed_request(&wallet, "bob", 4.0).unwrap();
        ledger.create_transaction(&request).unwrap();
        ledger.mine().unwrap();

        assert_eq!(ledger.calculate_total_amount(&wallet.get_address()), Ok(6.0));
        assert_eq!(ledger.calculate_total_amount("bob"), Ok(4.0));
        assert_eq!(ledger.calculate_total_amount("miner"), Ok(2.0));
    }

    #[test]
    fn test_overspend_is_rejected() {
        let ledger = create_test_ledger("miner").unwrap();
        let wallet = Wallet::new().unwrap();
        fund(&ledger, &wallet.get_address(), 3.0).unwrap();

        let request = signed_request(&wallet, "bob", 4.0).unwrap();
        assert_eq!(
            ledger.create_transaction(&request),
            Err(BlockchainError::InsufficientBalance {
                required: 4.0,
                available: 3.0
            })
        );
    }

    #[test]
    fn test_rewards_conserve_total_supply() {
        let ledger = create_test_ledger("miner").unwrap();
        let wallets: Vec<Wallet> = (0..3).map(|_| Wallet::new().unwrap()).collect();
        for wallet in &wallets {
            ledger.register_new_wallet(&wallet.get_address()).unwrap();
        }
        let mined = ledger.chain_len() - 1;

        let chain = ledger.chain();
        let addresses: BTreeSet<String> = chain
            .iter()
            .flat_map(|b| b.get_transactions())
            .flat_map(|tx| [tx.get_sender().to_string(), tx.get_recipient().to_string()])
            .filter(|a| a != crate::core::MINING_SENDER)
            .collect();
        let total: f32 = addresses
            .iter()
            .filter_map(|a| balance_of(&chain, a))
            .sum();
        assert_eq!(total, mined as f32 * 1.0);
        assert_eq!(ledger.get_wallets().len(), 3);
    }

    #[test]
    fn test_persistent_ledger_reloads() {
        let (ledger, dir) = create_persistent_ledger("miner").unwrap();
        fund(&ledger, "alice", 2.0).unwrap();
        let chain = ledger.chain();
        drop(ledger);

        let store = SledSnapshotStore::open(&dir.path().join("node_5001")).unwrap();
        let snapshot = load_or_none(&store).unwrap();
        assert_eq!(snapshot.chain, chain);
    }
}
