use crate::core::Transaction;
use crate::error::{BlockchainError, Result};
use crate::utils::{current_timestamp, sha256_hex};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

// The all-zero block: timestamp 0, no transactions, empty prevHash, nonce 0.
// Its hash is the prevHash every genesis block points at.
const SENTINEL_BLOCK_JSON: &str = r#"{"timestamp":0,"transactions":[],"prevHash":"","nonce":0}"#;

pub static GENESIS_PREV_HASH: Lazy<String> =
    Lazy::new(|| sha256_hex(SENTINEL_BLOCK_JSON.as_bytes()));

// The serialized form never carries the hash. A decoded block recomputes it,
// so a tampered field shows up as a broken link rather than a stale hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BlockFields")]
pub struct Block {
    timestamp: i64,
    transactions: Vec<Transaction>,
    #[serde(rename = "prevHash")]
    prev_hash: String,
    nonce: u64,
    #[serde(skip)]
    hash: String,
}

#[derive(Deserialize)]
struct BlockFields {
    timestamp: i64,
    transactions: Vec<Transaction>,
    #[serde(rename = "prevHash")]
    prev_hash: String,
    nonce: u64,
}

impl TryFrom<BlockFields> for Block {
    type Error = BlockchainError;

    fn try_from(fields: BlockFields) -> Result<Block> {
        Block::from_parts(
            fields.timestamp,
            fields.transactions,
            fields.prev_hash,
            fields.nonce,
        )
    }
}

impl Block {
    /// Candidate block stamped with the current time and nonce 0.
    pub fn new(transactions: Vec<Transaction>, prev_hash: String) -> Result<Block> {
        Block::from_parts(current_timestamp()?, transactions, prev_hash, 0)
    }

    pub fn from_parts(
        timestamp: i64,
        transactions: Vec<Transaction>,
        prev_hash: String,
        nonce: u64,
    ) -> Result<Block> {
        let mut block = Block {
            timestamp,
            transactions,
            prev_hash,
            nonce,
            hash: String::new(),
        };
        block.hash = block.calculate_hash()?;
        Ok(block)
    }

    /// First block of every chain: no transactions, nonce 0, linked to the
    /// sentinel hash. It is exempt from proof-of-work.
    pub fn genesis() -> Result<Block> {
        Block::new(Vec::new(), GENESIS_PREV_HASH.clone())
    }

    pub fn calculate_hash(&self) -> Result<String> {
        Ok(sha256_hex(&self.canonical_bytes()?))
    }

    pub fn canonical_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub(crate) fn set_proof(&mut self, nonce: u64, hash: String) {
        self.nonce = nonce;
        self.hash = hash;
    }

    pub fn get_timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn get_transactions(&self) -> &[Transaction] {
        self.transactions.as_slice()
    }

    pub fn get_prev_hash(&self) -> &str {
        self.prev_hash.as_str()
    }

    pub fn get_nonce(&self) -> u64 {
        self.nonce
    }

    pub fn get_hash(&self) -> &str {
        self.hash.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinel_hash_matches_serialized_empty_block() {
        let sentinel = Block::from_parts(0, Vec::new(), String::new(), 0).unwrap();
        assert_eq!(
            String::from_utf8(sentinel.canonical_bytes().unwrap()).unwrap(),
            SENTINEL_BLOCK_JSON
        );
        assert_eq!(sentinel.get_hash(), GENESIS_PREV_HASH.as_str());
    }

    #[test]
    fn test_genesis_links_to_sentinel() {
        let genesis = Block::genesis().unwrap();
        assert_eq!(genesis.get_prev_hash(), GENESIS_PREV_HASH.as_str());
        assert_eq!(genesis.get_nonce(), 0);
        assert!(genesis.get_transactions().is_empty());
        assert_eq!(genesis.get_hash().len(), 64);
    }

    #[test]
    fn test_serialization_omits_hash() {
        let block = Block::from_parts(
            42,
            vec![Transaction::new_reward("miner", 1.0)],
            "ab".to_string(),
            7,
        )
        .unwrap();
        let json = serde_json::to_string(&block).unwrap();
        assert!(json.starts_with(r#"{"timestamp":42,"transactions":["#));
        assert!(json.ends_with(r#""prevHash":"ab","nonce":7}"#));
        assert!(!json.contains("\"hash\""));
    }

    #[test]
    fn test_decode_recomputes_hash() {
        let block = Block::from_parts(
            42,
            vec![Transaction::new("a", "b", "m", 1.5)],
            "ab".to_string(),
            7,
        )
        .unwrap();
        let decoded: Block = serde_json::from_str(&serde_json::to_string(&block).unwrap()).unwrap();
        assert_eq!(decoded, block);
        assert_eq!(decoded.get_hash(), block.get_hash());
    }

    #[test]
    fn test_hash_changes_with_nonce() {
        let a = Block::from_parts(1, Vec::new(), "p".to_string(), 1).unwrap();
        let b = Block::from_parts(1, Vec::new(), "p".to_string(), 2).unwrap();
        assert_ne!(a.get_hash(), b.get_hash());
    }
}
