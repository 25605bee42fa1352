// Transactions are plain value transfers between two addresses.
// There are no inputs/outputs to track: a balance is simply everything an
// address ever received minus everything it ever sent.

use crate::core::{MINING_REWARD_MESSAGE, MINING_SENDER, REGISTER_WALLET_MESSAGE};
use crate::error::{BlockchainError, Result};
use crate::utils::{ecdsa_p256_sha256_sign_verify, sha256_hex};
use crate::wallet::{PublicKey, Signature};
use serde::{Deserialize, Serialize};

// Field order here is the canonical order: signatures and block hashes are
// computed over the JSON these fields produce, so it must not change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    message: String,
    #[serde(rename = "recipientBlockchainAddress")]
    recipient: String,
    #[serde(rename = "senderBlockchainAddress")]
    sender: String,
    value: f32,
}

impl Transaction {
    pub fn new(sender: &str, recipient: &str, message: &str, value: f32) -> Transaction {
        Transaction {
            message: message.to_string(),
            recipient: recipient.to_string(),
            sender: sender.to_string(),
            value,
        }
    }

    // The reward the system pays whoever sealed a block
    pub fn new_reward(miner_address: &str, reward: f32) -> Transaction {
        Transaction::new(MINING_SENDER, miner_address, MINING_REWARD_MESSAGE, reward)
    }

    // The zero-value marker that makes an address show up as a registered wallet
    pub fn new_registration(address: &str) -> Transaction {
        Transaction::new(MINING_SENDER, address, REGISTER_WALLET_MESSAGE, 0.0)
    }

    pub fn get_sender(&self) -> &str {
        self.sender.as_str()
    }

    pub fn get_recipient(&self) -> &str {
        self.recipient.as_str()
    }

    pub fn get_message(&self) -> &str {
        self.message.as_str()
    }

    pub fn get_value(&self) -> f32 {
        self.value
    }

    // System transactions skip signature and balance checks entirely
    pub fn is_system(&self) -> bool {
        self.sender == MINING_SENDER
    }

    pub fn is_registration(&self) -> bool {
        self.is_system() && self.message == REGISTER_WALLET_MESSAGE
    }

    // This is exactly what gets signed and what gets hashed into a block
    pub fn canonical_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Hex SHA-256 of the canonical serialization; identifies the transfer
    /// independently of when it was made.
    pub fn id(&self) -> Result<String> {
        Ok(sha256_hex(&self.canonical_bytes()?))
    }

    pub fn verify_signature(&self, public_key: &PublicKey, signature: &Signature) -> bool {
        match self.canonical_bytes() {
            Ok(payload) => ecdsa_p256_sha256_sign_verify(
                &public_key.to_uncompressed(),
                &signature.to_bytes(),
                &payload,
            ),
            Err(e) => {
                log::error!("Failed to serialize transaction for verification: {e}");
                false
            }
        }
    }
}

/// A transfer as clients and peers submit it: the transaction fields plus
/// the sender's credentials in their hex wire forms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    pub sender_blockchain_address: Option<String>,
    pub recipient_blockchain_address: Option<String>,
    pub message: Option<String>,
    pub value: Option<f32>,
    pub sender_public_key: Option<String>,
    pub signature: Option<String>,
}

impl TransactionRequest {
    pub fn from_signed(
        transaction: &Transaction,
        public_key: &PublicKey,
        signature: &Signature,
    ) -> TransactionRequest {
        TransactionRequest {
            sender_blockchain_address: Some(transaction.sender.clone()),
            recipient_blockchain_address: Some(transaction.recipient.clone()),
            message: Some(transaction.message.clone()),
            value: Some(transaction.value),
            sender_public_key: Some(public_key.to_hex()),
            signature: Some(signature.to_string()),
        }
    }

    /// Every field must be present and the text fields non-empty.
    pub fn validate(&self) -> bool {
        let present = |field: &Option<String>| field.as_deref().is_some_and(|v| !v.is_empty());
        present(&self.sender_blockchain_address)
            && present(&self.recipient_blockchain_address)
            && present(&self.message)
            && present(&self.sender_public_key)
            && present(&self.signature)
            && self.value.is_some()
    }

    pub fn to_transaction(&self) -> Result<Transaction> {
        if !self.validate() {
            return Err(BlockchainError::Serialization(
                "missing field(s) in transaction request".to_string(),
            ));
        }
        Ok(Transaction::new(
            self.sender_blockchain_address.as_deref().unwrap_or_default(),
            self.recipient_blockchain_address
                .as_deref()
                .unwrap_or_default(),
            self.message.as_deref().unwrap_or_default(),
            self.value.unwrap_or_default(),
        ))
    }

    pub fn credentials(&self) -> Result<(PublicKey, Signature)> {
        let public_key = PublicKey::from_hex(self.sender_public_key.as_deref().unwrap_or_default())
            .map_err(|e| BlockchainError::InvalidSignature(format!("sender public key: {e}")))?;
        let signature = Signature::from_hex(self.signature.as_deref().unwrap_or_default())?;
        Ok((public_key, signature))
    }
}
