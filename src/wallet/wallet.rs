use crate::core::Transaction;
use crate::error::{BlockchainError, Result};
use crate::utils::{ecdsa_p256_sha256_sign_digest, ecdsa_p256_sha256_sign_with_keys, hex_decode};
use crate::wallet::{PublicKey, Signature};
use ring::rand::SystemRandom;
use ring::signature::{EcdsaKeyPair, KeyPair, ECDSA_P256_SHA256_FIXED_SIGNING};
use zeroize::ZeroizeOnDrop;

const VERSION: u8 = 0x00;
pub const ADDRESS_CHECK_SUM_LEN: usize = 4;

// ring's P-256 PKCS#8 v1 document: 36-byte header, `04 20` OCTET STRING tag
// at 34..36, then the 32-byte private scalar.
const PKCS8_SCALAR_TAG: [u8; 2] = [0x04, 0x20];
const PKCS8_SCALAR_OFFSET: usize = 36;
const PRIVATE_KEY_LEN: usize = 32;

/// A P-256 key pair and the address derived from it.
#[derive(Clone, bincode::Encode, bincode::Decode, ZeroizeOnDrop)]
pub struct Wallet {
    pkcs8: Vec<u8>,
    public_key: Vec<u8>,
}

impl Wallet {
    pub fn new() -> Result<Wallet> {
        let pkcs8 = crate::utils::new_key_pair()?;
        let rng = SystemRandom::new();
        let key_pair =
            EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, pkcs8.as_ref(), &rng)
                .map_err(|e| {
                    BlockchainError::Crypto(format!("Failed to create key pair from PKCS8: {e}"))
                })?;
        let public_key = key_pair.public_key().as_ref().to_vec();
        Ok(Wallet { pkcs8, public_key })
    }

    pub fn get_address(&self) -> String {
        match self.get_public_key() {
            Ok(public_key) => address_from_public_key(&public_key),
            // ring always hands back a 65-byte point, so this arm is unreachable
            // for wallets built by `new`.
            Err(_) => convert_address(&hash_pub_key(&self.public_key)),
        }
    }

    pub fn get_public_key(&self) -> Result<PublicKey> {
        PublicKey::from_uncompressed(&self.public_key)
    }

    /// Hex X || Y, 128 characters.
    pub fn public_key_hex(&self) -> Result<String> {
        Ok(self.get_public_key()?.to_hex())
    }

    /// Hex private scalar, 64 characters.
    pub fn private_key_hex(&self) -> Result<String> {
        let end = PKCS8_SCALAR_OFFSET + PRIVATE_KEY_LEN;
        if self.pkcs8.len() < end
            || self.pkcs8[PKCS8_SCALAR_OFFSET - 2..PKCS8_SCALAR_OFFSET] != PKCS8_SCALAR_TAG
        {
            return Err(BlockchainError::Wallet(
                "Unexpected PKCS#8 layout for P-256 key".to_string(),
            ));
        }
        Ok(crate::utils::hex_encode(
            &self.pkcs8[PKCS8_SCALAR_OFFSET..end],
        ))
    }

    /// Signs the canonical serialization of `transaction`.
    pub fn sign_transaction(&self, transaction: &Transaction) -> Result<Signature> {
        let payload = transaction.canonical_bytes()?;
        let raw = ecdsa_p256_sha256_sign_digest(&self.pkcs8, &payload)?;
        Signature::from_bytes(&raw)
    }
}

/// Signs `transaction` with keys supplied on the wire (`POST /sign`).
pub fn sign_with_private_key(
    private_key_hex: &str,
    public_key: &PublicKey,
    transaction: &Transaction,
) -> Result<Signature> {
    let scalar = hex_decode(private_key_hex)?;
    if scalar.len() > PRIVATE_KEY_LEN {
        return Err(BlockchainError::Crypto(format!(
            "invalid private key length: got {} bytes, expected {PRIVATE_KEY_LEN}",
            scalar.len()
        )));
    }
    let mut padded = vec![0u8; PRIVATE_KEY_LEN - scalar.len()];
    padded.extend(scalar);

    let payload = transaction.canonical_bytes()?;
    let raw = ecdsa_p256_sha256_sign_with_keys(&padded, &public_key.to_uncompressed(), &payload)?;
    Signature::from_bytes(&raw)
}

pub fn hash_pub_key(pub_key: &[u8]) -> Vec<u8> {
    let pub_key_sha256 = crate::utils::sha256_digest(pub_key);
    crate::utils::ripemd160_digest(pub_key_sha256.as_slice())
}

/// Base58Check address over RIPEMD160(SHA256(X || Y)).
pub fn address_from_public_key(public_key: &PublicKey) -> String {
    convert_address(&hash_pub_key(&public_key.coordinates()))
}

fn checksum(payload: &[u8]) -> Vec<u8> {
    let first_sha = crate::utils::sha256_digest(payload);
    let second_sha = crate::utils::sha256_digest(first_sha.as_slice());
    second_sha[0..ADDRESS_CHECK_SUM_LEN].to_vec()
}

pub fn validate_address(address: &str) -> bool {
    let payload = match crate::utils::base58_decode(address) {
        Ok(payload) => payload,
        Err(_) => return false,
    };

    if payload.len() < ADDRESS_CHECK_SUM_LEN + 1 {
        return false;
    }

    let split = payload.len() - ADDRESS_CHECK_SUM_LEN;
    let target_checksum = checksum(&payload[..split]);
    payload[split..].eq(target_checksum.as_slice())
}

pub fn convert_address(pub_hash_key: &[u8]) -> String {
    let mut payload: Vec<u8> = vec![];
    payload.push(VERSION);
    payload.extend(pub_hash_key);
    let checksum = checksum(payload.as_slice());
    payload.extend(checksum.as_slice());
    // version + pub_key_hash + checksum
    crate::utils::base58_encode(payload.as_slice())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transfer() -> Transaction {
        Transaction::new("sender", "recipient", "rent", 3.5)
    }

    #[test]
    fn test_address_is_valid_base58check() {
        let wallet = Wallet::new().unwrap();
        let address = wallet.get_address();
        assert!(address.starts_with('1'));
        assert!(validate_address(&address));
        assert!(!validate_address("not-an-address"));
        assert_eq!(
            address_from_public_key(&wallet.get_public_key().unwrap()),
            address
        );
        let other = Wallet::new().unwrap();
        assert_ne!(
            address_from_public_key(&other.get_public_key().unwrap()),
            address
        );
    }

    #[test]
    fn test_key_hex_lengths() {
        let wallet = Wallet::new().unwrap();
        assert_eq!(wallet.public_key_hex().unwrap().len(), 128);
        assert_eq!(wallet.private_key_hex().unwrap().len(), 64);
    }

    #[test]
    fn test_wallet_signature_verifies() {
        let wallet = Wallet::new().unwrap();
        let tx = transfer();
        let signature = wallet.sign_transaction(&tx).unwrap();
        assert!(tx.verify_signature(&wallet.get_public_key().unwrap(), &signature));
    }

    #[test]
    fn test_sign_with_exported_keys() {
        let wallet = Wallet::new().unwrap();
        let public_key = wallet.get_public_key().unwrap();
        let tx = transfer();

        let signature =
            sign_with_private_key(&wallet.private_key_hex().unwrap(), &public_key, &tx).unwrap();
        assert!(tx.verify_signature(&public_key, &signature));
    }

    #[test]
    fn test_sign_with_mismatched_public_key_fails() {
        let wallet = Wallet::new().unwrap();
        let other = Wallet::new().unwrap();
        let result = sign_with_private_key(
            &wallet.private_key_hex().unwrap(),
            &other.get_public_key().unwrap(),
            &transfer(),
        );
        assert!(result.is_err());
    }
}
