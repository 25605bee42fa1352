//! Utility functions and helpers
//!
//! Hashing, encodings, ECDSA helpers and the bincode layer used for the
//! node wallet record.

pub mod crypto;
pub mod serialization;

pub use crypto::{
    base58_decode, base58_encode, current_timestamp, ecdsa_p256_sha256_sign_digest,
    ecdsa_p256_sha256_sign_verify, ecdsa_p256_sha256_sign_with_keys, hex_decode, hex_encode,
    new_key_pair, ripemd160_digest, sha256_digest, sha256_hex,
};

pub use serialization::{deserialize, serialize};
