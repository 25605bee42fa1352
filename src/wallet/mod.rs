//! Wallet keys and wire formats
//!
//! Key pair generation, address encoding, and the hex encodings for
//! signatures and public keys that transaction requests carry.

pub mod signature;
#[allow(clippy::module_inception)]
pub mod wallet;

pub use signature::{PublicKey, Signature, WIRE_HEX_LEN};
pub use wallet::{
    address_from_public_key, convert_address, hash_pub_key, sign_with_private_key,
    validate_address, Wallet, ADDRESS_CHECK_SUM_LEN,
};
