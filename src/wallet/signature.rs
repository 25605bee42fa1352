use crate::error::{BlockchainError, Result};
use crate::utils::hex_decode;
use num_bigint::BigUint;
use std::fmt;

/// Bytes per curve coordinate / signature component on P-256
pub const COMPONENT_LEN: usize = 32;
/// Hex characters in a signature or public key on the wire
pub const WIRE_HEX_LEN: usize = 4 * COMPONENT_LEN;

const UNCOMPRESSED_TAG: u8 = 0x04;

/// ECDSA signature as the pair of integers (R, S).
///
/// Serializes to 128 hex characters: R then S, each zero-padded to 32 bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    r: BigUint,
    s: BigUint,
}

impl Signature {
    /// Parses the fixed-width R || S form ring produces.
    pub fn from_bytes(bytes: &[u8]) -> Result<Signature> {
        if bytes.len() != 2 * COMPONENT_LEN {
            return Err(BlockchainError::InvalidSignature(format!(
                "invalid signature length: got {} bytes, expected {}",
                bytes.len(),
                2 * COMPONENT_LEN
            )));
        }
        Ok(Signature {
            r: BigUint::from_bytes_be(&bytes[..COMPONENT_LEN]),
            s: BigUint::from_bytes_be(&bytes[COMPONENT_LEN..]),
        })
    }

    pub fn from_hex(s: &str) -> Result<Signature> {
        let (r, s) = split_hex_pair(s, "signature")
            .map_err(|e| BlockchainError::InvalidSignature(e.to_string()))?;
        Signature::from_bytes(&[r, s].concat())
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = pad_component(&self.r);
        bytes.extend(pad_component(&self.s));
        bytes
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:064x}{:064x}", self.r, self.s)
    }
}

/// P-256 public point. The wire form is X || Y in hex without the `04` tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey {
    x: [u8; COMPONENT_LEN],
    y: [u8; COMPONENT_LEN],
}

impl PublicKey {
    pub fn from_hex(s: &str) -> Result<PublicKey> {
        let (x, y) = split_hex_pair(s, "public key")?;
        Ok(PublicKey { x, y })
    }

    /// Accepts ring's 65-byte uncompressed encoding or the bare 64-byte X || Y.
    pub fn from_uncompressed(bytes: &[u8]) -> Result<PublicKey> {
        let body = match bytes.len() {
            65 if bytes[0] == UNCOMPRESSED_TAG => &bytes[1..],
            64 => bytes,
            n => {
                return Err(BlockchainError::Crypto(format!(
                    "invalid public key length: got {n} bytes, expected 64 or 65"
                )))
            }
        };
        let mut x = [0u8; COMPONENT_LEN];
        let mut y = [0u8; COMPONENT_LEN];
        x.copy_from_slice(&body[..COMPONENT_LEN]);
        y.copy_from_slice(&body[COMPONENT_LEN..]);
        Ok(PublicKey { x, y })
    }

    /// X || Y, the bytes the address is derived from.
    pub fn coordinates(&self) -> Vec<u8> {
        [self.x.as_slice(), self.y.as_slice()].concat()
    }

    /// `04` || X || Y, the encoding ring verifies against.
    pub fn to_uncompressed(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(1 + 2 * COMPONENT_LEN);
        bytes.push(UNCOMPRESSED_TAG);
        bytes.extend_from_slice(&self.x);
        bytes.extend_from_slice(&self.y);
        bytes
    }

    pub fn to_hex(&self) -> String {
        crate::utils::hex_encode(&self.coordinates())
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

fn pad_component(value: &BigUint) -> Vec<u8> {
    let raw = value.to_bytes_be();
    let mut padded = vec![0u8; COMPONENT_LEN.saturating_sub(raw.len())];
    padded.extend(raw);
    padded
}

fn split_hex_pair(s: &str, what: &str) -> Result<([u8; COMPONENT_LEN], [u8; COMPONENT_LEN])> {
    if s.len() != WIRE_HEX_LEN {
        return Err(BlockchainError::Crypto(format!(
            "invalid {what} length: got {} characters, expected {WIRE_HEX_LEN}",
            s.len()
        )));
    }
    let bytes = hex_decode(s)?;
    let mut first = [0u8; COMPONENT_LEN];
    let mut second = [0u8; COMPONENT_LEN];
    first.copy_from_slice(&bytes[..COMPONENT_LEN]);
    second.copy_from_slice(&bytes[COMPONENT_LEN..]);
    Ok((first, second))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_hex_is_zero_padded() {
        let mut raw = vec![0u8; 2 * COMPONENT_LEN];
        raw[COMPONENT_LEN - 1] = 1;
        raw[2 * COMPONENT_LEN - 1] = 255;
        let sig = Signature::from_bytes(&raw).unwrap();
        let text = sig.to_string();
        assert_eq!(text.len(), WIRE_HEX_LEN);
        assert!(text.starts_with(&"0".repeat(63)));
        assert!(text.ends_with("00ff"));
        assert_eq!(Signature::from_hex(&text).unwrap(), sig);
        assert_eq!(sig.to_bytes(), raw);
    }

    #[test]
    fn test_signature_rejects_wrong_length() {
        assert!(matches!(
            Signature::from_hex("abcd"),
            Err(BlockchainError::InvalidSignature(_))
        ));
    }

    #[test]
    fn test_public_key_uncompressed_forms_agree() {
        let mut raw = vec![UNCOMPRESSED_TAG];
        raw.extend((0..64).map(|i| i as u8));
        let tagged = PublicKey::from_uncompressed(&raw).unwrap();
        let bare = PublicKey::from_uncompressed(&raw[1..]).unwrap();
        assert_eq!(tagged, bare);
        assert_eq!(tagged.to_uncompressed(), raw);
        assert_eq!(PublicKey::from_hex(&tagged.to_hex()).unwrap(), tagged);
    }

    #[test]
    fn test_public_key_rejects_non_hex() {
        let bad = "g".repeat(WIRE_HEX_LEN);
        assert!(PublicKey::from_hex(&bad).is_err());
    }
}
