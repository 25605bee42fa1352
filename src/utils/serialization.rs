// Binary encoding for records that never leave the node (the wallet record).
// Anything on the wire or in the snapshot goes through serde_json instead.
use crate::error::{BlockchainError, Result};

/// Encode with bincode's standard configuration
pub fn serialize<T: bincode::Encode>(data: &T) -> Result<Vec<u8>> {
    let config = bincode::config::standard();
    bincode::encode_to_vec(data, config)
        .map_err(|e| BlockchainError::Serialization(format!("Serialization failed: {e}")))
}

/// Decode with bincode's standard configuration
pub fn deserialize<T>(bytes: &[u8]) -> Result<T>
where
    T: bincode::Decode<()>,
{
    let config = bincode::config::standard();
    let (data, _) = bincode::decode_from_slice(bytes, config)
        .map_err(|e| BlockchainError::Serialization(format!("Deserialization failed: {e}")))?;
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, bincode::Encode, bincode::Decode)]
    struct KeyRecord {
        label: String,
        secret: Vec<u8>,
    }

    #[test]
    fn test_record_survives_encoding() {
        let original = KeyRecord {
            label: "miner".to_string(),
            secret: vec![7; 32],
        };

        let bytes = serialize(&original).expect("Serialization should work");
        let decoded: KeyRecord = deserialize(&bytes).expect("Deserialization should work");

        assert_eq!(original, decoded);
    }

    #[test]
    fn test_deserialize_invalid_data() {
        let invalid_bytes = vec![0xFF, 0xFF, 0xFF, 0xFF];
        let result: Result<KeyRecord> = deserialize(&invalid_bytes);
        assert!(result.is_err());
    }
}
