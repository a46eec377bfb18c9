// Path: crates/types/src/codec.rs
//! Defines the canonical, deterministic binary codec for all consensus-critical
//! data.
//!
//! This module provides thin wrappers around `parity-scale-codec` (SCALE),
//! chosen for its compact and deterministic properties. By centralizing the
//! codec logic here in the base `types` crate, every component uses the exact
//! same serialization format for anything that is hashed or signed, preventing
//! consensus failures due to different binary representations of the same data.

use parity_scale_codec::{Decode, DecodeAll, Encode};

/// Encodes a value into its canonical byte representation.
///
/// Use this for all data that is persisted, hashed, or signed. Two honest
/// validators encoding the same value always produce identical bytes.
pub fn to_bytes_canonical<T: Encode>(v: &T) -> Vec<u8> {
    v.encode()
}

/// Decodes a value from its canonical byte representation.
///
/// Fails fast on trailing bytes or any decoding error. In a consensus context
/// a lenient decoder is an attack surface, so `decode_all` is mandatory here.
pub fn from_bytes_canonical<T: Decode>(b: &[u8]) -> Result<T, String> {
    T::decode_all(&mut &*b).map_err(|e| format!("canonical decode failed: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[derive(Encode, Decode, Debug, PartialEq, Eq)]
    struct TestStruct {
        day: u32,
        tag: String,
        bytes: Vec<u8>,
    }

    #[test]
    fn canonical_roundtrip() {
        let original = TestStruct {
            day: 42,
            tag: "proof".to_string(),
            bytes: vec![1, 2, 3],
        };

        let encoded = to_bytes_canonical(&original);
        assert!(!encoded.is_empty());
        let decoded = from_bytes_canonical::<TestStruct>(&encoded).unwrap();
        assert_eq!(original, decoded);

        // BTreeMap encoding is ordered, so re-encoding is byte-identical.
        let mut map = BTreeMap::new();
        map.insert([2u8; 32], 7u64);
        map.insert([1u8; 32], 9u64);
        let a = to_bytes_canonical(&map);
        let b = to_bytes_canonical(&from_bytes_canonical::<BTreeMap<[u8; 32], u64>>(&a).unwrap());
        assert_eq!(a, b);
    }

    #[test]
    fn truncated_input_is_rejected() {
        let original = TestStruct {
            day: 9,
            tag: "x".to_string(),
            bytes: vec![10, 20, 30],
        };
        let mut encoded = to_bytes_canonical(&original);
        encoded.pop();
        let err = from_bytes_canonical::<TestStruct>(&encoded).unwrap_err();
        assert!(err.contains("canonical decode failed"));
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut encoded = to_bytes_canonical(&7u32);
        encoded.push(0xFF);
        assert!(from_bytes_canonical::<u32>(&encoded).is_err());
    }
}
