// Path: crates/crypto/src/hash/mod.rs
//! BLAKE3 hashing helpers.
//!
//! Every hash in the protocol goes through these two functions so that the
//! digest algorithm has exactly one point of change.

/// Hashes `data` with BLAKE3 and returns the 32-byte digest.
pub fn blake3_32<T: AsRef<[u8]>>(data: T) -> [u8; 32] {
    *blake3::hash(data.as_ref()).as_bytes()
}

/// Hashes the concatenation of `parts` without materializing it.
pub fn blake3_concat<'a, I: IntoIterator<Item = &'a [u8]>>(parts: I) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    for part in parts {
        hasher.update(part);
    }
    *hasher.finalize().as_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_stable() {
        assert_eq!(blake3_32(b"conductor"), blake3_32(b"conductor"));
        assert_ne!(blake3_32(b"conductor"), blake3_32(b"Conductor"));
    }

    #[test]
    fn concat_matches_contiguous_hash() {
        let whole = blake3_32(b"hello world");
        let parts = blake3_concat([b"hello".as_slice(), b" ".as_slice(), b"world".as_slice()]);
        assert_eq!(whole, parts);
    }
}
