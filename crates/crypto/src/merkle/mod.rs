// Path: crates/crypto/src/merkle/mod.rs
//! Binary Merkle trees over erasure-coded fragments.
//!
//! Leaves are BLAKE3 hashes of the fragment bytes. Levels with an odd node
//! count duplicate their last node. Paths carry sibling hashes from leaf to
//! root; the verifier folds them using the leaf index to pick sides.

use crate::hash::{blake3_32, blake3_concat};
use conductor_types::error::CryptoError;

/// A fully materialized Merkle tree.
#[derive(Debug, Clone)]
pub struct MerkleTree {
    /// levels[0] is the leaf level; the last level holds the single root.
    levels: Vec<Vec<[u8; 32]>>,
}

impl MerkleTree {
    /// Builds a tree over fragment bytes.
    pub fn build<'a, I: IntoIterator<Item = &'a [u8]>>(fragments: I) -> Result<Self, CryptoError> {
        let leaves: Vec<[u8; 32]> = fragments.into_iter().map(blake3_32).collect();
        if leaves.is_empty() {
            return Err(CryptoError::InvalidParameters(
                "cannot build a merkle tree over zero fragments".to_string(),
            ));
        }
        let mut levels = vec![leaves];
        while levels
            .last()
            .map(|level| level.len() > 1)
            .unwrap_or(false)
        {
            let current = match levels.last() {
                Some(level) => level,
                None => break,
            };
            let mut next = Vec::with_capacity(current.len().div_ceil(2));
            for pair in current.chunks(2) {
                let left = pair[0];
                let right = *pair.get(1).unwrap_or(&pair[0]);
                next.push(blake3_concat([left.as_slice(), right.as_slice()]));
            }
            levels.push(next);
        }
        Ok(Self { levels })
    }

    /// The tree root.
    pub fn root(&self) -> [u8; 32] {
        self.levels
            .last()
            .and_then(|level| level.first())
            .copied()
            .unwrap_or([0u8; 32])
    }

    /// The sibling path for leaf `index`, from leaf level to just below the
    /// root.
    pub fn path(&self, index: usize) -> Result<Vec<[u8; 32]>, CryptoError> {
        let leaf_count = self.levels.first().map(|l| l.len()).unwrap_or(0);
        if index >= leaf_count {
            return Err(CryptoError::InvalidParameters(format!(
                "leaf index {} out of range ({} leaves)",
                index, leaf_count
            )));
        }
        let mut path = Vec::with_capacity(self.levels.len());
        let mut position = index;
        for level in &self.levels[..self.levels.len() - 1] {
            let sibling = if position % 2 == 0 {
                // Odd levels duplicate their last node.
                *level.get(position + 1).unwrap_or(&level[position])
            } else {
                level[position - 1]
            };
            path.push(sibling);
            position /= 2;
        }
        Ok(path)
    }
}

/// Verifies that `leaf_hash` at `index` anchors to `root` through `path`.
pub fn merkle_verify(leaf_hash: [u8; 32], index: usize, path: &[[u8; 32]], root: [u8; 32]) -> bool {
    let mut current = leaf_hash;
    let mut position = index;
    for sibling in path {
        current = if position % 2 == 0 {
            blake3_concat([current.as_slice(), sibling.as_slice()])
        } else {
            blake3_concat([sibling.as_slice(), current.as_slice()])
        };
        position /= 2;
    }
    current == root
}
