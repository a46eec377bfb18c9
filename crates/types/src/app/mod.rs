// Path: crates/types/src/app/mod.rs
//! Core application-level data structures shared across the workspace.

use parity_scale_codec::{Decode, Encode};
use std::collections::BTreeSet;
use std::fmt;

mod consensus;
mod events;
mod messages;

pub use consensus::{Block, DayProof, QuorumCertificate, SignatureShare};
pub use events::{Event, EventBatch, EventPayload, MembershipKind, MembershipUpdate};
pub use messages::{blacklist_vote_signing_bytes, Fragment, PeerMessage};

/// The genesis seed for the mainnet day chain (ASCII bytes).
pub const GENESIS_SEED: &[u8] = b"chorus_mainnet_v1_genesis_20241023";
/// The genesis timestamp: 2024-10-23T00:00:00Z, in epoch seconds.
pub const GENESIS_TIMESTAMP: u64 = 1_729_670_400;
/// Seconds per day interval.
pub const SECONDS_PER_DAY: u64 = 86_400;
/// Default VDF iteration count, targeting roughly 24 hours on reference
/// hardware. Overridable via configuration and rescaled by difficulty
/// adjustment.
pub const DEFAULT_VDF_ITERATIONS: u64 = 2_000_000_000;

/// A validator's identity: its raw Ed25519 public key.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Encode, Decode)]
pub struct ValidatorId(pub [u8; 32]);

impl ValidatorId {
    /// Returns the raw key bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl AsRef<[u8]> for ValidatorId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for ValidatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ValidatorId(0x{})", hex::encode(&self.0[..4]))
    }
}

impl fmt::Display for ValidatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(&self.0[..4]))
    }
}

/// A detached Ed25519 signature.
#[derive(Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub struct Signature64(pub [u8; 64]);

impl Signature64 {
    /// Returns the raw signature bytes.
    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }
}

impl fmt::Debug for Signature64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature64(0x{}..)", hex::encode(&self.0[..4]))
    }
}

/// Returns the maximum number of Byzantine validators tolerated for `n`
/// participants: `f = ⌊(n−1)/3⌋`.
pub fn max_faulty(n: usize) -> usize {
    n.saturating_sub(1) / 3
}

/// Returns the supermajority quorum threshold for `n` participants: `2f+1`.
pub fn quorum_threshold(n: usize) -> usize {
    2 * max_faulty(n) + 1
}

/// The ordered set of active validator public keys plus the disjoint set of
/// blacklisted keys.
///
/// Mutated only through the commit path: committed membership-change events
/// and blacklist quorum evictions.
#[derive(Clone, Debug, Default, PartialEq, Eq, Encode, Decode)]
pub struct ValidatorSet {
    /// Validators currently participating in consensus.
    pub active: BTreeSet<ValidatorId>,
    /// Validators evicted by blacklist quorum. Disjoint from `active`.
    pub blacklisted: BTreeSet<ValidatorId>,
}

impl ValidatorSet {
    /// Builds a set from the given active validators.
    pub fn new<I: IntoIterator<Item = ValidatorId>>(active: I) -> Self {
        Self {
            active: active.into_iter().collect(),
            blacklisted: BTreeSet::new(),
        }
    }

    /// The number of active validators.
    pub fn len(&self) -> usize {
        self.active.len()
    }

    /// True when no validators are active.
    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// True when `id` is in the active set.
    pub fn is_active(&self, id: &ValidatorId) -> bool {
        self.active.contains(id)
    }

    /// True when `id` has been blacklisted.
    pub fn is_blacklisted(&self, id: &ValidatorId) -> bool {
        self.blacklisted.contains(id)
    }

    /// Adds a validator to the active set. Re-adding is a no-op; a
    /// blacklisted key may not be re-added this way. Returns whether the set
    /// changed.
    pub fn add(&mut self, id: ValidatorId) -> bool {
        if self.blacklisted.contains(&id) {
            return false;
        }
        self.active.insert(id)
    }

    /// Removes a validator from the active set. Returns whether it was
    /// present.
    pub fn remove(&mut self, id: &ValidatorId) -> bool {
        self.active.remove(id)
    }

    /// Moves a validator from the active set to the blacklist. Returns
    /// whether it was newly blacklisted.
    pub fn blacklist(&mut self, id: ValidatorId) -> bool {
        self.active.remove(&id);
        self.blacklisted.insert(id)
    }

    /// The maximum number of Byzantine validators tolerated by the current
    /// active set.
    pub fn max_faulty(&self) -> usize {
        max_faulty(self.active.len())
    }

    /// The supermajority quorum threshold `2f+1` for the current active set.
    pub fn quorum_threshold(&self) -> usize {
        quorum_threshold(self.active.len())
    }

    /// The validator's 1-based share index: its position in the ordered
    /// active set. Share indexes feed Shamir evaluation points and signature
    /// aggregation, so they must be identical on every node; the `BTreeSet`
    /// ordering guarantees that.
    pub fn share_index(&self, id: &ValidatorId) -> Option<u32> {
        self.active
            .iter()
            .position(|v| v == id)
            .map(|p| p as u32 + 1)
    }

    /// The validator at a given 1-based share index.
    pub fn by_share_index(&self, index: u32) -> Option<ValidatorId> {
        if index == 0 {
            return None;
        }
        self.active.iter().nth(index as usize - 1).copied()
    }
}
