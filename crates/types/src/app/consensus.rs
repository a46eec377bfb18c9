// Path: crates/types/src/app/consensus.rs
//! Consensus artifacts: day proofs, quorum certificates, and committed blocks.

use super::{Signature64, ValidatorId};
use parity_scale_codec::{Decode, Encode};
use std::collections::BTreeMap;

/// One validator's contribution to an aggregated signature: its 1-based share
/// index and its Ed25519 signature over the payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Encode, Decode)]
pub struct SignatureShare {
    /// The signer's 1-based share index within the ordered validator set.
    pub index: u32,
    /// The signer's Ed25519 signature over the certified payload.
    pub signature: Signature64,
}

/// A compact proof that a supermajority of validators signed a payload hash.
///
/// Invariant: `signatures` holds at least `2f+1` entries and every share
/// verifies against its validator's public key over `payload_hash`.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct QuorumCertificate {
    /// The epoch (for blocks) or day number (for day proofs) being certified.
    pub epoch_or_day: u64,
    /// BLAKE3 hash of the certified payload bytes.
    pub payload_hash: [u8; 32],
    /// Per-validator signature shares. A `BTreeMap` keeps the canonical
    /// encoding order-deterministic and makes duplicate signers impossible.
    pub signatures: BTreeMap<ValidatorId, SignatureShare>,
    /// The canonicalized concatenation of `(index_be ∥ signature)` tuples.
    pub aggregated_signature: Vec<u8>,
}

impl QuorumCertificate {
    /// The number of distinct signers in this certificate.
    pub fn signer_count(&self) -> usize {
        self.signatures.len()
    }
}

/// A per-validator proof that one VDF day interval has elapsed.
///
/// Invariant: `proof == VDF(day_number)` and `signature` is the validator's
/// Ed25519 signature over the raw proof bytes. The canonical proof for a day
/// additionally carries a quorum certificate binding a supermajority to those
/// exact bytes.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct DayProof {
    /// The day number this proof covers.
    pub day_number: u32,
    /// The 32-byte VDF output.
    pub proof: [u8; 32],
    /// The computing validator's public key.
    pub validator_id: ValidatorId,
    /// Ed25519 signature over `proof`.
    pub signature: Signature64,
    /// Present once a supermajority has certified this exact proof value.
    pub quorum_cert: Option<QuorumCertificate>,
}

impl DayProof {
    /// The bytes covered by `signature`.
    pub fn signing_bytes(&self) -> &[u8] {
        &self.proof
    }

    /// True once the proof carries a quorum certificate.
    pub fn is_canonical(&self) -> bool {
        self.quorum_cert.is_some()
    }
}

/// A committed per-epoch block.
///
/// Invariant: `block_digest = H(ordered_proposals)` and `quorum_cert`
/// certifies `block_digest`.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct Block {
    /// The epoch this block closes.
    pub epoch: u64,
    /// BLAKE3 hash over the concatenated ordered payload hashes.
    pub block_digest: [u8; 32],
    /// Payload hashes of the committed proposals, in coin-derived order.
    pub ordered_proposals: Vec<[u8; 32]>,
    /// The common-coin value used for ordering, if the coin protocol
    /// completed. `None` marks the logged lexicographic fallback path.
    pub coin_value: Option<u8>,
    /// Certificate binding a supermajority to `block_digest`.
    pub quorum_cert: QuorumCertificate,
}
