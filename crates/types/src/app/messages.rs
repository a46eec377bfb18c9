// Path: crates/types/src/app/messages.rs
//! Peer protocol messages.
//!
//! All messages are serialized through the canonical codec so that signatures
//! and hashes are reproducible across implementations. The transport below
//! this layer is best-effort: delivery may be out of order or duplicated, and
//! every handler tolerates both.

use super::{DayProof, MembershipUpdate, QuorumCertificate, Signature64, SignatureShare, ValidatorId};
use crate::codec;
use parity_scale_codec::{Decode, Encode};

/// One erasure-coded fragment of a broadcast batch, with the Merkle path
/// anchoring it to the root committed in the propose.
///
/// Invariant: `merkle_verify(merkle_path, hash(data), root)`.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct Fragment {
    /// BLAKE3 hash of the full batch bytes.
    pub batch_id: [u8; 32],
    /// The fragment's shard index in `0..n`.
    pub index: u32,
    /// The shard bytes.
    pub data: Vec<u8>,
    /// Sibling hashes from leaf to root.
    pub merkle_path: Vec<[u8; 32]>,
}

/// The wire-level peer protocol.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub enum PeerMessage {
    /// Initiates reliable broadcast of an event batch.
    RbcPropose {
        /// The consensus epoch the batch is proposed for.
        epoch: u64,
        /// The proposing validator.
        proposer_id: ValidatorId,
        /// BLAKE3 hash of the batch bytes; doubles as the batch identifier.
        payload_hash: [u8; 32],
        /// Root of the Merkle tree over the fragment shards.
        merkle_root: [u8; 32],
        /// Length of the original batch bytes, for trimming after erasure
        /// reconstruction.
        data_len: u32,
        /// Reconstruction threshold `k = n − 2f`.
        k: u32,
        /// Total fragment count.
        n: u32,
        /// The erasure-coded fragments.
        fragments: Vec<Fragment>,
    },
    /// A single re-requested fragment.
    RbcFragment {
        /// The consensus epoch of the originating propose.
        epoch: u64,
        /// The original proposer.
        proposer_id: ValidatorId,
        /// The fragment being supplied.
        fragment: Fragment,
    },
    /// Asks a peer to re-send a missing fragment. Non-critical: may be shed
    /// under backpressure.
    FragmentRequest {
        /// The batch whose fragment is missing.
        batch_id: [u8; 32],
        /// The missing shard index.
        index: u32,
        /// Who is asking.
        requester: ValidatorId,
    },
    /// Announces that the sender vouches for a batch: it holds `k` verified
    /// fragments, or amplified after `f+1` matching readies.
    Ready {
        /// The batch identifier.
        batch_id: [u8; 32],
        /// The Merkle root the sender verified its fragments against.
        merkle_root: [u8; 32],
        /// The announcing validator.
        sender: ValidatorId,
    },
    /// A threshold share of an encrypted batch payload.
    EncShare {
        /// The consensus epoch.
        epoch: u64,
        /// The proposer whose payload the share belongs to.
        proposer_id: ValidatorId,
        /// The share's 1-based index.
        chunk_index: u32,
        /// The 32-byte share value.
        enc_payload_share: Vec<u8>,
    },
    /// A threshold-signature share of the common coin.
    CoinShare {
        /// The epoch (day) the coin belongs to.
        epoch: u64,
        /// The coin round within the epoch.
        round: u32,
        /// The contributing validator.
        sender: ValidatorId,
        /// Signature share over `COIN_<epoch>_<round>`.
        share: SignatureShare,
    },
    /// Finalizes an epoch block. Critical: never shed under backpressure.
    Commit {
        /// The epoch being committed.
        epoch: u64,
        /// Digest of the ordered payload hashes.
        block_digest: [u8; 32],
        /// Certificate over `block_digest`.
        quorum_cert: QuorumCertificate,
    },
    /// Advertises a freshly computed (not yet canonical) day proof.
    DayProofAnnounce(DayProof),
    /// Advertises a quorum-certified canonical day proof. Critical.
    CanonicalProof(DayProof),
    /// Reports how long the sender's VDF computation took, for difficulty
    /// adjustment.
    VdfCompletionTime {
        /// The day the measurement covers.
        day: u32,
        /// The reporting validator.
        validator: ValidatorId,
        /// Wall-clock duration in milliseconds.
        millis: u64,
    },
    /// Propagates a quorum-certified membership change. Critical.
    MembershipChange {
        /// The epoch the change was committed in.
        epoch: u64,
        /// The change itself.
        update: MembershipUpdate,
        /// Certificate over the canonical bytes of `update`.
        quorum_cert: QuorumCertificate,
    },
    /// A vote to evict a validator.
    BlacklistVote {
        /// The epoch the vote was cast in.
        epoch: u64,
        /// The voting validator.
        voter_id: ValidatorId,
        /// The validator being voted against.
        target_id: ValidatorId,
        /// Free-form reason, recorded in logs.
        reason: String,
        /// The voter's signature over the vote's canonical bytes.
        signature: Signature64,
    },
}

impl PeerMessage {
    /// Critical messages are never dropped by inbound-queue backpressure;
    /// the oldest non-critical message is shed instead.
    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            PeerMessage::Commit { .. }
                | PeerMessage::CanonicalProof(_)
                | PeerMessage::MembershipChange { .. }
        )
    }

    /// A short label for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            PeerMessage::RbcPropose { .. } => "rbc_propose",
            PeerMessage::RbcFragment { .. } => "rbc_fragment",
            PeerMessage::FragmentRequest { .. } => "fragment_request",
            PeerMessage::Ready { .. } => "ready",
            PeerMessage::EncShare { .. } => "enc_share",
            PeerMessage::CoinShare { .. } => "coin_share",
            PeerMessage::Commit { .. } => "commit",
            PeerMessage::DayProofAnnounce(_) => "day_proof",
            PeerMessage::CanonicalProof(_) => "canonical_proof",
            PeerMessage::VdfCompletionTime { .. } => "vdf_completion_time",
            PeerMessage::MembershipChange { .. } => "membership_change",
            PeerMessage::BlacklistVote { .. } => "blacklist_vote",
        }
    }
}

/// The canonical bytes a blacklist voter signs.
pub fn blacklist_vote_signing_bytes(
    epoch: u64,
    voter_id: &ValidatorId,
    target_id: &ValidatorId,
    reason: &str,
) -> Vec<u8> {
    codec::to_bytes_canonical(&(b"BLACKLIST_VOTE".to_vec(), epoch, voter_id, target_id, reason))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn criticality_flags() {
        let req = PeerMessage::FragmentRequest {
            batch_id: [0; 32],
            index: 1,
            requester: ValidatorId([1; 32]),
        };
        assert!(!req.is_critical());

        let commit = PeerMessage::Commit {
            epoch: 1,
            block_digest: [0; 32],
            quorum_cert: QuorumCertificate {
                epoch_or_day: 1,
                payload_hash: [0; 32],
                signatures: Default::default(),
                aggregated_signature: vec![],
            },
        };
        assert!(commit.is_critical());
    }

    #[test]
    fn vote_signing_bytes_bind_all_fields() {
        let a = blacklist_vote_signing_bytes(1, &ValidatorId([1; 32]), &ValidatorId([2; 32]), "x");
        let b = blacklist_vote_signing_bytes(2, &ValidatorId([1; 32]), &ValidatorId([2; 32]), "x");
        let c = blacklist_vote_signing_bytes(1, &ValidatorId([1; 32]), &ValidatorId([3; 32]), "x");
        assert_ne!(a, b);
        assert_ne!(a, c);
    }
}
