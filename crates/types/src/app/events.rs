// Path: crates/types/src/app/events.rs
//! Application event envelopes.
//!
//! The core treats all payloads as opaque hashable data; only the envelope
//! matters for consensus. Events are a closed tagged union: an unknown variant
//! index fails canonical decoding instead of being silently accepted.

use super::{Signature64, ValidatorId};
use crate::codec;
use parity_scale_codec::{Decode, Encode};

/// The kind of a validator membership change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Encode, Decode)]
pub enum MembershipKind {
    /// Add a validator to the active set. Idempotent.
    Add,
    /// Remove a validator from the active set. Removing an absent key is a
    /// logged no-op.
    Remove,
}

/// A change to the validator set, effective at the start of `effective_day`.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct MembershipUpdate {
    /// Whether the validator is added or removed.
    pub kind: MembershipKind,
    /// The validator key being added or removed.
    pub validator: ValidatorId,
    /// The day at whose start the mutation takes effect.
    pub effective_day: u32,
}

/// The variant payload of an application event.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub enum EventPayload {
    /// Announcement of a new post.
    PostAnnounce {
        /// Content identifier of the post body.
        content_cid: String,
        /// Hash of the author's public key.
        author_pubkey_hash: [u8; 32],
        /// The community the post belongs to.
        community_id: String,
    },
    /// A moderation action against existing content.
    Moderation {
        /// Reference to the moderated object.
        target_ref: String,
        /// The action taken.
        action: String,
        /// Hash of the stated reason.
        reason_hash: [u8; 32],
    },
    /// A new user registration.
    Registration {
        /// The registering user's public key.
        user_pubkey: [u8; 32],
        /// The day the registration was created.
        registration_day: u32,
        /// Hash of the day proof anchoring the registration in time.
        day_proof_hash: [u8; 32],
    },
    /// A validator membership change.
    MembershipChange(MembershipUpdate),
    /// A notice that content is being exported to an external network.
    ExportNotice {
        /// Reference to the exported object.
        object_ref: String,
        /// Hash of the export policy in force.
        policy_hash: [u8; 32],
    },
}

/// A signed, dated event envelope.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct Event {
    /// The day the event was created.
    pub creation_day: u32,
    /// Ed25519 signature over the canonical bytes of
    /// `(creation_day, payload)`.
    pub sig: Signature64,
    /// The variant payload.
    pub payload: EventPayload,
}

impl Event {
    /// The canonical bytes covered by `sig`.
    pub fn signing_bytes(creation_day: u32, payload: &EventPayload) -> Vec<u8> {
        codec::to_bytes_canonical(&(creation_day, payload))
    }
}

/// An ordered sequence of events proposed by a single validator for a single
/// epoch. The batch identifier is the BLAKE3 hash of the canonical bytes.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct EventBatch {
    /// The proposing validator.
    pub proposer: ValidatorId,
    /// The proposed events, in proposal order.
    pub events: Vec<Event>,
}

impl EventBatch {
    /// The canonical bytes that are erasure-coded and hashed into the batch
    /// identifier.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        codec::to_bytes_canonical(self)
    }
}
