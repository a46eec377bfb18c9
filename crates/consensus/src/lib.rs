// Path: crates/consensus/src/lib.rs
#![cfg_attr(
    not(test),
    deny(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        clippy::todo,
        clippy::unimplemented
    )
)]
//! Byzantine agreement for the Conductor validator node.
//!
//! Four pieces build on each other:
//!
//! * [`rbc`] — reliable broadcast with erasure-coded, Merkle-verified
//!   fragments and the echo/ready state machine;
//! * [`coin`] — a common coin from aggregated threshold-signature shares;
//! * [`epoch`] — the per-epoch engine that proposes, disseminates, orders,
//!   and commits event batches;
//! * [`day`] — supermajority agreement on one canonical VDF proof per day.
//!
//! [`membership`] carries the validator lifecycle: quorum-guarded membership
//! changes and blacklist voting.
//!
//! Everything here is plain single-owner state driven by the node's dispatch
//! loop; handlers take the peer exchange as a call-site parameter and never
//! store a back-reference to it.

/// The threshold-signature common coin.
pub mod coin;
/// Canonical day-proof selection and certification.
pub mod day;
/// The per-epoch consensus engine.
pub mod epoch;
/// Membership changes and blacklist voting.
pub mod membership;
/// Reliable broadcast.
pub mod rbc;
