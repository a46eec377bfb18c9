// Path: crates/crypto/src/lib.rs
#![cfg_attr(
    not(test),
    deny(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        clippy::unimplemented,
        clippy::todo
    )
)]
//! Cryptographic primitives for the Conductor validator node.
//!
//! Everything consensus-critical hashes with BLAKE3 and signs with Ed25519.
//! The threshold layer provides Shamir secret sharing over a 256-bit prime
//! field, signature-share aggregation, and quorum-certificate construction
//! and verification.

/// BLAKE3 hashing helpers.
pub mod hash;
/// Binary Merkle trees over erasure-coded fragments.
pub mod merkle;
/// Ed25519 key pairs and signature verification.
pub mod sign;
/// Shamir secret sharing, signature aggregation, and quorum certificates.
pub mod threshold;
/// The sequential hash-chain verifiable delay function.
pub mod vdf;
