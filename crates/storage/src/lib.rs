// Path: crates/storage/src/lib.rs
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
//! Crash-safe persistent storage for the Conductor validator node.
//!
//! A single `redb` database holds day proofs, committed blocks, the validator
//! set, and the day counter under ASCII keys with colon-separated namespaces
//! (`proof:day:<u32>`, `block:epoch:<u64>`, `validators`, `blacklist`,
//! `current_day`). Every write is one durable (fsynced) transaction, so a
//! crash can never expose a proof whose signature does not match its body.
//!
//! The store is the only shared mutable resource across tasks: writes are
//! serialized through redb's single writer, reads are concurrent.

mod store;

pub use store::ProofStore;
