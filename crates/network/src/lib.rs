// Path: crates/network/src/lib.rs
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
//! Peer exchange for the Conductor validator node.
//!
//! The actual transport (DHT, gossip, direct dial) is deliberately out of
//! scope: this crate defines the contract the core needs — best-effort
//! delivery, possibly out of order, possibly duplicated — and provides an
//! in-process hub implementing it for tests and local clusters.
//!
//! Ownership follows the kernel pattern: the peer-exchange layer owns peer
//! state, and the consensus engine is handed to the dispatch loop as a
//! handle. No peer state holds a strong back-reference to the engine.

mod hub;
mod queue;
/// Trait definitions for the peer-exchange contract.
pub mod traits;

pub use hub::{HubHandle, HubInbound, InProcessHub};
pub use queue::InboundQueue;
pub use traits::{Inbound, PeerExchange};
