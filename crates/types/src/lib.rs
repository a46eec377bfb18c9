// Path: crates/types/src/lib.rs
#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! # Conductor Types
//!
//! This crate is the foundational library for the Conductor validator node,
//! containing all core data structures, wire messages, error types, and
//! configuration objects.
//!
//! ## Architectural Role
//!
//! As the base crate, `conductor-types` has minimal dependencies and is itself
//! a dependency for almost every other crate in the workspace. This structure
//! prevents circular dependencies and provides a stable, canonical definition
//! for shared types like `DayProof`, `QuorumCertificate`, `PeerMessage`, and
//! the error enums.

/// Core application-level data structures: validators, day proofs, blocks,
/// events, and the peer wire messages.
pub mod app;
/// The canonical, deterministic binary codec for consensus-critical state.
pub mod codec;
/// Shared configuration structures for the validator node.
pub mod config;
/// A unified set of all error types used across the workspace.
pub mod error;
/// Constants for well-known storage keys.
pub mod keys;
