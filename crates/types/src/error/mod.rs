// Path: crates/types/src/error/mod.rs
//! Core error types for the Conductor validator node.

use crate::app::ValidatorId;
use thiserror::Error;

/// A trait for assigning a stable, machine-readable string code to an error.
pub trait ErrorCode {
    /// Returns the unique, stable string identifier for this error variant.
    fn code(&self) -> &'static str;
}

/// Errors produced by the cryptographic primitives.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// A signature failed verification.
    #[error("signature verification failed")]
    InvalidSignature,
    /// Key material could not be parsed or was the wrong length.
    #[error("invalid key material: {0}")]
    InvalidKey(String),
    /// Fewer shares were supplied than the reconstruction threshold requires.
    #[error("insufficient shares: need {needed}, got {got}")]
    InsufficientShares {
        /// The reconstruction threshold `t`.
        needed: usize,
        /// The number of shares actually supplied.
        got: usize,
    },
    /// The `(n, t)` parameters are not usable.
    #[error("invalid threshold parameters: {0}")]
    InvalidParameters(String),
    /// A quorum certificate failed verification.
    #[error("invalid quorum certificate: {0}")]
    InvalidQuorumCert(String),
    /// A Merkle path did not anchor to the expected root.
    #[error("merkle path verification failed")]
    MerkleMismatch,
}

impl ErrorCode for CryptoError {
    fn code(&self) -> &'static str {
        match self {
            Self::InvalidSignature => "CRYPTO_INVALID_SIGNATURE",
            Self::InvalidKey(_) => "CRYPTO_INVALID_KEY",
            Self::InsufficientShares { .. } => "CRYPTO_INSUFFICIENT_SHARES",
            Self::InvalidParameters(_) => "CRYPTO_INVALID_PARAMETERS",
            Self::InvalidQuorumCert(_) => "CRYPTO_INVALID_QUORUM_CERT",
            Self::MerkleMismatch => "CRYPTO_MERKLE_MISMATCH",
        }
    }
}

/// Errors from the verifiable delay function.
#[derive(Debug, Error)]
pub enum VdfError {
    /// The computation was cancelled at a progress checkpoint.
    #[error("VDF computation cancelled at iteration {at}")]
    Cancelled {
        /// The iteration count at which the cancellation flag was observed.
        at: u64,
    },
    /// A proof did not match the recomputed chain output. The proof is
    /// rejected; the same input is never retried.
    #[error("VDF proof mismatch for day {day}")]
    Mismatch {
        /// The day number whose proof failed verification.
        day: u32,
    },
    /// The computation could not be started.
    #[error("VDF computation failed: {0}")]
    Computation(String),
}

impl ErrorCode for VdfError {
    fn code(&self) -> &'static str {
        match self {
            Self::Cancelled { .. } => "VDF_CANCELLED",
            Self::Mismatch { .. } => "VDF_MISMATCH",
            Self::Computation(_) => "VDF_COMPUTATION",
        }
    }
}

/// Errors from the persistent store. Storage failures are fatal to the node:
/// it halts rather than diverge.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The requested key was not found.
    #[error("key not found in store")]
    KeyNotFound,
    /// An error occurred in the storage backend.
    #[error("storage backend error: {0}")]
    Backend(String),
    /// A stored value failed canonical decoding.
    #[error("corrupt stored value: {0}")]
    Corrupt(String),
}

impl ErrorCode for StorageError {
    fn code(&self) -> &'static str {
        match self {
            Self::KeyNotFound => "STORAGE_KEY_NOT_FOUND",
            Self::Backend(_) => "STORAGE_BACKEND",
            Self::Corrupt(_) => "STORAGE_CORRUPT",
        }
    }
}

/// Errors from the peer-exchange layer.
#[derive(Debug, Error)]
pub enum NetworkError {
    /// No peer answered within the partition-detection window.
    #[error("network partition suspected: {0}")]
    Partition(String),
    /// A directed send could not reach its peer.
    #[error("peer unreachable: {0}")]
    PeerUnreachable(String),
    /// The local inbound queue has been closed.
    #[error("inbound queue closed")]
    QueueClosed,
}

impl ErrorCode for NetworkError {
    fn code(&self) -> &'static str {
        match self {
            Self::Partition(_) => "NETWORK_PARTITION",
            Self::PeerUnreachable(_) => "NETWORK_PEER_UNREACHABLE",
            Self::QueueClosed => "NETWORK_QUEUE_CLOSED",
        }
    }
}

/// Errors related to the consensus engine.
///
/// Consensus failure paths are represented as values, never as panics: the
/// daily loop matches on the variant and decides to retry, sleep, or halt.
#[derive(Debug, Error)]
pub enum ConsensusError {
    /// A consensus round failed to complete within its configured timeout.
    #[error("consensus round for {what} timed out after {seconds}s")]
    Timeout {
        /// Human-readable description of the round that timed out.
        what: String,
        /// The configured timeout in seconds.
        seconds: u64,
    },
    /// Not enough validators are online for a quorum.
    #[error("insufficient validators: need {needed}, have {got}")]
    InsufficientValidators {
        /// The minimum number of validators required.
        needed: usize,
        /// The number actually available.
        got: usize,
    },
    /// A signature in a consensus message was invalid.
    #[error("invalid signature in consensus message")]
    InvalidSignature,
    /// A quorum certificate failed verification.
    #[error("invalid quorum certificate: {0}")]
    InvalidQuorumCert(String),
    /// No supermajority agreed on a single proof value for the day.
    #[error("no proof quorum for day {day}: largest agreeing group {agreeing} < {needed}")]
    NoQuorum {
        /// The day number under consensus.
        day: u32,
        /// The size of the largest byte-identical group of valid proofs.
        agreeing: usize,
        /// The supermajority threshold `2f+1`.
        needed: usize,
    },
    /// The locally reconstructed block digest disagreed with the digest in a
    /// commit message. Fatal for the epoch: the engine refuses to advance.
    #[error("commit digest mismatch for epoch {epoch}")]
    CommitDigestMismatch {
        /// The epoch whose commit was rejected.
        epoch: u64,
    },
    /// A message referenced a proposer outside the active validator set.
    #[error("unknown proposer {0:?}")]
    UnknownProposer(ValidatorId),
    /// An underlying cryptographic failure.
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    /// An underlying storage failure. Bubbles up to halt the node.
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// An underlying network failure.
    #[error(transparent)]
    Network(#[from] NetworkError),
}

impl ErrorCode for ConsensusError {
    fn code(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "CONSENSUS_TIMEOUT",
            Self::InsufficientValidators { .. } => "CONSENSUS_INSUFFICIENT_VALIDATORS",
            Self::InvalidSignature => "CONSENSUS_INVALID_SIGNATURE",
            Self::InvalidQuorumCert(_) => "CONSENSUS_INVALID_QUORUM_CERT",
            Self::NoQuorum { .. } => "CONSENSUS_NO_QUORUM",
            Self::CommitDigestMismatch { .. } => "CONSENSUS_COMMIT_DIGEST_MISMATCH",
            Self::UnknownProposer(_) => "CONSENSUS_UNKNOWN_PROPOSER",
            Self::Crypto(e) => e.code(),
            Self::Storage(e) => e.code(),
            Self::Network(e) => e.code(),
        }
    }
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config: {0}")]
    Io(String),
    /// The configuration file or an override could not be parsed.
    #[error("failed to parse config: {0}")]
    Parse(String),
    /// A configuration value is out of range or inconsistent.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl ErrorCode for ConfigError {
    fn code(&self) -> &'static str {
        match self {
            Self::Io(_) => "CONFIG_IO",
            Self::Parse(_) => "CONFIG_PARSE",
            Self::Invalid(_) => "CONFIG_INVALID",
        }
    }
}

/// Errors surfaced to the ingress surface.
///
/// Internal faults are mapped here at the service boundary; cryptographic
/// failures are recovered internally and never reach this enum.
#[derive(Debug, Error)]
pub enum IngressError {
    /// The request was malformed (for example, an empty event batch).
    #[error("precondition failed: {0}")]
    Precondition(String),
    /// The requested object does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// Consensus failed for the request.
    #[error("aborted: {0}")]
    Aborted(String),
    /// The caller exceeded its request budget.
    #[error("rate limit exceeded")]
    RateLimit,
    /// The caller could not be authenticated.
    #[error("authentication failed: {0}")]
    Auth(String),
    /// An internal fault.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ErrorCode for IngressError {
    fn code(&self) -> &'static str {
        match self {
            Self::Precondition(_) => "INGRESS_PRECONDITION_FAILED",
            Self::NotFound(_) => "INGRESS_NOT_FOUND",
            Self::Aborted(_) => "INGRESS_ABORTED",
            Self::RateLimit => "INGRESS_RATE_LIMIT",
            Self::Auth(_) => "INGRESS_AUTH",
            Self::Internal(_) => "INGRESS_INTERNAL",
        }
    }
}
