// Path: crates/crypto/src/sign/mod.rs
//! Ed25519 signing and verification.
//!
//! Thin newtypes over `ed25519-dalek` keyed to the workspace types: a
//! validator's identity is its raw 32-byte public key, and every signature in
//! the protocol is a detached 64-byte Ed25519 signature.

use conductor_types::app::{Signature64, ValidatorId};
use conductor_types::error::CryptoError;
use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use std::path::Path;

/// An Ed25519 key pair owned by the local validator.
#[derive(Clone)]
pub struct Keypair {
    signing: SigningKey,
}

impl Keypair {
    /// Generates a fresh key pair from the OS RNG.
    pub fn generate() -> Self {
        Self {
            signing: SigningKey::generate(&mut OsRng),
        }
    }

    /// Reconstructs a key pair from a 32-byte seed.
    pub fn from_seed_bytes(seed: &[u8]) -> Result<Self, CryptoError> {
        let seed: [u8; 32] = seed.try_into().map_err(|_| {
            CryptoError::InvalidKey(format!("seed must be 32 bytes, got {}", seed.len()))
        })?;
        Ok(Self {
            signing: SigningKey::from_bytes(&seed),
        })
    }

    /// Loads a key pair from a raw 32-byte seed file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, CryptoError> {
        let bytes = std::fs::read(path.as_ref())
            .map_err(|e| CryptoError::InvalidKey(format!("failed to read seed file: {}", e)))?;
        Self::from_seed_bytes(&bytes)
    }

    /// The validator identity derived from this key pair.
    pub fn validator_id(&self) -> ValidatorId {
        ValidatorId(self.signing.verifying_key().to_bytes())
    }

    /// Signs `message`, returning a detached signature.
    pub fn sign(&self, message: &[u8]) -> Signature64 {
        Signature64(self.signing.sign(message).to_bytes())
    }
}

impl std::fmt::Debug for Keypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Keypair({})", self.validator_id())
    }
}

/// Verifies `signature` over `message` against the validator's public key.
pub fn verify_signature(
    validator: &ValidatorId,
    message: &[u8],
    signature: &Signature64,
) -> Result<(), CryptoError> {
    let key = VerifyingKey::from_bytes(validator.as_bytes())
        .map_err(|e| CryptoError::InvalidKey(format!("bad public key: {}", e)))?;
    let sig = ed25519_dalek::Signature::from_bytes(signature.as_bytes());
    key.verify(message, &sig)
        .map_err(|_| CryptoError::InvalidSignature)
}

#[cfg(test)]
mod tests;
