// Path: crates/crypto/src/threshold/mod.rs
//! Threshold cryptography: Shamir secret sharing, signature-share
//! aggregation, and quorum certificates.
//!
//! Share arithmetic runs in the prime field of `P = 2^256 − 189`. Secrets are
//! at most 32 bytes (longer inputs are hashed down); shares are evaluations of
//! a random degree `t−1` polynomial at the 1-based validator indexes, and
//! reconstruction is Lagrange interpolation at zero with Fermat inverses.

use crate::hash::blake3_32;
use crate::sign::{verify_signature, Keypair};
use conductor_types::app::{QuorumCertificate, Signature64, SignatureShare, ValidatorId, ValidatorSet};
use conductor_types::error::CryptoError;
use num_bigint::BigUint;
use num_traits::{One, Zero};
use once_cell::sync::Lazy;
use rand::RngCore;
use std::collections::BTreeMap;

/// The field prime `2^256 − 189`.
static FIELD_PRIME: Lazy<BigUint> =
    Lazy::new(|| (BigUint::one() << 256usize) - BigUint::from(189u32));

/// A Shamir share: the 1-based evaluation point and the 32-byte field value.
pub type Share = (u32, [u8; 32]);

/// Threshold parameters `(n, t)`: `n` validators, any `t` of which can
/// reconstruct.
#[derive(Debug, Clone, Copy)]
pub struct ThresholdCrypto {
    n: usize,
    t: usize,
}

impl ThresholdCrypto {
    /// Creates threshold parameters, rejecting unusable combinations.
    pub fn new(n: usize, t: usize) -> Result<Self, CryptoError> {
        if t > n {
            return Err(CryptoError::InvalidParameters(format!(
                "threshold t={} cannot exceed validator count n={}",
                t, n
            )));
        }
        if t < 1 {
            return Err(CryptoError::InvalidParameters(
                "threshold t must be at least 1".to_string(),
            ));
        }
        Ok(Self { n, t })
    }

    /// The reconstruction threshold `t`.
    pub fn threshold(&self) -> usize {
        self.t
    }

    /// Splits `secret` into `n` shares. Secrets longer than 32 bytes are
    /// hashed down first.
    pub fn generate_shares(&self, secret: &[u8]) -> Vec<Share> {
        let reduced: [u8; 32] = if secret.len() > 32 {
            blake3_32(secret)
        } else {
            let mut padded = [0u8; 32];
            padded[32 - secret.len()..].copy_from_slice(secret);
            padded
        };
        let secret_int = BigUint::from_bytes_be(&reduced) % &*FIELD_PRIME;

        // Polynomial with constant term `secret_int` and t−1 random
        // coefficients.
        let mut coefficients = Vec::with_capacity(self.t);
        coefficients.push(secret_int);
        let mut rng = rand::rngs::OsRng;
        for _ in 1..self.t {
            let mut buf = [0u8; 32];
            rng.fill_bytes(&mut buf);
            coefficients.push(BigUint::from_bytes_be(&buf) % &*FIELD_PRIME);
        }

        (1..=self.n as u32)
            .map(|x| (x, to_field_bytes(&eval_polynomial(&coefficients, x))))
            .collect()
    }

    /// Reconstructs the secret from at least `t` shares via Lagrange
    /// interpolation at zero.
    pub fn reconstruct(&self, shares: &[Share]) -> Result<[u8; 32], CryptoError> {
        if shares.len() < self.t {
            return Err(CryptoError::InsufficientShares {
                needed: self.t,
                got: shares.len(),
            });
        }
        let p = &*FIELD_PRIME;
        let mut secret = BigUint::zero();

        for (i, (xi, yi)) in shares.iter().enumerate() {
            let yi_int = BigUint::from_bytes_be(yi) % p;
            let mut basis = BigUint::one();

            for (j, (xj, _)) in shares.iter().enumerate() {
                if i == j {
                    continue;
                }
                if xi == xj {
                    return Err(CryptoError::InvalidParameters(format!(
                        "duplicate share index {}",
                        xi
                    )));
                }
                // numerator = −xj, denominator = xi − xj, both mod P.
                let numerator = (p - BigUint::from(*xj)) % p;
                let denominator = (p + BigUint::from(*xi) - BigUint::from(*xj)) % p;
                let inverse = denominator.modpow(&(p - BigUint::from(2u32)), p);
                basis = basis * numerator % p * inverse % p;
            }
            secret = (secret + yi_int * basis) % p;
        }
        Ok(to_field_bytes(&secret))
    }

    /// Signs `message` as this validator's share contribution.
    pub fn sign_share(keypair: &Keypair, share_index: u32, message: &[u8]) -> SignatureShare {
        SignatureShare {
            index: share_index,
            signature: keypair.sign(message),
        }
    }

    /// Aggregates signature shares into a compact, order-independent form:
    /// shares are canonicalized by index, then concatenated as
    /// `(index_be4 ∥ signature)` tuples.
    pub fn aggregate_signatures(&self, shares: &[SignatureShare]) -> Result<Vec<u8>, CryptoError> {
        if shares.len() < self.t {
            return Err(CryptoError::InsufficientShares {
                needed: self.t,
                got: shares.len(),
            });
        }
        let ordered: BTreeMap<u32, &SignatureShare> =
            shares.iter().map(|s| (s.index, s)).collect();
        let mut aggregated = Vec::with_capacity(ordered.len() * 68);
        for (index, share) in &ordered {
            aggregated.extend_from_slice(&index.to_be_bytes());
            aggregated.extend_from_slice(share.signature.as_bytes());
        }
        Ok(aggregated)
    }

    /// Verifies an aggregated signature: accepts iff at least `t` component
    /// signatures verify against their claimed indexes' public keys over
    /// `message`. `resolve` maps a 1-based share index to its validator.
    pub fn verify_aggregated<F>(
        &self,
        message: &[u8],
        aggregated: &[u8],
        resolve: F,
    ) -> Result<(), CryptoError>
    where
        F: Fn(u32) -> Option<ValidatorId>,
    {
        if aggregated.len() % 68 != 0 {
            return Err(CryptoError::InvalidSignature);
        }
        let mut verified = 0usize;
        for tuple in aggregated.chunks_exact(68) {
            let mut index_be = [0u8; 4];
            index_be.copy_from_slice(&tuple[..4]);
            let index = u32::from_be_bytes(index_be);
            let mut sig = [0u8; 64];
            sig.copy_from_slice(&tuple[4..]);

            let Some(validator) = resolve(index) else {
                continue;
            };
            if verify_signature(&validator, message, &Signature64(sig)).is_ok() {
                verified += 1;
            }
        }
        if verified >= self.t {
            Ok(())
        } else {
            Err(CryptoError::InsufficientShares {
                needed: self.t,
                got: verified,
            })
        }
    }
}

fn eval_polynomial(coefficients: &[BigUint], x: u32) -> BigUint {
    let p = &*FIELD_PRIME;
    let x = BigUint::from(x);
    let mut result = BigUint::zero();
    // Horner's method.
    for coeff in coefficients.iter().rev() {
        result = (result * &x + coeff) % p;
    }
    result
}

fn to_field_bytes(value: &BigUint) -> [u8; 32] {
    let raw = value.to_bytes_be();
    let mut out = [0u8; 32];
    out[32 - raw.len()..].copy_from_slice(&raw);
    out
}

/// Collects signature shares over `payload_hash` until a supermajority of
/// distinct validators is present, then produces the certificate.
#[derive(Debug)]
pub struct QuorumCertBuilder {
    epoch_or_day: u64,
    payload_hash: [u8; 32],
    threshold: usize,
    signatures: BTreeMap<ValidatorId, SignatureShare>,
}

impl QuorumCertBuilder {
    /// Starts collecting shares for `payload_hash` with the given `2f+1`
    /// threshold.
    pub fn new(epoch_or_day: u64, payload_hash: [u8; 32], threshold: usize) -> Self {
        Self {
            epoch_or_day,
            payload_hash,
            threshold,
            signatures: BTreeMap::new(),
        }
    }

    /// Adds one validator's share after verifying it over the payload hash.
    /// Duplicate validators are idempotent no-ops.
    pub fn add(&mut self, validator: ValidatorId, share: SignatureShare) -> Result<(), CryptoError> {
        verify_signature(&validator, &self.payload_hash, &share.signature)?;
        self.signatures.entry(validator).or_insert(share);
        Ok(())
    }

    /// The number of distinct validators collected so far.
    pub fn signer_count(&self) -> usize {
        self.signatures.len()
    }

    /// True once the threshold has been reached.
    pub fn is_complete(&self) -> bool {
        self.signatures.len() >= self.threshold
    }

    /// Builds the certificate, aggregating the collected shares.
    pub fn build(self) -> Result<QuorumCertificate, CryptoError> {
        if self.signatures.len() < self.threshold {
            return Err(CryptoError::InsufficientShares {
                needed: self.threshold,
                got: self.signatures.len(),
            });
        }
        let shares: Vec<SignatureShare> = self.signatures.values().copied().collect();
        let crypto = ThresholdCrypto::new(shares.len(), self.threshold)?;
        let aggregated_signature = crypto.aggregate_signatures(&shares)?;
        Ok(QuorumCertificate {
            epoch_or_day: self.epoch_or_day,
            payload_hash: self.payload_hash,
            signatures: self.signatures,
            aggregated_signature,
        })
    }
}

/// Verifies a quorum certificate against the known validator set.
///
/// Rejects certificates containing any unknown validator or any share whose
/// individual signature does not verify over the payload hash. Blacklisted
/// validators' past contributions remain acceptable; only keys the set has
/// never seen are unknown. Duplicates are impossible by the map shape.
pub fn verify_quorum_cert(
    qc: &QuorumCertificate,
    set: &ValidatorSet,
    threshold: usize,
) -> Result<(), CryptoError> {
    if qc.signatures.len() < threshold {
        return Err(CryptoError::InvalidQuorumCert(format!(
            "{} signers below threshold {}",
            qc.signatures.len(),
            threshold
        )));
    }
    for (validator, share) in &qc.signatures {
        if !set.is_active(validator) && !set.is_blacklisted(validator) {
            return Err(CryptoError::InvalidQuorumCert(format!(
                "unknown validator {}",
                validator
            )));
        }
        verify_signature(validator, &qc.payload_hash, &share.signature)
            .map_err(|_| CryptoError::InvalidQuorumCert(format!("bad share from {}", validator)))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests;
