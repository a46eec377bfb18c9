// Path: crates/consensus/src/coin.rs
//! The common coin: one shared random bit per `(day, round)`.
//!
//! Each validator signs the ASCII string `COIN_<day>_<round>` with its key;
//! once `t = 2f+1` shares are present, the coin is the low bit of the BLAKE3
//! hash of the aggregated shares. Aggregation canonicalizes shares by index,
//! so every honest party derives the same bit from the same share set,
//! regardless of arrival order.

use conductor_crypto::hash::blake3_32;
use conductor_crypto::sign::{verify_signature, Keypair};
use conductor_crypto::threshold::ThresholdCrypto;
use conductor_types::app::{SignatureShare, ValidatorId, ValidatorSet};
use conductor_types::error::{ConsensusError, CryptoError};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// The bytes every validator signs for a given coin.
pub fn coin_message(day: u64, round: u32) -> Vec<u8> {
    format!("COIN_{}_{}", day, round).into_bytes()
}

/// Collects coin shares and derives coin values.
#[derive(Debug)]
pub struct CommonCoin {
    crypto: ThresholdCrypto,
    shares: HashMap<(u64, u32), BTreeMap<u32, SignatureShare>>,
    values: HashMap<(u64, u32), u8>,
}

impl CommonCoin {
    /// Creates a coin for `n` validators with threshold `t`.
    pub fn new(n: usize, t: usize) -> Result<Self, ConsensusError> {
        Ok(Self {
            crypto: ThresholdCrypto::new(n, t)?,
            shares: HashMap::new(),
            values: HashMap::new(),
        })
    }

    /// Produces the local validator's share for `(day, round)`.
    pub fn make_share(
        keypair: &Keypair,
        set: &ValidatorSet,
        day: u64,
        round: u32,
    ) -> Result<SignatureShare, ConsensusError> {
        let index = set
            .share_index(&keypair.validator_id())
            .ok_or(ConsensusError::UnknownProposer(keypair.validator_id()))?;
        Ok(ThresholdCrypto::sign_share(
            keypair,
            index,
            &coin_message(day, round),
        ))
    }

    /// Verifies and records a share. Returns the coin value as soon as the
    /// threshold is crossed (and on every later call for the same coin).
    ///
    /// Shares from unknown validators, shares whose claimed index does not
    /// belong to the sender, and shares that fail signature verification are
    /// rejected.
    pub fn add_share(
        &mut self,
        day: u64,
        round: u32,
        sender: ValidatorId,
        share: SignatureShare,
        set: &ValidatorSet,
    ) -> Result<Option<u8>, ConsensusError> {
        if let Some(&value) = self.values.get(&(day, round)) {
            return Ok(Some(value));
        }
        let expected_index = set
            .share_index(&sender)
            .ok_or(ConsensusError::UnknownProposer(sender))?;
        if share.index != expected_index {
            return Err(ConsensusError::Crypto(CryptoError::InvalidParameters(
                format!(
                    "coin share index {} does not match sender's index {}",
                    share.index, expected_index
                ),
            )));
        }
        verify_signature(&sender, &coin_message(day, round), &share.signature)
            .map_err(|_| ConsensusError::InvalidSignature)?;

        let entry = self.shares.entry((day, round)).or_default();
        entry.insert(share.index, share); // Duplicate shares overwrite, idempotent.

        if entry.len() >= self.crypto.threshold() {
            let shares: Vec<SignatureShare> = entry.values().copied().collect();
            let aggregated = self.crypto.aggregate_signatures(&shares)?;
            let value = blake3_32(&aggregated)[0] & 1;
            self.values.insert((day, round), value);
            debug!(target: "consensus", day, round, value, "common coin derived");
            return Ok(Some(value));
        }
        Ok(None)
    }

    /// The derived coin value, if the threshold has been reached.
    pub fn value(&self, day: u64, round: u32) -> Option<u8> {
        self.values.get(&(day, round)).copied()
    }

    /// Drops share state for coins at or below `day` once their epochs have
    /// committed.
    pub fn gc_through(&mut self, day: u64) {
        self.shares.retain(|(d, _), _| *d > day);
        self.values.retain(|(d, _), _| *d > day);
    }
}
