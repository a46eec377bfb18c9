// Path: crates/consensus/src/day.rs
//! Canonical day-proof selection.
//!
//! Recomputing every peer's VDF would cost each validator a full day per
//! proof, so canonical selection uses a supermajority rule instead: collect
//! the day's proofs, keep the ones whose Ed25519 signatures verify and whose
//! authors are distinct, active, non-blacklisted validators, and group them
//! by proof bytes. A group of `2f+1` byte-identical proofs is canonical; its
//! members' signatures become the quorum certificate.
//!
//! The certificate's payload hash is the proof value itself — a 32-byte VDF
//! output that every member signed directly.

use conductor_crypto::sign::verify_signature;
use conductor_crypto::threshold::QuorumCertBuilder;
use conductor_types::app::{DayProof, SignatureShare, ValidatorId, ValidatorSet};
use conductor_types::error::ConsensusError;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, warn};

/// Accumulates per-day proofs and completion times, and runs canonical
/// selection.
#[derive(Debug, Default)]
pub struct DayConsensus {
    proofs: HashMap<u32, BTreeMap<ValidatorId, DayProof>>,
    completion_millis: HashMap<u32, BTreeMap<ValidatorId, u64>>,
}

impl DayConsensus {
    /// Creates an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Verifies and records one validator's proof for a day.
    ///
    /// Proofs with bad signatures, from unknown or blacklisted validators,
    /// are dropped (they may be Byzantine). Duplicates are idempotent.
    pub fn record_proof(&mut self, proof: DayProof, set: &ValidatorSet) -> Result<(), ConsensusError> {
        if set.is_blacklisted(&proof.validator_id) {
            debug!(
                target: "consensus",
                day = proof.day_number,
                from = %proof.validator_id,
                "ignoring proof from blacklisted validator"
            );
            return Ok(());
        }
        if !set.is_active(&proof.validator_id) {
            return Err(ConsensusError::UnknownProposer(proof.validator_id));
        }
        if verify_signature(&proof.validator_id, proof.signing_bytes(), &proof.signature).is_err() {
            warn!(
                target: "consensus",
                day = proof.day_number,
                from = %proof.validator_id,
                "dropping day proof with bad signature"
            );
            return Err(ConsensusError::InvalidSignature);
        }
        self.proofs
            .entry(proof.day_number)
            .or_default()
            .entry(proof.validator_id)
            .or_insert(proof);
        Ok(())
    }

    /// Records one validator's VDF wall-clock completion time.
    pub fn record_completion_time(&mut self, day: u32, validator: ValidatorId, millis: u64) {
        if millis == 0 {
            return;
        }
        self.completion_millis
            .entry(day)
            .or_default()
            .insert(validator, millis);
    }

    /// The median completion time for a day, if any were reported.
    pub fn median_completion_millis(&self, day: u32) -> Option<u64> {
        let times = self.completion_millis.get(&day)?;
        if times.is_empty() {
            return None;
        }
        let mut sorted: Vec<u64> = times.values().copied().collect();
        sorted.sort_unstable();
        Some(sorted[sorted.len() / 2])
    }

    /// The number of distinct proofs recorded for a day.
    pub fn proof_count(&self, day: u32) -> usize {
        self.proofs.get(&day).map(|m| m.len()).unwrap_or(0)
    }

    /// Runs canonical selection for a day.
    ///
    /// Returns the certified canonical proof once at least `2f+1` recorded
    /// proofs agree byte-for-byte; otherwise `ConsensusError::NoQuorum`. The
    /// returned proof is the agreeing group member with the lowest validator
    /// id, so every honest node materializes the identical object.
    pub fn select_canonical(
        &self,
        day: u32,
        set: &ValidatorSet,
    ) -> Result<DayProof, ConsensusError> {
        let threshold = set.quorum_threshold();
        let proofs = self.proofs.get(&day);
        let empty = BTreeMap::new();
        let proofs = proofs.unwrap_or(&empty);

        // Group by proof bytes. BTreeMap iteration keeps group membership
        // ordered by validator id.
        let mut groups: HashMap<[u8; 32], Vec<&DayProof>> = HashMap::new();
        for proof in proofs.values() {
            // Blacklisting may have happened after recording.
            if !set.is_active(&proof.validator_id) {
                continue;
            }
            groups.entry(proof.proof).or_default().push(proof);
        }

        let largest = groups.values().map(|g| g.len()).max().unwrap_or(0);
        let Some(agreeing) = groups.into_values().find(|g| g.len() >= threshold) else {
            return Err(ConsensusError::NoQuorum {
                day,
                agreeing: largest,
                needed: threshold,
            });
        };

        // Certify the agreed value: every member signed the proof bytes, so
        // those signatures are the certificate shares.
        let canonical_value = agreeing[0].proof;
        let mut builder = QuorumCertBuilder::new(day as u64, canonical_value, threshold);
        for proof in &agreeing {
            let index = set
                .share_index(&proof.validator_id)
                .ok_or(ConsensusError::UnknownProposer(proof.validator_id))?;
            builder.add(
                proof.validator_id,
                SignatureShare {
                    index,
                    signature: proof.signature,
                },
            )?;
        }
        let quorum_cert = builder.build()?;

        let mut canonical = agreeing[0].clone();
        canonical.quorum_cert = Some(quorum_cert);
        info!(
            target: "consensus",
            day,
            agreeing = agreeing.len(),
            threshold,
            "canonical day proof selected"
        );
        Ok(canonical)
    }

    /// Drops state for days before `day` once the pipeline has advanced.
    pub fn gc_before(&mut self, day: u32) {
        self.proofs.retain(|d, _| *d >= day);
        self.completion_millis.retain(|d, _| *d >= day);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conductor_crypto::sign::Keypair;
    use conductor_crypto::threshold::verify_quorum_cert;

    fn cluster(n: usize) -> (Vec<Keypair>, ValidatorSet) {
        let keypairs: Vec<Keypair> = (0..n).map(|_| Keypair::generate()).collect();
        let set = ValidatorSet::new(keypairs.iter().map(|k| k.validator_id()));
        (keypairs, set)
    }

    fn proof_from(kp: &Keypair, day: u32, value: [u8; 32]) -> DayProof {
        DayProof {
            day_number: day,
            proof: value,
            validator_id: kp.validator_id(),
            signature: kp.sign(&value),
            quorum_cert: None,
        }
    }

    #[test]
    fn three_agree_one_bitflipped_converges() {
        let (keypairs, set) = cluster(4);
        let good = [0xAB; 32];
        let mut flipped = good;
        flipped[0] ^= 0x01;

        let mut consensus = DayConsensus::new();
        for kp in &keypairs[..3] {
            consensus.record_proof(proof_from(kp, 1, good), &set).unwrap();
        }
        consensus
            .record_proof(proof_from(&keypairs[3], 1, flipped), &set)
            .unwrap();

        let canonical = consensus.select_canonical(1, &set).unwrap();
        assert_eq!(canonical.proof, good);
        let qc = canonical.quorum_cert.as_ref().unwrap();
        assert_eq!(qc.signer_count(), 3);
        assert!(verify_quorum_cert(qc, &set, set.quorum_threshold()).is_ok());
        // The certified payload is the proof value itself.
        assert_eq!(qc.payload_hash, good);
    }

    #[test]
    fn selection_is_deterministic_across_nodes() {
        let (keypairs, set) = cluster(4);
        let value = [0x11; 32];

        // Two nodes record the same proofs in different orders.
        let mut a = DayConsensus::new();
        let mut b = DayConsensus::new();
        for kp in &keypairs[..3] {
            a.record_proof(proof_from(kp, 2, value), &set).unwrap();
        }
        for kp in keypairs[..3].iter().rev() {
            b.record_proof(proof_from(kp, 2, value), &set).unwrap();
        }

        let ca = a.select_canonical(2, &set).unwrap();
        let cb = b.select_canonical(2, &set).unwrap();
        assert_eq!(ca, cb);
    }

    #[test]
    fn no_quorum_is_an_error_not_a_guess() {
        let (keypairs, set) = cluster(4);
        let mut consensus = DayConsensus::new();
        // Four validators, four different proof values.
        for (i, kp) in keypairs.iter().enumerate() {
            consensus
                .record_proof(proof_from(kp, 3, [i as u8; 32]), &set)
                .unwrap();
        }
        assert!(matches!(
            consensus.select_canonical(3, &set),
            Err(ConsensusError::NoQuorum {
                day: 3,
                agreeing: 1,
                needed: 3
            })
        ));
    }

    #[test]
    fn bad_signature_is_dropped() {
        let (keypairs, set) = cluster(4);
        let mut consensus = DayConsensus::new();
        let mut proof = proof_from(&keypairs[0], 1, [5; 32]);
        proof.signature.0[0] ^= 0xFF;
        assert!(matches!(
            consensus.record_proof(proof, &set),
            Err(ConsensusError::InvalidSignature)
        ));
        assert_eq!(consensus.proof_count(1), 0);
    }

    #[test]
    fn blacklisted_proofs_are_ignored_silently() {
        let (keypairs, mut set) = cluster(4);
        set.blacklist(keypairs[3].validator_id());

        let mut consensus = DayConsensus::new();
        consensus
            .record_proof(proof_from(&keypairs[3], 1, [5; 32]), &set)
            .unwrap();
        assert_eq!(consensus.proof_count(1), 0);
    }

    #[test]
    fn median_completion_time() {
        let (keypairs, _) = cluster(4);
        let mut consensus = DayConsensus::new();
        assert_eq!(consensus.median_completion_millis(1), None);

        for (kp, millis) in keypairs.iter().zip([100u64, 900, 300, 500]) {
            consensus.record_completion_time(1, kp.validator_id(), millis);
        }
        // Sorted: 100 300 500 900 → upper median 500.
        assert_eq!(consensus.median_completion_millis(1), Some(500));

        // Zero reports are discarded.
        consensus.record_completion_time(2, keypairs[0].validator_id(), 0);
        assert_eq!(consensus.median_completion_millis(2), None);
    }
}
