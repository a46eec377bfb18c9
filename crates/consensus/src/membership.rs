// Path: crates/consensus/src/membership.rs
//! Validator lifecycle: quorum-guarded membership changes and blacklist
//! voting.

use conductor_crypto::hash::blake3_32;
use conductor_crypto::sign::verify_signature;
use conductor_crypto::threshold::verify_quorum_cert;
use conductor_types::app::{
    blacklist_vote_signing_bytes, MembershipKind, MembershipUpdate, QuorumCertificate, Signature64,
    ValidatorId, ValidatorSet,
};
use conductor_types::codec;
use conductor_types::error::ConsensusError;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{info, warn};

/// The canonical payload hash certified by a membership-change certificate.
pub fn membership_payload_hash(update: &MembershipUpdate) -> [u8; 32] {
    blake3_32(codec::to_bytes_canonical(update))
}

/// Holds verified membership changes until their effective day arrives.
#[derive(Debug, Default)]
pub struct MembershipManager {
    pending: BTreeMap<u32, Vec<MembershipUpdate>>,
}

impl MembershipManager {
    /// Creates an empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Verifies a committed membership change and queues it for activation.
    ///
    /// The quorum certificate must cover the canonical bytes of the update;
    /// an unverifiable certificate rejects the change.
    pub fn submit(
        &mut self,
        update: MembershipUpdate,
        quorum_cert: &QuorumCertificate,
        set: &ValidatorSet,
    ) -> Result<(), ConsensusError> {
        let expected = membership_payload_hash(&update);
        if quorum_cert.payload_hash != expected {
            return Err(ConsensusError::InvalidQuorumCert(
                "membership certificate covers different bytes".to_string(),
            ));
        }
        verify_quorum_cert(quorum_cert, set, set.quorum_threshold())
            .map_err(|e| ConsensusError::InvalidQuorumCert(e.to_string()))?;
        self.pending.entry(update.effective_day).or_default().push(update);
        Ok(())
    }

    /// Applies every queued change whose effective day has arrived. Returns
    /// the updates that changed the set.
    pub fn activate_for_day(&mut self, day: u32, set: &mut ValidatorSet) -> Vec<MembershipUpdate> {
        let due: Vec<u32> = self
            .pending
            .keys()
            .copied()
            .take_while(|d| *d <= day)
            .collect();
        let mut applied = Vec::new();
        for effective in due {
            let Some(updates) = self.pending.remove(&effective) else {
                continue;
            };
            for update in updates {
                let changed = match update.kind {
                    MembershipKind::Add => {
                        let added = set.add(update.validator);
                        if !added {
                            // Idempotent: re-adding is a no-op.
                            info!(
                                target: "consensus",
                                validator = %update.validator,
                                "membership add was a no-op"
                            );
                        }
                        added
                    }
                    MembershipKind::Remove => {
                        let removed = set.remove(&update.validator);
                        if !removed {
                            warn!(
                                target: "consensus",
                                validator = %update.validator,
                                "membership remove of absent validator"
                            );
                        }
                        removed
                    }
                };
                if changed {
                    info!(
                        target: "consensus",
                        validator = %update.validator,
                        kind = ?update.kind,
                        effective,
                        "membership change applied"
                    );
                    applied.push(update);
                }
            }
        }
        applied
    }

    /// The number of changes awaiting their effective day.
    pub fn pending_count(&self) -> usize {
        self.pending.values().map(|v| v.len()).sum()
    }
}

/// Accumulates signed blacklist votes and evicts targets on quorum.
#[derive(Debug, Default)]
pub struct BlacklistTracker {
    votes: HashMap<ValidatorId, BTreeSet<ValidatorId>>,
}

impl BlacklistTracker {
    /// Creates an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Verifies and records a vote against `target`.
    ///
    /// Returns `Some(target)` when this vote completed the `2f+1` quorum and
    /// the target was moved to the blacklist; the caller must then discard
    /// the target's pending consensus state. Votes from blacklisted or
    /// unknown voters are ignored.
    pub fn handle_vote(
        &mut self,
        epoch: u64,
        voter: ValidatorId,
        target: ValidatorId,
        reason: &str,
        signature: &Signature64,
        set: &mut ValidatorSet,
    ) -> Result<Option<ValidatorId>, ConsensusError> {
        if !set.is_active(&voter) {
            // Blacklisted validators' future messages are ignored.
            return Ok(None);
        }
        if set.is_blacklisted(&target) {
            return Ok(None);
        }
        let signing_bytes = blacklist_vote_signing_bytes(epoch, &voter, &target, reason);
        verify_signature(&voter, &signing_bytes, signature)
            .map_err(|_| ConsensusError::InvalidSignature)?;

        let voters = self.votes.entry(target).or_default();
        voters.insert(voter);
        info!(
            target: "consensus",
            %voter,
            target_validator = %target,
            reason,
            votes = voters.len(),
            "blacklist vote recorded"
        );

        if voters.len() >= set.quorum_threshold() {
            set.blacklist(target);
            self.votes.remove(&target);
            warn!(
                target: "consensus",
                target_validator = %target,
                "validator blacklisted by supermajority vote"
            );
            return Ok(Some(target));
        }
        Ok(None)
    }

    /// The number of distinct voters currently against `target`.
    pub fn vote_count(&self, target: &ValidatorId) -> usize {
        self.votes.get(target).map(|v| v.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conductor_crypto::sign::Keypair;
    use conductor_crypto::threshold::QuorumCertBuilder;
    use conductor_types::app::SignatureShare;

    fn cluster(n: usize) -> (Vec<Keypair>, ValidatorSet) {
        let keypairs: Vec<Keypair> = (0..n).map(|_| Keypair::generate()).collect();
        let set = ValidatorSet::new(keypairs.iter().map(|k| k.validator_id()));
        (keypairs, set)
    }

    fn certified_update(
        update: &MembershipUpdate,
        signers: &[Keypair],
        set: &ValidatorSet,
    ) -> QuorumCertificate {
        let payload = membership_payload_hash(update);
        let mut builder = QuorumCertBuilder::new(0, payload, set.quorum_threshold());
        for kp in signers {
            let share = SignatureShare {
                index: set.share_index(&kp.validator_id()).unwrap(),
                signature: kp.sign(&payload),
            };
            builder.add(kp.validator_id(), share).unwrap();
        }
        builder.build().unwrap()
    }

    fn signed_vote(
        kp: &Keypair,
        epoch: u64,
        target: ValidatorId,
        reason: &str,
    ) -> (ValidatorId, Signature64) {
        let bytes = blacklist_vote_signing_bytes(epoch, &kp.validator_id(), &target, reason);
        (kp.validator_id(), kp.sign(&bytes))
    }

    #[test]
    fn membership_add_waits_for_effective_day() {
        let (keypairs, mut set) = cluster(4);
        let newcomer = Keypair::generate().validator_id();
        let update = MembershipUpdate {
            kind: MembershipKind::Add,
            validator: newcomer,
            effective_day: 5,
        };
        let qc = certified_update(&update, &keypairs[..3], &set);

        let mut manager = MembershipManager::new();
        manager.submit(update, &qc, &set).unwrap();
        assert_eq!(manager.pending_count(), 1);

        assert!(manager.activate_for_day(4, &mut set).is_empty());
        assert!(!set.is_active(&newcomer));

        let applied = manager.activate_for_day(5, &mut set);
        assert_eq!(applied.len(), 1);
        assert!(set.is_active(&newcomer));
        assert_eq!(manager.pending_count(), 0);
    }

    #[test]
    fn membership_requires_a_valid_certificate() {
        let (keypairs, set) = cluster(4);
        let update = MembershipUpdate {
            kind: MembershipKind::Remove,
            validator: keypairs[0].validator_id(),
            effective_day: 1,
        };
        // Only two signers: below 2f+1 = 3.
        let payload = membership_payload_hash(&update);
        let mut builder = QuorumCertBuilder::new(0, payload, 2);
        for kp in &keypairs[..2] {
            builder
                .add(
                    kp.validator_id(),
                    SignatureShare {
                        index: set.share_index(&kp.validator_id()).unwrap(),
                        signature: kp.sign(&payload),
                    },
                )
                .unwrap();
        }
        let weak_qc = builder.build().unwrap();

        let mut manager = MembershipManager::new();
        assert!(matches!(
            manager.submit(update, &weak_qc, &set),
            Err(ConsensusError::InvalidQuorumCert(_))
        ));
    }

    #[test]
    fn membership_rejects_certificate_over_other_bytes() {
        let (keypairs, set) = cluster(4);
        let update = MembershipUpdate {
            kind: MembershipKind::Add,
            validator: Keypair::generate().validator_id(),
            effective_day: 1,
        };
        let other = MembershipUpdate {
            kind: MembershipKind::Remove,
            validator: keypairs[0].validator_id(),
            effective_day: 1,
        };
        let qc = certified_update(&other, &keypairs[..3], &set);
        let mut manager = MembershipManager::new();
        assert!(manager.submit(update, &qc, &set).is_err());
    }

    #[test]
    fn readding_existing_validator_is_a_noop() {
        let (keypairs, mut set) = cluster(4);
        let update = MembershipUpdate {
            kind: MembershipKind::Add,
            validator: keypairs[0].validator_id(),
            effective_day: 1,
        };
        let qc = certified_update(&update, &keypairs[..3], &set);
        let mut manager = MembershipManager::new();
        manager.submit(update, &qc, &set).unwrap();
        assert!(manager.activate_for_day(1, &mut set).is_empty());
        assert_eq!(set.len(), 4);
    }

    #[test]
    fn blacklist_quorum_evicts_target() {
        let (keypairs, mut set) = cluster(4);
        let target = keypairs[2].validator_id();
        let mut tracker = BlacklistTracker::new();

        for kp in [&keypairs[0], &keypairs[1]] {
            let (voter, sig) = signed_vote(kp, 1, target, "invalid proofs");
            assert_eq!(
                tracker
                    .handle_vote(1, voter, target, "invalid proofs", &sig, &mut set)
                    .unwrap(),
                None
            );
        }
        assert_eq!(tracker.vote_count(&target), 2);
        assert!(set.is_active(&target));

        let (voter, sig) = signed_vote(&keypairs[3], 1, target, "invalid proofs");
        let evicted = tracker
            .handle_vote(1, voter, target, "invalid proofs", &sig, &mut set)
            .unwrap();
        assert_eq!(evicted, Some(target));
        assert!(!set.is_active(&target));
        assert!(set.is_blacklisted(&target));
        // Votes are cleared after eviction.
        assert_eq!(tracker.vote_count(&target), 0);
    }

    #[test]
    fn duplicate_voters_do_not_stack() {
        let (keypairs, mut set) = cluster(4);
        let target = keypairs[3].validator_id();
        let mut tracker = BlacklistTracker::new();

        for _ in 0..3 {
            let (voter, sig) = signed_vote(&keypairs[0], 1, target, "spam");
            tracker
                .handle_vote(1, voter, target, "spam", &sig, &mut set)
                .unwrap();
        }
        assert_eq!(tracker.vote_count(&target), 1);
        assert!(set.is_active(&target));
    }

    #[test]
    fn blacklisted_voters_are_ignored() {
        let (keypairs, mut set) = cluster(4);
        let target = keypairs[0].validator_id();
        set.blacklist(keypairs[1].validator_id());

        let mut tracker = BlacklistTracker::new();
        let (voter, sig) = signed_vote(&keypairs[1], 1, target, "revenge");
        assert_eq!(
            tracker
                .handle_vote(1, voter, target, "revenge", &sig, &mut set)
                .unwrap(),
            None
        );
        assert_eq!(tracker.vote_count(&target), 0);
    }

    #[test]
    fn forged_vote_signature_is_rejected() {
        let (keypairs, mut set) = cluster(4);
        let target = keypairs[2].validator_id();
        let mut tracker = BlacklistTracker::new();

        let (voter, mut sig) = signed_vote(&keypairs[0], 1, target, "x");
        sig.0[0] ^= 0xFF;
        assert!(matches!(
            tracker.handle_vote(1, voter, target, "x", &sig, &mut set),
            Err(ConsensusError::InvalidSignature)
        ));
    }
}
