// Path: crates/node/src/sync.rs
//! Historical proof sync at startup.
//!
//! Canonical proofs arrive over the peer exchange as `CanonicalProof`
//! advertisements and accrete into the local store, so sync reduces to a
//! walk over local storage: find the highest canonical day reachable from
//! day 0 without a gap, the highest contiguous local proof, and resume at
//! `max(highest_canonical, highest_local) + 1`.

use conductor_storage::ProofStore;
use conductor_types::error::StorageError;
use tracing::info;

/// What the startup walk found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOutcome {
    /// The highest contiguous day with a quorum-certified proof.
    pub highest_canonical: Option<u32>,
    /// The highest contiguous day with any local proof.
    pub highest_local: Option<u32>,
    /// The day the pipeline resumes at.
    pub resume_day: u32,
}

/// Walks local storage and determines the resume day.
pub fn sync_from_store(store: &ProofStore) -> Result<SyncOutcome, StorageError> {
    let mut highest_canonical = None;
    let mut highest_local = None;
    let mut day = 0u32;
    // Walk forward until the first gap; contiguity is the invariant that
    // matters, a proof beyond a gap cannot be trusted to chain.
    while let Some(proof) = store.get_proof(day)? {
        highest_local = Some(day);
        if proof.is_canonical() {
            highest_canonical = Some(day);
        }
        day = match day.checked_add(1) {
            Some(next) => next,
            None => break,
        };
    }

    let resume_day = match (highest_canonical, highest_local) {
        (None, None) => 0,
        (canonical, local) => canonical.max(local).map(|d| d + 1).unwrap_or(0),
    };
    info!(
        target: "node",
        ?highest_canonical,
        ?highest_local,
        resume_day,
        "historical proof sync complete"
    );
    Ok(SyncOutcome {
        highest_canonical,
        highest_local,
        resume_day,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use conductor_crypto::sign::Keypair;
    use conductor_crypto::threshold::QuorumCertBuilder;
    use conductor_types::app::{DayProof, SignatureShare};

    fn proof(day: u32, keypair: &Keypair, canonical: bool) -> DayProof {
        let value = [day as u8; 32];
        let quorum_cert = canonical.then(|| {
            let mut builder = QuorumCertBuilder::new(day as u64, value, 1);
            builder
                .add(
                    keypair.validator_id(),
                    SignatureShare {
                        index: 1,
                        signature: keypair.sign(&value),
                    },
                )
                .unwrap();
            builder.build().unwrap()
        });
        DayProof {
            day_number: day,
            proof: value,
            validator_id: keypair.validator_id(),
            signature: keypair.sign(&value),
            quorum_cert,
        }
    }

    #[test]
    fn empty_store_resumes_at_day_zero() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProofStore::open(dir.path().join("s.redb")).unwrap();
        let outcome = sync_from_store(&store).unwrap();
        assert_eq!(outcome.resume_day, 0);
        assert_eq!(outcome.highest_canonical, None);
    }

    #[test]
    fn resumes_after_highest_contiguous_proof() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProofStore::open(dir.path().join("s.redb")).unwrap();
        let kp = Keypair::generate();

        // Days 0..=2 canonical, day 3 local-only, day 5 beyond a gap.
        for day in 0..=2 {
            store.save_proof(&proof(day, &kp, true)).unwrap();
        }
        store.save_proof(&proof(3, &kp, false)).unwrap();
        store.save_proof(&proof(5, &kp, true)).unwrap();

        let outcome = sync_from_store(&store).unwrap();
        assert_eq!(outcome.highest_canonical, Some(2));
        assert_eq!(outcome.highest_local, Some(3));
        assert_eq!(outcome.resume_day, 4);
    }

    #[test]
    fn canonical_past_local_wins() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProofStore::open(dir.path().join("s.redb")).unwrap();
        let kp = Keypair::generate();
        for day in 0..=4 {
            store.save_proof(&proof(day, &kp, true)).unwrap();
        }
        let outcome = sync_from_store(&store).unwrap();
        assert_eq!(outcome.highest_canonical, Some(4));
        assert_eq!(outcome.resume_day, 5);
    }
}
