// Path: crates/crypto/src/threshold/tests/mod.rs
use super::*;
use crate::hash::blake3_32;

#[test]
fn shamir_roundtrip_exact_threshold() {
    let crypto = ThresholdCrypto::new(5, 3).unwrap();
    let secret = blake3_32(b"the day counter secret");

    let shares = crypto.generate_shares(&secret);
    assert_eq!(shares.len(), 5);

    // Any t shares reconstruct.
    let reconstructed = crypto.reconstruct(&shares[..3]).unwrap();
    assert_eq!(reconstructed, secret);

    // A different subset reconstructs the same value.
    let subset = [shares[0], shares[2], shares[4]];
    assert_eq!(crypto.reconstruct(&subset).unwrap(), secret);

    // More than t also works.
    assert_eq!(crypto.reconstruct(&shares).unwrap(), secret);
}

#[test]
fn subthreshold_reconstruction_fails() {
    let crypto = ThresholdCrypto::new(4, 3).unwrap();
    let shares = crypto.generate_shares(&blake3_32(b"secret"));

    let err = crypto.reconstruct(&shares[..2]).unwrap_err();
    assert!(matches!(
        err,
        CryptoError::InsufficientShares { needed: 3, got: 2 }
    ));
}

#[test]
fn long_secret_is_hashed_down() {
    let crypto = ThresholdCrypto::new(4, 2).unwrap();
    let long = vec![0xAB; 100];
    let shares = crypto.generate_shares(&long);
    assert_eq!(crypto.reconstruct(&shares[..2]).unwrap(), blake3_32(&long));
}

#[test]
fn short_secret_is_left_padded() {
    let crypto = ThresholdCrypto::new(3, 2).unwrap();
    let shares = crypto.generate_shares(b"short");
    let mut expected = [0u8; 32];
    expected[27..].copy_from_slice(b"short");
    assert_eq!(crypto.reconstruct(&shares[..2]).unwrap(), expected);
}

#[test]
fn invalid_parameters_are_rejected() {
    assert!(ThresholdCrypto::new(3, 4).is_err());
    assert!(ThresholdCrypto::new(3, 0).is_err());
    assert!(ThresholdCrypto::new(1, 1).is_ok());
}

#[test]
fn duplicate_share_indexes_are_rejected() {
    let crypto = ThresholdCrypto::new(4, 2).unwrap();
    let shares = crypto.generate_shares(&blake3_32(b"s"));
    let dup = [shares[0], shares[0]];
    assert!(crypto.reconstruct(&dup).is_err());
}

#[test]
fn aggregation_is_order_independent() {
    let crypto = ThresholdCrypto::new(4, 3).unwrap();
    let keypairs: Vec<Keypair> = (0..4).map(|_| Keypair::generate()).collect();
    let message = b"COIN_5_0";

    let shares: Vec<SignatureShare> = keypairs
        .iter()
        .enumerate()
        .map(|(i, kp)| ThresholdCrypto::sign_share(kp, i as u32 + 1, message))
        .collect();

    let forward = crypto.aggregate_signatures(&shares[..3]).unwrap();
    let mut reversed = shares[..3].to_vec();
    reversed.reverse();
    let backward = crypto.aggregate_signatures(&reversed).unwrap();
    assert_eq!(forward, backward);
}

#[test]
fn aggregate_verification_counts_valid_components() {
    let crypto = ThresholdCrypto::new(4, 3).unwrap();
    let keypairs: Vec<Keypair> = (0..4).map(|_| Keypair::generate()).collect();
    let ids: Vec<ValidatorId> = keypairs.iter().map(|k| k.validator_id()).collect();
    let message = b"aggregate me";

    let shares: Vec<SignatureShare> = keypairs
        .iter()
        .enumerate()
        .map(|(i, kp)| ThresholdCrypto::sign_share(kp, i as u32 + 1, message))
        .collect();

    let aggregated = crypto.aggregate_signatures(&shares).unwrap();
    let resolve = |index: u32| ids.get(index as usize - 1).copied();

    assert!(crypto.verify_aggregated(message, &aggregated, resolve).is_ok());
    // The same aggregate over a different message fails.
    assert!(crypto
        .verify_aggregated(b"other message", &aggregated, resolve)
        .is_err());
}

#[test]
fn quorum_cert_build_and_verify() {
    let keypairs: Vec<Keypair> = (0..4).map(|_| Keypair::generate()).collect();
    let set = ValidatorSet::new(keypairs.iter().map(|k| k.validator_id()));
    let threshold = set.quorum_threshold();
    assert_eq!(threshold, 3);

    let payload_hash = blake3_32(b"block digest");
    let mut builder = QuorumCertBuilder::new(7, payload_hash, threshold);
    for kp in &keypairs[..3] {
        let index = set.share_index(&kp.validator_id()).unwrap();
        let share = SignatureShare {
            index,
            signature: kp.sign(&payload_hash),
        };
        builder.add(kp.validator_id(), share).unwrap();
    }
    assert!(builder.is_complete());
    let qc = builder.build().unwrap();
    assert_eq!(qc.signer_count(), 3);

    assert!(verify_quorum_cert(&qc, &set, threshold).is_ok());
}

#[test]
fn quorum_cert_rejects_unknown_validator() {
    let keypairs: Vec<Keypair> = (0..4).map(|_| Keypair::generate()).collect();
    let set = ValidatorSet::new(keypairs.iter().map(|k| k.validator_id()));
    let payload_hash = blake3_32(b"payload");

    let outsider = Keypair::generate();
    let mut builder = QuorumCertBuilder::new(1, payload_hash, 3);
    for kp in keypairs.iter().take(2).chain([&outsider]) {
        let share = SignatureShare {
            index: 1,
            signature: kp.sign(&payload_hash),
        };
        builder.add(kp.validator_id(), share).unwrap();
    }
    let qc = builder.build().unwrap();

    assert!(matches!(
        verify_quorum_cert(&qc, &set, 3),
        Err(CryptoError::InvalidQuorumCert(_))
    ));
}

#[test]
fn quorum_cert_rejects_bad_share() {
    let keypairs: Vec<Keypair> = (0..4).map(|_| Keypair::generate()).collect();
    let set = ValidatorSet::new(keypairs.iter().map(|k| k.validator_id()));
    let payload_hash = blake3_32(b"payload");

    let mut builder = QuorumCertBuilder::new(1, payload_hash, 3);
    for kp in &keypairs[..3] {
        let share = SignatureShare {
            index: set.share_index(&kp.validator_id()).unwrap(),
            signature: kp.sign(&payload_hash),
        };
        builder.add(kp.validator_id(), share).unwrap();
    }
    let mut qc = builder.build().unwrap();

    // Corrupt one share after construction.
    let first = *qc.signatures.keys().next().unwrap();
    if let Some(share) = qc.signatures.get_mut(&first) {
        share.signature.0[0] ^= 0xFF;
    }
    assert!(verify_quorum_cert(&qc, &set, 3).is_err());
}

#[test]
fn builder_rejects_share_signed_over_wrong_payload() {
    let kp = Keypair::generate();
    let mut builder = QuorumCertBuilder::new(1, blake3_32(b"right"), 1);
    let share = SignatureShare {
        index: 1,
        signature: kp.sign(&blake3_32(b"wrong")),
    };
    assert!(builder.add(kp.validator_id(), share).is_err());
}
