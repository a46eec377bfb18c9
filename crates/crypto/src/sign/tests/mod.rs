// Path: crates/crypto/src/sign/tests/mod.rs
use super::*;

#[test]
fn sign_and_verify_roundtrip() {
    let keypair = Keypair::generate();
    let message = b"day proof bytes";

    let signature = keypair.sign(message);
    assert!(verify_signature(&keypair.validator_id(), message, &signature).is_ok());
}

#[test]
fn seed_roundtrip_produces_identical_signatures() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("validator_key.seed");

    let original = Keypair::generate();
    let seed = original.signing.to_bytes();
    std::fs::write(&path, seed).unwrap();

    let loaded = Keypair::load(&path).unwrap();
    assert_eq!(original.validator_id(), loaded.validator_id());

    // Ed25519 is deterministic, so both pairs sign identically.
    let message = b"persistence check";
    assert_eq!(original.sign(message).0, loaded.sign(message).0);
}

#[test]
fn wrong_key_fails_verification() {
    let a = Keypair::generate();
    let b = Keypair::generate();
    let message = b"message";

    let signature = a.sign(message);
    assert!(verify_signature(&b.validator_id(), message, &signature).is_err());
}

#[test]
fn tampered_message_fails_verification() {
    let keypair = Keypair::generate();
    let signature = keypair.sign(b"original");
    assert!(verify_signature(&keypair.validator_id(), b"original", &signature).is_ok());
    assert!(verify_signature(&keypair.validator_id(), b"tampered", &signature).is_err());
}

#[test]
fn short_seed_is_rejected() {
    assert!(matches!(
        Keypair::from_seed_bytes(&[0u8; 16]),
        Err(CryptoError::InvalidKey(_))
    ));
}
