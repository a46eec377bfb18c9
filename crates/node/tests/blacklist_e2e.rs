// Path: crates/node/tests/blacklist_e2e.rs
//! Blacklist voting over a live cluster: quorum eviction and subsequent
//! message suppression.

mod common;

use common::{fast_config, spawn_cluster, wait_for};
use conductor_network::PeerExchange;
use conductor_types::app::{blacklist_vote_signing_bytes, DayProof, PeerMessage};
use std::time::Duration;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn three_votes_evict_and_silence_the_target() {
    // Four validators in the set; the target does not run a node.
    let cluster = common::spawn_cluster_subset(4, 3, fast_config());
    let target = cluster.keypairs[3].validator_id();
    let injector = cluster.injector();

    // Three distinct voters sign and publish votes against the target.
    for voter in [&cluster.keypairs[0], &cluster.keypairs[1], &cluster.keypairs[2]] {
        let reason = "publishes invalid proofs";
        let bytes = blacklist_vote_signing_bytes(0, &voter.validator_id(), &target, reason);
        injector
            .broadcast(PeerMessage::BlacklistVote {
                epoch: 0,
                voter_id: voter.validator_id(),
                target_id: target,
                reason: reason.to_string(),
                signature: voter.sign(&bytes),
            })
            .await
            .unwrap();
    }

    // Every node moves the target from the active set to the blacklist.
    let evicted = wait_for(Duration::from_secs(15), || async {
        let mut all = true;
        for node in &cluster.nodes {
            let ctx = node.context();
            let ctx = ctx.lock().await;
            all &= ctx.validators.is_blacklisted(&target) && !ctx.validators.is_active(&target);
        }
        all
    })
    .await;
    assert!(evicted, "blacklist quorum did not take effect everywhere");

    // The eviction is durable.
    for node in &cluster.nodes {
        let ctx = node.context();
        let ctx = ctx.lock().await;
        let persisted = ctx.store.get_validator_set().unwrap().unwrap();
        assert!(persisted.is_blacklisted(&target));
    }

    // A later message from the target is ignored: its proof announcement
    // never lands in anyone's day-consensus state.
    let target_net = cluster.hub.register(target);
    let bogus = DayProof {
        day_number: 0,
        proof: [9; 32],
        validator_id: target,
        signature: cluster.keypairs[3].sign(&[9; 32]),
        quorum_cert: None,
    };
    target_net
        .broadcast(PeerMessage::DayProofAnnounce(bogus))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(500)).await;
    for node in &cluster.nodes {
        let ctx = node.context();
        let ctx = ctx.lock().await;
        // Only honest proofs (at most the three active validators') exist.
        assert!(ctx.day.proof_count(0) <= 3);
    }

    cluster.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn below_quorum_votes_do_not_evict() {
    let cluster = spawn_cluster(4, fast_config());
    let target = cluster.keypairs[3].validator_id();
    let injector = cluster.injector();

    for voter in [&cluster.keypairs[0], &cluster.keypairs[1]] {
        let reason = "suspicious";
        let bytes = blacklist_vote_signing_bytes(0, &voter.validator_id(), &target, reason);
        injector
            .broadcast(PeerMessage::BlacklistVote {
                epoch: 0,
                voter_id: voter.validator_id(),
                target_id: target,
                reason: reason.to_string(),
                signature: voter.sign(&bytes),
            })
            .await
            .unwrap();
    }

    tokio::time::sleep(Duration::from_millis(500)).await;
    for node in &cluster.nodes {
        let ctx = node.context();
        let ctx = ctx.lock().await;
        assert!(ctx.validators.is_active(&target));
        assert_eq!(ctx.blacklist.vote_count(&target), 2);
    }

    cluster.shutdown().await;
}
