// Path: crates/node/tests/epoch_e2e.rs
//! End-to-end epoch consensus through the ingress surface.

mod common;

use common::{fast_config, spawn_cluster, wait_for};
use conductor_crypto::threshold::QuorumCertBuilder;
use conductor_network::PeerExchange;
use conductor_node::{ConsensusStatus, IngressService};
use conductor_types::app::{
    Event, EventPayload, PeerMessage, Signature64, SignatureShare, ValidatorSet,
};
use conductor_types::error::IngressError;
use std::time::Duration;

fn sample_event(day: u32) -> Event {
    Event {
        creation_day: day,
        sig: Signature64([0; 64]),
        payload: EventPayload::Moderation {
            target_ref: format!("post/{}", day),
            action: "remove".to_string(),
            reason_hash: [day as u8; 32],
        },
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn submitted_batch_commits_across_the_cluster() {
    let cluster = spawn_cluster(4, fast_config());
    let ingress = IngressService::new(cluster.nodes[0].context(), cluster.nodes[0].network());

    // Empty batches are rejected up front.
    assert!(matches!(
        ingress.submit_event_batch(0, vec![]).await,
        Err(IngressError::Precondition(_))
    ));

    let receipt = ingress
        .submit_event_batch(0, vec![sample_event(1), sample_event(2)])
        .await
        .unwrap();
    assert_eq!(receipt.status, ConsensusStatus::Pending);

    // Every node delivers the batch via reliable broadcast.
    let delivered = wait_for(Duration::from_secs(15), || async {
        let mut all = true;
        for node in &cluster.nodes {
            let ctx = node.context();
            let ctx = ctx.lock().await;
            all &= ctx.engine.expected_commit(0).map(|(_, hashes)| !hashes.is_empty()).unwrap_or(false);
        }
        all
    })
    .await;
    assert!(delivered, "batch never completed reliable broadcast");

    // Certify the expected digest with a validator supermajority and inject
    // the commit.
    let (digest, ordered) = {
        let ctx = cluster.nodes[0].context();
        let ctx = ctx.lock().await;
        ctx.engine.expected_commit(0).unwrap()
    };
    assert_eq!(ordered, vec![receipt.batch_id]);

    let set = ValidatorSet::new(cluster.keypairs.iter().map(|k| k.validator_id()));
    let mut builder = QuorumCertBuilder::new(0, digest, set.quorum_threshold());
    for kp in cluster.keypairs.iter().take(set.quorum_threshold()) {
        builder
            .add(
                kp.validator_id(),
                SignatureShare {
                    index: set.share_index(&kp.validator_id()).unwrap(),
                    signature: kp.sign(&digest),
                },
            )
            .unwrap();
    }
    let qc = builder.build().unwrap();

    let injector = cluster.injector();
    injector
        .broadcast(PeerMessage::Commit {
            epoch: 0,
            block_digest: digest,
            quorum_cert: qc,
        })
        .await
        .unwrap();

    // All nodes commit the same block and advance to epoch 1.
    let committed = wait_for(Duration::from_secs(15), || async {
        let mut all = true;
        for node in &cluster.nodes {
            let ctx = node.context();
            let ctx = ctx.lock().await;
            all &= ctx.engine.current_epoch() == 1;
        }
        all
    })
    .await;
    assert!(committed, "commit did not propagate");

    for node in &cluster.nodes {
        let ctx = node.context();
        let ctx = ctx.lock().await;
        let block = ctx.store.get_block(0).unwrap().unwrap();
        assert_eq!(block.block_digest, digest);
        assert_eq!(block.ordered_proposals, vec![receipt.batch_id]);
    }

    // The ingress surface reflects the commitment.
    assert_eq!(
        ingress.get_consensus_status(receipt.batch_id).await.unwrap(),
        ConsensusStatus::Committed
    );
    let block = ingress.get_block(0).await.unwrap();
    assert_eq!(block.block_digest, digest);

    // Reads for absent objects are not-found, not errors.
    assert!(matches!(
        ingress.get_block(99).await,
        Err(IngressError::NotFound(_))
    ));
    assert!(matches!(
        ingress.get_day_proof(99).await,
        Err(IngressError::NotFound(_))
    ));

    cluster.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn wrong_epoch_submission_is_a_precondition_failure() {
    let cluster = spawn_cluster(4, fast_config());
    let ingress = IngressService::new(cluster.nodes[0].context(), cluster.nodes[0].network());

    assert!(matches!(
        ingress.submit_event_batch(7, vec![sample_event(1)]).await,
        Err(IngressError::Precondition(_))
    ));

    cluster.shutdown().await;
}
