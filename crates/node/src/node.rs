// Path: crates/node/src/node.rs
//! Validator node assembly and the message dispatch loop.

use crate::sync::sync_from_store;
use conductor_consensus::day::DayConsensus;
use conductor_consensus::epoch::EpochEngine;
use conductor_consensus::membership::{BlacklistTracker, MembershipManager};
use conductor_crypto::sign::Keypair;
use conductor_crypto::threshold::verify_quorum_cert;
use conductor_crypto::vdf::{CancelFlag, Vdf};
use conductor_network::{Inbound, PeerExchange};
use conductor_storage::ProofStore;
use conductor_telemetry::MetricsHandle;
use conductor_types::app::{DayProof, PeerMessage, ValidatorId, ValidatorSet, GENESIS_SEED};
use conductor_types::config::NodeConfig;
use conductor_types::error::ConsensusError;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

/// Everything mutable the node owns, guarded by one lock and driven by the
/// dispatch loop and the daily pipeline.
pub struct NodeContext {
    /// Loaded configuration.
    pub config: NodeConfig,
    /// The local signing key.
    pub keypair: Keypair,
    /// Current validator set and blacklist.
    pub validators: ValidatorSet,
    /// The epoch consensus engine.
    pub engine: EpochEngine,
    /// Day-proof accumulation and canonical selection.
    pub day: DayConsensus,
    /// Pending quorum-certified membership changes.
    pub membership: MembershipManager,
    /// Blacklist vote accumulation.
    pub blacklist: BlacklistTracker,
    /// The durable store.
    pub store: ProofStore,
    /// The VDF at its current difficulty.
    pub vdf: Vdf,
    /// The day the pipeline is working on. Monotone, never skips.
    pub current_day: u32,
    /// Metric sinks.
    pub metrics: MetricsHandle,
}

/// The assembled validator node.
pub struct ValidatorNode {
    context: Arc<Mutex<NodeContext>>,
    net: Arc<dyn PeerExchange>,
    cancel: CancelFlag,
}

impl ValidatorNode {
    /// Wires the subsystems together and runs historical sync.
    pub fn new(
        config: NodeConfig,
        keypair: Keypair,
        validators: ValidatorSet,
        store: ProofStore,
        net: Arc<dyn PeerExchange>,
        metrics: MetricsHandle,
    ) -> Result<Self, ConsensusError> {
        if validators.len() < config.consensus.min_validators {
            return Err(ConsensusError::InsufficientValidators {
                needed: config.consensus.min_validators,
                got: validators.len(),
            });
        }

        let outcome = sync_from_store(&store)?;
        let vdf = Vdf::new(
            GENESIS_SEED,
            config.vdf.iterations,
            config.vdf.progress_interval,
        );
        let engine = EpochEngine::new(
            keypair.clone(),
            &validators,
            store.clone(),
            metrics.consensus.clone(),
        )?;
        store.save_validator_set(&validators)?;
        metrics.vdf.set_current_day(outcome.resume_day);
        metrics.vdf.set_difficulty(config.vdf.iterations);

        let context = NodeContext {
            config,
            keypair,
            validators,
            engine,
            day: DayConsensus::new(),
            membership: MembershipManager::new(),
            blacklist: BlacklistTracker::new(),
            store,
            vdf,
            current_day: outcome.resume_day,
            metrics,
        };
        Ok(Self {
            context: Arc::new(Mutex::new(context)),
            net,
            cancel: CancelFlag::new(),
        })
    }

    /// The shared context handle (for the ingress service and tests).
    pub fn context(&self) -> Arc<Mutex<NodeContext>> {
        self.context.clone()
    }

    /// The transport handle.
    pub fn network(&self) -> Arc<dyn PeerExchange> {
        self.net.clone()
    }

    /// The cancellation flag shared with in-flight computations.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Requests shutdown: the VDF stops at its next progress checkpoint and
    /// the loops wind down after flushing in-progress work.
    pub fn shutdown(&self) {
        info!(target: "node", "shutdown requested");
        self.cancel.cancel();
    }

    /// Spawns the dispatch loop and the daily pipeline.
    pub fn start(&self, inbound: Box<dyn Inbound>) -> Vec<tokio::task::JoinHandle<()>> {
        let dispatch = {
            let context = self.context.clone();
            let net = self.net.clone();
            let cancel = self.cancel.clone();
            tokio::spawn(async move {
                run_dispatch(context, net, cancel, inbound).await;
            })
        };
        let pipeline = {
            let context = self.context.clone();
            let net = self.net.clone();
            let cancel = self.cancel.clone();
            tokio::spawn(async move {
                crate::pipeline::run_daily_pipeline(context, net, cancel).await;
            })
        };
        vec![dispatch, pipeline]
    }
}

/// Consumes inbound messages until shutdown. One message is handled at a
/// time, so consensus state mutations are serial; messages from a single
/// peer arrive in order through its queue.
pub async fn run_dispatch(
    context: Arc<Mutex<NodeContext>>,
    net: Arc<dyn PeerExchange>,
    cancel: CancelFlag,
    mut inbound: Box<dyn Inbound>,
) {
    info!(target: "node", "dispatch loop running");
    let mut idle_ticks = 0u32;
    loop {
        if cancel.is_cancelled() {
            break;
        }
        let next = tokio::time::timeout(Duration::from_millis(250), inbound.recv()).await;
        let Ok(message) = next else {
            // Idle: every couple of seconds, chase fragments that never
            // arrived so stalled broadcasts recover.
            idle_ticks += 1;
            if idle_ticks % 8 == 0 {
                let mut ctx = context.lock().await;
                let ctx = &mut *ctx;
                if let Err(error) = ctx.engine.rerequest_missing_fragments(net.as_ref()).await {
                    debug!(target: "node", %error, "fragment re-request failed");
                }
            }
            continue;
        };
        let Some((sender, message)) = message else {
            break; // Transport closed.
        };
        if let Err(error) = handle_message(&context, net.as_ref(), sender, message).await {
            match &error {
                ConsensusError::Storage(e) => {
                    // Storage failures are fatal: halt rather than diverge.
                    error!(target: "node", error = %e, "storage failure, halting node");
                    cancel.cancel();
                    break;
                }
                ConsensusError::CommitDigestMismatch { epoch } => {
                    // Fatal for the epoch: the engine refused to advance and
                    // the epoch will be retried.
                    error!(target: "node", epoch, "commit digest mismatch, epoch not advanced");
                }
                _ => {
                    // Cryptographic and validation failures recover locally
                    // by dropping the message.
                    debug!(target: "node", %error, %sender, "message dropped");
                }
            }
        }
    }
    info!(target: "node", "dispatch loop stopped");
}

async fn handle_message(
    context: &Arc<Mutex<NodeContext>>,
    net: &dyn PeerExchange,
    sender: ValidatorId,
    message: PeerMessage,
) -> Result<(), ConsensusError> {
    let mut ctx = context.lock().await;
    let ctx = &mut *ctx;

    // Blacklisted validators' future messages are ignored wholesale.
    if ctx.validators.is_blacklisted(&sender) {
        debug!(target: "node", %sender, "message from blacklisted validator ignored");
        return Ok(());
    }

    match message {
        PeerMessage::RbcPropose {
            epoch,
            proposer_id,
            payload_hash,
            merkle_root,
            data_len,
            k,
            n,
            fragments,
        } => {
            ctx.engine
                .handle_propose(
                    epoch,
                    proposer_id,
                    payload_hash,
                    merkle_root,
                    data_len,
                    k,
                    n,
                    fragments,
                    &ctx.validators,
                    net,
                )
                .await
        }
        PeerMessage::RbcFragment { fragment, .. } => {
            ctx.engine.handle_fragment(fragment, net).await
        }
        PeerMessage::FragmentRequest {
            batch_id,
            index,
            requester,
        } => {
            ctx.engine
                .handle_fragment_request(batch_id, index, requester, net)
                .await
        }
        PeerMessage::Ready {
            batch_id,
            merkle_root,
            sender: ready_sender,
        } => {
            ctx.engine
                .handle_ready(batch_id, merkle_root, ready_sender, net)
                .await
        }
        PeerMessage::EncShare {
            epoch,
            proposer_id,
            chunk_index,
            enc_payload_share,
        } => ctx
            .engine
            .handle_enc_share(epoch, proposer_id, chunk_index, enc_payload_share),
        PeerMessage::CoinShare {
            epoch,
            round,
            sender: share_sender,
            share,
        } => ctx
            .engine
            .handle_coin_share(epoch, round, share_sender, share, &ctx.validators)
            .map(|_| ()),
        PeerMessage::Commit {
            epoch,
            block_digest,
            quorum_cert,
        } => {
            let blocks = ctx
                .engine
                .handle_commit(epoch, block_digest, quorum_cert, &ctx.validators)?;
            for block in blocks {
                info!(
                    target: "node",
                    epoch = block.epoch,
                    digest = %hex::encode(&block.block_digest[..4]),
                    "block committed"
                );
            }
            Ok(())
        }
        PeerMessage::DayProofAnnounce(proof) => ctx.day.record_proof(proof, &ctx.validators),
        PeerMessage::CanonicalProof(proof) => handle_canonical_proof(ctx, proof),
        PeerMessage::VdfCompletionTime {
            day,
            validator,
            millis,
        } => {
            ctx.day.record_completion_time(day, validator, millis);
            Ok(())
        }
        PeerMessage::MembershipChange {
            epoch: _,
            update,
            quorum_cert,
        } => ctx.membership.submit(update, &quorum_cert, &ctx.validators),
        PeerMessage::BlacklistVote {
            epoch,
            voter_id,
            target_id,
            reason,
            signature,
        } => {
            let evicted = ctx.blacklist.handle_vote(
                epoch,
                voter_id,
                target_id,
                &reason,
                &signature,
                &mut ctx.validators,
            )?;
            if let Some(evicted) = evicted {
                ctx.engine.purge_validator(&evicted);
                ctx.engine.refresh_validators(&ctx.validators)?;
                ctx.store.save_validator_set(&ctx.validators)?;
            }
            Ok(())
        }
    }
}

/// Accepts a quorum-certified canonical proof from a peer: used both for
/// live consensus and for historical sync.
fn handle_canonical_proof(ctx: &mut NodeContext, proof: DayProof) -> Result<(), ConsensusError> {
    let Some(qc) = proof.quorum_cert.as_ref() else {
        return Err(ConsensusError::InvalidQuorumCert(
            "canonical proof without certificate".to_string(),
        ));
    };
    if qc.payload_hash != proof.proof || qc.epoch_or_day != proof.day_number as u64 {
        return Err(ConsensusError::InvalidQuorumCert(
            "certificate does not bind this proof".to_string(),
        ));
    }
    verify_quorum_cert(qc, &ctx.validators, ctx.validators.quorum_threshold())
        .map_err(|e| ConsensusError::InvalidQuorumCert(e.to_string()))?;

    // Keep the first certified proof for a day; later ones are duplicates by
    // the canonical-agreement property.
    let already_canonical = ctx
        .store
        .get_proof(proof.day_number)?
        .map(|p| p.is_canonical())
        .unwrap_or(false);
    if !already_canonical {
        ctx.store.save_proof(&proof)?;
        debug!(target: "node", day = proof.day_number, "canonical proof stored from peer");
    }
    Ok(())
}
