// Path: crates/consensus/src/epoch.rs
//! The per-epoch consensus engine.
//!
//! One committed block per epoch. The local validator packs pending event
//! hashes into a batch, reliable-broadcasts it, Shamir-shares the payload
//! hash as the threshold-encryption stand-in, and contributes a coin share
//! for `(epoch, 0)`. Commits are accepted only with a verified quorum
//! certificate, and the locally reconstructed block digest must match the
//! certified one — a mismatch is fatal for the epoch and the engine refuses
//! to advance.
//!
//! Messages for epochs beyond the current one are buffered, never discarded;
//! all in-flight state is keyed by epoch and garbage-collected after the
//! epoch commits.

use crate::coin::CommonCoin;
use crate::rbc::ReliableBroadcast;
use conductor_crypto::hash::blake3_concat;
use conductor_crypto::sign::Keypair;
use conductor_crypto::threshold::{verify_quorum_cert, ThresholdCrypto};
use conductor_network::PeerExchange;
use conductor_storage::ProofStore;
use conductor_telemetry::sinks::ConsensusMetrics;
use conductor_types::app::{
    Block, Event, EventBatch, PeerMessage, QuorumCertificate, SignatureShare, ValidatorId,
    ValidatorSet,
};
use conductor_types::error::ConsensusError;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Where a submitted batch stands, as reported to the ingress surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStatus {
    /// In flight: proposed but not yet in a committed block.
    Pending,
    /// Included in a committed block.
    Committed,
    /// Its reliable broadcast never completed before the epoch closed.
    Rejected,
}

#[derive(Debug)]
struct ProposalState {
    payload_hash: [u8; 32],
    enc_shares: BTreeMap<u32, [u8; 32]>,
    payload_verified: bool,
}

#[derive(Debug, Default)]
struct EpochState {
    proposals: BTreeMap<ValidatorId, ProposalState>,
    buffered_commit: Option<([u8; 32], QuorumCertificate)>,
}

/// The epoch consensus engine. Owned and driven by the node's single
/// dispatch loop; not internally synchronized.
pub struct EpochEngine {
    keypair: Keypair,
    local: ValidatorId,
    current_epoch: u64,
    n: usize,
    f: usize,
    rbc: ReliableBroadcast,
    coin: CommonCoin,
    crypto: ThresholdCrypto,
    epochs: HashMap<u64, EpochState>,
    statuses: HashMap<[u8; 32], BatchStatus>,
    coin_share_sent: HashSet<u64>,
    store: ProofStore,
    metrics: Arc<dyn ConsensusMetrics>,
}

impl EpochEngine {
    /// Builds an engine sized to the current validator set.
    pub fn new(
        keypair: Keypair,
        set: &ValidatorSet,
        store: ProofStore,
        metrics: Arc<dyn ConsensusMetrics>,
    ) -> Result<Self, ConsensusError> {
        let local = keypair.validator_id();
        let n = set.len();
        let f = set.max_faulty();
        let t = set.quorum_threshold();
        Ok(Self {
            keypair,
            local,
            current_epoch: 0,
            n,
            f,
            rbc: ReliableBroadcast::new(n, f, local)?,
            coin: CommonCoin::new(n, t)?,
            crypto: ThresholdCrypto::new(n, t)?,
            epochs: HashMap::new(),
            statuses: HashMap::new(),
            coin_share_sent: HashSet::new(),
            store,
            metrics,
        })
    }

    /// The epoch currently being decided.
    pub fn current_epoch(&self) -> u64 {
        self.current_epoch
    }

    /// Reported status for a batch, if it has been seen.
    pub fn batch_status(&self, batch_id: &[u8; 32]) -> Option<BatchStatus> {
        self.statuses.get(batch_id).copied()
    }

    /// Resizes the broadcast and threshold machinery after a validator-set
    /// change. In-flight reliable-broadcast state for the current epoch is
    /// dropped; the epoch retries from proposal.
    pub fn refresh_validators(&mut self, set: &ValidatorSet) -> Result<(), ConsensusError> {
        self.n = set.len();
        self.f = set.max_faulty();
        let t = set.quorum_threshold();
        self.rbc = ReliableBroadcast::new(self.n, self.f, self.local)?;
        self.coin = CommonCoin::new(self.n, t)?;
        self.crypto = ThresholdCrypto::new(self.n, t)?;
        Ok(())
    }

    /// Discards a blacklisted validator's pending consensus state.
    pub fn purge_validator(&mut self, validator: &ValidatorId) {
        for state in self.epochs.values_mut() {
            if let Some(proposal) = state.proposals.remove(validator) {
                self.statuses
                    .insert(proposal.payload_hash, BatchStatus::Rejected);
            }
        }
    }

    /// Proposes a batch of events for the current epoch: reliable-broadcasts
    /// the batch, fans out the threshold shares of its payload hash, and
    /// contributes the local coin share. Returns the batch identifier.
    pub async fn propose_batch(
        &mut self,
        events: Vec<Event>,
        set: &ValidatorSet,
        net: &dyn PeerExchange,
    ) -> Result<[u8; 32], ConsensusError> {
        if !set.is_active(&self.local) {
            return Err(ConsensusError::UnknownProposer(self.local));
        }
        let epoch = self.current_epoch;
        let batch = EventBatch {
            proposer: self.local,
            events,
        };
        let bytes = batch.canonical_bytes();
        let payload_hash = self.rbc.propose(epoch, &bytes, net).await?;
        self.metrics.inc_rbc_message("rbc_propose");

        self.record_proposal(epoch, self.local, payload_hash);
        self.statuses.insert(payload_hash, BatchStatus::Pending);

        // Threshold-encryption stand-in: Shamir-share the payload hash; any
        // 2f+1 matching shares reconstruct and cross-check it.
        let shares = self.crypto.generate_shares(&payload_hash);
        for (index, value) in &shares {
            let message = PeerMessage::EncShare {
                epoch,
                proposer_id: self.local,
                chunk_index: *index,
                enc_payload_share: value.to_vec(),
            };
            self.handle_enc_share(epoch, self.local, *index, value.to_vec())?;
            net.broadcast(message).await?;
        }

        self.broadcast_coin_share(epoch, set, net).await?;
        info!(
            target: "consensus",
            epoch,
            batch = %hex::encode(&payload_hash[..4]),
            "batch proposed"
        );
        Ok(payload_hash)
    }

    /// Handles an incoming propose: routes it through reliable broadcast and
    /// records the proposal for commit selection. The first propose of an
    /// epoch also triggers the local coin share.
    #[allow(clippy::too_many_arguments)]
    pub async fn handle_propose(
        &mut self,
        epoch: u64,
        proposer: ValidatorId,
        payload_hash: [u8; 32],
        merkle_root: [u8; 32],
        data_len: u32,
        k: u32,
        n: u32,
        fragments: Vec<conductor_types::app::Fragment>,
        set: &ValidatorSet,
        net: &dyn PeerExchange,
    ) -> Result<(), ConsensusError> {
        if epoch < self.current_epoch {
            return Ok(()); // Stale epoch: the block already committed.
        }
        if !set.is_active(&proposer) {
            debug!(target: "consensus", epoch, from = %proposer, "propose from outside the active set dropped");
            return Ok(());
        }
        self.metrics.inc_rbc_message("rbc_propose");
        self.rbc
            .handle_propose(
                epoch,
                proposer,
                payload_hash,
                merkle_root,
                data_len,
                k,
                n,
                fragments,
                net,
            )
            .await?;
        self.record_proposal(epoch, proposer, payload_hash);
        self.statuses
            .entry(payload_hash)
            .or_insert(BatchStatus::Pending);
        // Shares may have raced ahead of the propose.
        self.try_verify_payload(epoch, proposer)?;
        self.broadcast_coin_share(epoch, set, net).await?;
        Ok(())
    }

    /// Handles a re-requested fragment.
    pub async fn handle_fragment(
        &mut self,
        fragment: conductor_types::app::Fragment,
        net: &dyn PeerExchange,
    ) -> Result<(), ConsensusError> {
        self.metrics.inc_rbc_message("rbc_fragment");
        self.rbc.handle_fragment(fragment, net).await?;
        Ok(())
    }

    /// Handles a ready announcement.
    pub async fn handle_ready(
        &mut self,
        batch_id: [u8; 32],
        merkle_root: [u8; 32],
        sender: ValidatorId,
        net: &dyn PeerExchange,
    ) -> Result<(), ConsensusError> {
        self.metrics.inc_rbc_message("ready");
        self.rbc
            .handle_ready(batch_id, merkle_root, sender, net)
            .await?;
        Ok(())
    }

    /// Answers a fragment re-request.
    pub async fn handle_fragment_request(
        &mut self,
        batch_id: [u8; 32],
        index: u32,
        requester: ValidatorId,
        net: &dyn PeerExchange,
    ) -> Result<(), ConsensusError> {
        self.rbc
            .handle_fragment_request(batch_id, index, requester, net)
            .await
    }

    /// Re-requests missing fragments for every undelivered proposal of the
    /// current epoch. Called from the node's idle tick so stalled broadcasts
    /// recover without waiting for the epoch to time out.
    pub async fn rerequest_missing_fragments(
        &mut self,
        net: &dyn PeerExchange,
    ) -> Result<(), ConsensusError> {
        let Some(state) = self.epochs.get(&self.current_epoch) else {
            return Ok(());
        };
        let stalled: Vec<[u8; 32]> = state
            .proposals
            .values()
            .filter(|p| p.payload_hash != [0; 32] && !self.rbc.is_delivered(&p.payload_hash))
            .map(|p| p.payload_hash)
            .collect();
        for batch_id in stalled {
            self.rbc.request_missing(batch_id, net).await?;
        }
        Ok(())
    }

    /// Handles a threshold share of a proposer's payload hash. On the
    /// `2f+1`-th share the payload hash is reconstructed and cross-checked
    /// against the propose; a mismatch drops the proposal.
    pub fn handle_enc_share(
        &mut self,
        epoch: u64,
        proposer: ValidatorId,
        chunk_index: u32,
        enc_payload_share: Vec<u8>,
    ) -> Result<(), ConsensusError> {
        if epoch < self.current_epoch {
            return Ok(());
        }
        let Ok(value) = <[u8; 32]>::try_from(enc_payload_share.as_slice()) else {
            debug!(target: "consensus", epoch, "malformed enc share dropped");
            return Ok(());
        };
        let state = self.epochs.entry(epoch).or_default();
        let Some(proposal) = state.proposals.get_mut(&proposer) else {
            // Share before propose: park it under a placeholder entry keyed
            // by the proposer so it is not lost to reordering.
            let placeholder = ProposalState {
                payload_hash: [0; 32],
                enc_shares: BTreeMap::from([(chunk_index, value)]),
                payload_verified: false,
            };
            state.proposals.insert(proposer, placeholder);
            return Ok(());
        };
        proposal.enc_shares.insert(chunk_index, value);
        self.try_verify_payload(epoch, proposer)
    }

    /// Reconstructs a proposer's payload hash once `2f+1` shares are in and
    /// cross-checks it against the propose. A mismatch drops the proposal.
    fn try_verify_payload(
        &mut self,
        epoch: u64,
        proposer: ValidatorId,
    ) -> Result<(), ConsensusError> {
        let threshold = self.crypto.threshold();
        let Some(state) = self.epochs.get_mut(&epoch) else {
            return Ok(());
        };
        let Some(proposal) = state.proposals.get_mut(&proposer) else {
            return Ok(());
        };
        if proposal.payload_verified
            || proposal.payload_hash == [0; 32]
            || proposal.enc_shares.len() < threshold
        {
            return Ok(());
        }
        let shares: Vec<(u32, [u8; 32])> = proposal
            .enc_shares
            .iter()
            .map(|(&i, &v)| (i, v))
            .collect();
        let reconstructed = self.crypto.reconstruct(&shares[..threshold])?;
        if reconstructed == proposal.payload_hash {
            proposal.payload_verified = true;
            debug!(target: "consensus", epoch, from = %proposer, "payload hash reconstructed and verified");
        } else {
            warn!(
                target: "consensus",
                epoch,
                from = %proposer,
                "reconstructed payload hash disagrees with propose, dropping proposal"
            );
            let dropped = state.proposals.remove(&proposer);
            if let Some(dropped) = dropped {
                self.statuses
                    .insert(dropped.payload_hash, BatchStatus::Rejected);
            }
        }
        Ok(())
    }

    /// Handles a peer's coin share for `(epoch, round)`.
    pub fn handle_coin_share(
        &mut self,
        epoch: u64,
        round: u32,
        sender: ValidatorId,
        share: SignatureShare,
        set: &ValidatorSet,
    ) -> Result<Option<u8>, ConsensusError> {
        self.coin.add_share(epoch, round, sender, share, set)
    }

    /// Handles a commit message. Returns every block committed by this call:
    /// the target epoch's block, plus any buffered successors it unblocked.
    pub fn handle_commit(
        &mut self,
        epoch: u64,
        block_digest: [u8; 32],
        quorum_cert: QuorumCertificate,
        set: &ValidatorSet,
    ) -> Result<Vec<Block>, ConsensusError> {
        if epoch < self.current_epoch {
            debug!(target: "consensus", epoch, "stale commit ignored");
            return Ok(Vec::new());
        }
        if epoch > self.current_epoch {
            // Out-of-order arrival: buffer, never discard.
            debug!(target: "consensus", epoch, current = self.current_epoch, "future commit buffered");
            self.epochs.entry(epoch).or_default().buffered_commit =
                Some((block_digest, quorum_cert));
            return Ok(Vec::new());
        }

        let mut committed = Vec::new();
        let mut pending = Some((block_digest, quorum_cert));
        while let Some((digest, qc)) = pending.take() {
            let block = self.commit_current_epoch(digest, qc, set)?;
            committed.push(block);
            pending = self
                .epochs
                .get_mut(&self.current_epoch)
                .and_then(|state| state.buffered_commit.take());
        }
        Ok(committed)
    }

    /// The digest and ordered payload hashes the engine would commit for
    /// `epoch` right now. Used to build the commit certificate.
    pub fn expected_commit(&self, epoch: u64) -> Result<([u8; 32], Vec<[u8; 32]>), ConsensusError> {
        let ordered = self.ordered_proposals(epoch)?;
        let hashes: Vec<[u8; 32]> = ordered.iter().map(|(_, h)| *h).collect();
        let digest = blake3_concat(hashes.iter().map(|h| h.as_slice()));
        Ok((digest, hashes))
    }

    fn commit_current_epoch(
        &mut self,
        block_digest: [u8; 32],
        quorum_cert: QuorumCertificate,
        set: &ValidatorSet,
    ) -> Result<Block, ConsensusError> {
        let epoch = self.current_epoch;

        // The certificate is verified before anything else (a commit without
        // a valid supermajority is Byzantine noise).
        if quorum_cert.payload_hash != block_digest {
            self.metrics.inc_round("failure");
            return Err(ConsensusError::InvalidQuorumCert(
                "certificate does not cover the commit digest".to_string(),
            ));
        }
        verify_quorum_cert(&quorum_cert, set, set.quorum_threshold())
            .map_err(|e| {
                self.metrics.inc_round("failure");
                ConsensusError::InvalidQuorumCert(e.to_string())
            })?;

        let ordered = self.ordered_proposals(epoch)?;
        let hashes: Vec<[u8; 32]> = ordered.iter().map(|(_, h)| *h).collect();
        let digest = blake3_concat(hashes.iter().map(|h| h.as_slice()));
        if digest != block_digest {
            // Fatal for this epoch: refuse to advance, surface the error.
            self.metrics.inc_round("failure");
            return Err(ConsensusError::CommitDigestMismatch { epoch });
        }

        let coin_value = self.coin.value(epoch, 0);
        let block = Block {
            epoch,
            block_digest: digest,
            ordered_proposals: hashes.clone(),
            coin_value,
            quorum_cert,
        };
        self.store.save_block(&block)?;

        // Settle statuses and garbage-collect the epoch's in-flight state.
        if let Some(state) = self.epochs.remove(&epoch) {
            for proposal in state.proposals.values() {
                let status = if hashes.contains(&proposal.payload_hash) {
                    BatchStatus::Committed
                } else {
                    BatchStatus::Rejected
                };
                self.statuses.insert(proposal.payload_hash, status);
            }
        }
        self.rbc.gc(&hashes);
        self.coin.gc_through(epoch);
        self.coin_share_sent.remove(&epoch);
        self.current_epoch = epoch + 1;
        self.metrics.inc_round("success");
        info!(
            target: "consensus",
            epoch,
            proposals = hashes.len(),
            digest = %hex::encode(&digest[..4]),
            "epoch committed"
        );
        Ok(block)
    }

    /// Selects proposers whose reliable broadcast completed and orders them
    /// deterministically: by `H(coin_value ∥ proposer_id)` when the coin is
    /// available, else lexicographically — the fallback is only legitimate
    /// when the coin protocol failed, so it is logged.
    fn ordered_proposals(
        &self,
        epoch: u64,
    ) -> Result<Vec<(ValidatorId, [u8; 32])>, ConsensusError> {
        let empty = EpochState::default();
        let state = self.epochs.get(&epoch).unwrap_or(&empty);
        let mut complete: Vec<(ValidatorId, [u8; 32])> = state
            .proposals
            .iter()
            .filter(|(_, p)| p.payload_hash != [0; 32] && self.rbc.is_delivered(&p.payload_hash))
            .map(|(id, p)| (*id, p.payload_hash))
            .collect();

        match self.coin.value(epoch, 0) {
            Some(coin) => {
                complete.sort_by_key(|(id, _)| blake3_concat([[coin].as_slice(), &id.0]));
            }
            None => {
                warn!(
                    target: "consensus",
                    epoch,
                    "coin unavailable at commit, falling back to lexicographic order"
                );
                complete.sort_by_key(|(id, hash)| (*id, *hash));
            }
        }
        Ok(complete)
    }

    fn record_proposal(&mut self, epoch: u64, proposer: ValidatorId, payload_hash: [u8; 32]) {
        let state = self.epochs.entry(epoch).or_default();
        match state.proposals.get_mut(&proposer) {
            // Enc shares may have arrived first; fill in the real hash.
            Some(existing) if existing.payload_hash == [0; 32] => {
                existing.payload_hash = payload_hash;
            }
            Some(_) => {}
            None => {
                state.proposals.insert(
                    proposer,
                    ProposalState {
                        payload_hash,
                        enc_shares: BTreeMap::new(),
                        payload_verified: false,
                    },
                );
            }
        }
    }

    async fn broadcast_coin_share(
        &mut self,
        epoch: u64,
        set: &ValidatorSet,
        net: &dyn PeerExchange,
    ) -> Result<(), ConsensusError> {
        if !self.coin_share_sent.insert(epoch) {
            return Ok(());
        }
        let share = CommonCoin::make_share(&self.keypair, set, epoch, 0)?;
        self.coin.add_share(epoch, 0, self.local, share, set)?;
        net.broadcast(PeerMessage::CoinShare {
            epoch,
            round: 0,
            sender: self.local,
            share,
        })
        .await?;
        self.metrics.inc_rbc_message("coin_share");
        Ok(())
    }
}
