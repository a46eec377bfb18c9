// Path: crates/node/src/ingress.rs
//! The ingress service: the contract offered to clients.
//!
//! The transport wrapping (gRPC, REST) is out of scope; these methods are
//! the logical operations. Internal failures map onto the user-visible
//! taxonomy here — invalid input becomes a precondition failure, missing
//! objects become not-found, consensus failures become aborted, and
//! everything else is internal. Cryptographic failures never surface: they
//! were already handled by dropping the offending message.

use crate::node::NodeContext;
use crate::retry::{CircuitBreaker, RateLimiter};
use conductor_consensus::epoch::BatchStatus;
use conductor_network::PeerExchange;
use conductor_types::app::{Block, DayProof, Event};
use conductor_types::error::{ConsensusError, IngressError};
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::Mutex;
use tracing::info;

/// Client-visible batch status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsensusStatus {
    /// Proposed, not yet committed.
    Pending,
    /// Included in a committed block.
    Committed,
    /// Dropped without commitment.
    Rejected,
}

/// The response to a batch submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitReceipt {
    /// Identifier to poll `get_consensus_status` with.
    pub batch_id: [u8; 32],
    /// Always `Pending` on acceptance.
    pub status: ConsensusStatus,
}

/// The ingress surface over a running node.
pub struct IngressService {
    context: Arc<Mutex<NodeContext>>,
    net: Arc<dyn PeerExchange>,
    limiter: StdMutex<RateLimiter>,
    breaker: StdMutex<CircuitBreaker>,
}

impl IngressService {
    /// Wraps a node context. The limiter bounds batch submissions; reads
    /// are not limited. The breaker trips after repeated consensus failures
    /// so clients back off instead of hammering a wedged epoch.
    pub fn new(context: Arc<Mutex<NodeContext>>, net: Arc<dyn PeerExchange>) -> Self {
        Self {
            context,
            net,
            limiter: StdMutex::new(RateLimiter::new(10.0, 20)),
            breaker: StdMutex::new(CircuitBreaker::new(5, std::time::Duration::from_secs(60))),
        }
    }

    /// Submits a batch of events for the given epoch.
    ///
    /// Empty batches and wrong-epoch submissions are precondition failures.
    pub async fn submit_event_batch(
        &self,
        epoch: u64,
        events: Vec<Event>,
    ) -> Result<SubmitReceipt, IngressError> {
        if events.is_empty() {
            return Err(IngressError::Precondition(
                "event batch must not be empty".to_string(),
            ));
        }
        {
            let mut limiter = match self.limiter.lock() {
                Ok(limiter) => limiter,
                Err(poisoned) => poisoned.into_inner(),
            };
            if !limiter.acquire(1) {
                return Err(IngressError::RateLimit);
            }
        }
        {
            let mut breaker = match self.breaker.lock() {
                Ok(breaker) => breaker,
                Err(poisoned) => poisoned.into_inner(),
            };
            if !breaker.allow() {
                return Err(IngressError::Aborted(
                    "consensus circuit open, retry later".to_string(),
                ));
            }
        }

        let mut ctx = self.context.lock().await;
        let current = ctx.engine.current_epoch();
        if epoch != current {
            return Err(IngressError::Precondition(format!(
                "epoch {} is not the current epoch {}",
                epoch, current
            )));
        }
        let ctx = &mut *ctx;
        let proposed = ctx
            .engine
            .propose_batch(events, &ctx.validators, self.net.as_ref())
            .await;
        {
            let mut breaker = match self.breaker.lock() {
                Ok(breaker) => breaker,
                Err(poisoned) => poisoned.into_inner(),
            };
            match &proposed {
                Ok(_) => breaker.record_success(),
                Err(_) => breaker.record_failure(),
            }
        }
        let batch_id = proposed.map_err(map_consensus_error)?;
        info!(target: "node", epoch, batch = %hex::encode(&batch_id[..4]), "event batch accepted");
        Ok(SubmitReceipt {
            batch_id,
            status: ConsensusStatus::Pending,
        })
    }

    /// Fetches the stored day proof for `day`.
    pub async fn get_day_proof(&self, day: u32) -> Result<DayProof, IngressError> {
        let ctx = self.context.lock().await;
        ctx.store
            .get_proof(day)
            .map_err(|e| IngressError::Internal(e.to_string()))?
            .ok_or_else(|| IngressError::NotFound(format!("no proof for day {}", day)))
    }

    /// Fetches the committed block for `epoch`.
    pub async fn get_block(&self, epoch: u64) -> Result<Block, IngressError> {
        let ctx = self.context.lock().await;
        ctx.store
            .get_block(epoch)
            .map_err(|e| IngressError::Internal(e.to_string()))?
            .ok_or_else(|| IngressError::NotFound(format!("no block for epoch {}", epoch)))
    }

    /// Reports where a submitted batch stands.
    pub async fn get_consensus_status(
        &self,
        batch_id: [u8; 32],
    ) -> Result<ConsensusStatus, IngressError> {
        let ctx = self.context.lock().await;
        match ctx.engine.batch_status(&batch_id) {
            Some(BatchStatus::Pending) => Ok(ConsensusStatus::Pending),
            Some(BatchStatus::Committed) => Ok(ConsensusStatus::Committed),
            Some(BatchStatus::Rejected) => Ok(ConsensusStatus::Rejected),
            None => Err(IngressError::NotFound(format!(
                "unknown batch {}",
                hex::encode(batch_id)
            ))),
        }
    }
}

fn map_consensus_error(error: ConsensusError) -> IngressError {
    match error {
        ConsensusError::Timeout { .. }
        | ConsensusError::NoQuorum { .. }
        | ConsensusError::CommitDigestMismatch { .. }
        | ConsensusError::InsufficientValidators { .. } => {
            IngressError::Aborted(error.to_string())
        }
        ConsensusError::UnknownProposer(_) => IngressError::Precondition(error.to_string()),
        other => IngressError::Internal(other.to_string()),
    }
}
