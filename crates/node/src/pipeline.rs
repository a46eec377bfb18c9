// Path: crates/node/src/pipeline.rs
//! The daily VDF computation and consensus pipeline.
//!
//! One iteration per day number: compute the proof off the cooperative
//! scheduler, sign and persist it, advertise it with the wall-clock
//! completion time, collect peer proofs inside the configured window, run
//! canonical selection, and advance the day only when the local proof
//! matches the canonical one. A day is never skipped; consensus failures
//! back off and retry the same day.

use crate::node::NodeContext;
use crate::retry::BackoffPolicy;
use conductor_crypto::vdf::CancelFlag;
use conductor_network::PeerExchange;
use conductor_types::app::{DayProof, PeerMessage, SECONDS_PER_DAY};
use conductor_types::error::{ConsensusError, VdfError};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

/// Runs the pipeline until shutdown or a fatal storage failure.
pub async fn run_daily_pipeline(
    context: Arc<Mutex<NodeContext>>,
    net: Arc<dyn PeerExchange>,
    cancel: CancelFlag,
) {
    let backoff = BackoffPolicy::default();
    let mut failures = 0u32;

    info!(target: "vdf", "daily pipeline running");
    while !cancel.is_cancelled() {
        let day = { context.lock().await.current_day };

        match run_one_day(&context, net.as_ref(), &cancel, day).await {
            Ok(DayOutcome::Advanced) => {
                failures = 0;
            }
            Ok(DayOutcome::Retry) => {
                let delay = backoff.delay(failures.min(6));
                failures = failures.saturating_add(1);
                tokio::time::sleep(delay).await;
            }
            Ok(DayOutcome::Shutdown) => break,
            Err(error) => match &error {
                ConsensusError::Storage(e) => {
                    error!(target: "vdf", error = %e, "storage failure, halting pipeline");
                    cancel.cancel();
                    break;
                }
                _ => {
                    warn!(target: "vdf", %error, day, "day iteration failed, backing off");
                    let delay = backoff.delay(failures.min(6));
                    failures = failures.saturating_add(1);
                    tokio::time::sleep(delay).await;
                }
            },
        }
    }
    info!(target: "vdf", "daily pipeline stopped");
}

enum DayOutcome {
    Advanced,
    Retry,
    Shutdown,
}

async fn run_one_day(
    context: &Arc<Mutex<NodeContext>>,
    net: &dyn PeerExchange,
    cancel: &CancelFlag,
    day: u32,
) -> Result<DayOutcome, ConsensusError> {
    info!(target: "vdf", day, "computing day proof");

    // Clone what the blocking computation needs so the lock is not held
    // while it grinds.
    let (vdf, keypair, timeout_seconds) = {
        let ctx = context.lock().await;
        (
            ctx.vdf.clone(),
            ctx.keypair.clone(),
            ctx.config.consensus.timeout_seconds,
        )
    };

    let started = Instant::now();
    let compute_cancel = cancel.clone();
    let computed =
        tokio::task::spawn_blocking(move || vdf.compute_day_proof(day, compute_cancel.as_atomic()))
            .await;
    let proof_bytes = match computed {
        Ok(Ok(bytes)) => bytes,
        Ok(Err(VdfError::Cancelled { at })) => {
            info!(target: "vdf", day, at, "computation cancelled at checkpoint");
            return Ok(DayOutcome::Shutdown);
        }
        Ok(Err(e)) => {
            warn!(target: "vdf", day, error = %e, "computation failed");
            return Ok(DayOutcome::Retry);
        }
        Err(join_error) => {
            warn!(target: "vdf", day, error = %join_error, "worker pool failure");
            return Ok(DayOutcome::Retry);
        }
    };
    let elapsed = started.elapsed();
    let millis = (elapsed.as_millis() as u64).max(1);

    // Sign, persist, advertise.
    let local_proof = {
        let mut ctx = context.lock().await;
        let ctx = &mut *ctx;
        let proof = DayProof {
            day_number: day,
            proof: proof_bytes,
            validator_id: ctx.keypair.validator_id(),
            signature: keypair.sign(&proof_bytes),
            quorum_cert: None,
        };
        ctx.store.save_proof(&proof)?;
        ctx.day.record_proof(proof.clone(), &ctx.validators)?;
        ctx.day
            .record_completion_time(day, proof.validator_id, millis);
        ctx.metrics
            .vdf
            .observe_computation_seconds(elapsed.as_secs_f64());
        proof
    };
    net.broadcast(PeerMessage::DayProofAnnounce(local_proof.clone()))
        .await?;
    net.broadcast(PeerMessage::VdfCompletionTime {
        day,
        validator: local_proof.validator_id,
        millis,
    })
    .await?;

    // Collect peer proofs within the window; selection may succeed early.
    let round_started = Instant::now();
    let deadline = round_started + Duration::from_secs(timeout_seconds);
    let canonical = loop {
        if cancel.is_cancelled() {
            return Ok(DayOutcome::Shutdown);
        }
        {
            let ctx = context.lock().await;
            match ctx.day.select_canonical(day, &ctx.validators) {
                Ok(canonical) => break Some(canonical),
                Err(ConsensusError::NoQuorum { .. }) => {}
                Err(e) => return Err(e),
            }
        }
        if Instant::now() >= deadline {
            break None;
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    };

    let Some(canonical) = canonical else {
        let mut ctx = context.lock().await;
        ctx.metrics.consensus.inc_round("timeout");
        ctx.metrics
            .consensus
            .observe_round_seconds(round_started.elapsed().as_secs_f64());
        warn!(target: "consensus", day, timeout_seconds, "no canonical proof within the window");
        return Err(ConsensusError::Timeout {
            what: format!("day {} proof consensus", day),
            seconds: timeout_seconds,
        });
    };

    // Advertise the certificate so laggards and future joiners can sync.
    net.broadcast(PeerMessage::CanonicalProof(canonical.clone()))
        .await?;

    let mut ctx = context.lock().await;
    ctx.metrics
        .consensus
        .observe_round_seconds(round_started.elapsed().as_secs_f64());

    // The canonical proof is network truth either way; keep it durable.
    ctx.store.save_proof(&canonical)?;

    if canonical.proof != local_proof.proof {
        ctx.metrics.consensus.inc_round("failure");
        warn!(
            target: "consensus",
            day,
            "local proof differs from canonical, repeating the day"
        );
        return Ok(DayOutcome::Retry);
    }

    // Advance: day d is sealed, never to be revisited.
    let next_day = day + 1;
    ctx.store.set_current_day(day)?;
    ctx.current_day = next_day;
    ctx.metrics.vdf.set_current_day(next_day);
    ctx.metrics.consensus.inc_round("success");
    info!(target: "consensus", day, "day sealed with quorum certificate");

    // Membership changes take effect at the start of the new day.
    let ctx = &mut *ctx;
    let applied = ctx
        .membership
        .activate_for_day(next_day, &mut ctx.validators);
    if !applied.is_empty() {
        ctx.engine.refresh_validators(&ctx.validators)?;
        ctx.store.save_validator_set(&ctx.validators)?;
    }

    // Periodic difficulty adjustment from the previous day's observations.
    let interval = ctx.config.vdf.adjustment_interval_days;
    if interval > 0 && next_day % interval == 0 {
        match ctx.day.median_completion_millis(day) {
            Some(median) => {
                let target = SECONDS_PER_DAY * 1000;
                let adjusted =
                    conductor_crypto::vdf::Vdf::adjusted_iterations(ctx.vdf.iterations(), median, target);
                info!(
                    target: "vdf",
                    day = next_day,
                    median_millis = median,
                    from = ctx.vdf.iterations(),
                    to = adjusted,
                    "difficulty adjusted"
                );
                ctx.vdf.set_iterations(adjusted);
                ctx.metrics.vdf.set_difficulty(adjusted);
            }
            None => {
                warn!(target: "vdf", day = next_day, "no completion times, skipping adjustment");
            }
        }
    }

    ctx.day.gc_before(next_day);
    Ok(DayOutcome::Advanced)
}
