// Path: crates/network/src/queue.rs
//! The bounded per-node inbound queue.

use conductor_telemetry::sinks::NetworkMetrics;
use conductor_types::app::{PeerMessage, ValidatorId};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use tracing::warn;

/// A bounded inbound queue with criticality-aware shedding.
///
/// When the bound is exceeded, the oldest **non-critical** message is dropped
/// (fragment re-requests and similar chatter). Critical messages — commits,
/// canonical proofs, membership changes — are never shed; if every queued
/// message is critical the queue grows past its bound rather than lose one.
pub struct InboundQueue {
    bound: usize,
    inner: Mutex<QueueState>,
    notify: Notify,
    metrics: Arc<dyn NetworkMetrics>,
}

struct QueueState {
    messages: VecDeque<(ValidatorId, PeerMessage)>,
    closed: bool,
}

impl InboundQueue {
    /// Creates a queue holding at most `bound` messages (before the
    /// critical-overflow exception).
    pub fn new(bound: usize, metrics: Arc<dyn NetworkMetrics>) -> Arc<Self> {
        Arc::new(Self {
            bound: bound.max(1),
            inner: Mutex::new(QueueState {
                messages: VecDeque::new(),
                closed: false,
            }),
            notify: Notify::new(),
            metrics,
        })
    }

    /// Enqueues a message, shedding the oldest non-critical one on overflow.
    pub fn push(&self, sender: ValidatorId, message: PeerMessage) {
        let mut state = match self.inner.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        if state.closed {
            return;
        }
        if state.messages.len() >= self.bound {
            let victim = state
                .messages
                .iter()
                .position(|(_, m)| !m.is_critical());
            match victim {
                Some(index) => {
                    if let Some((from, dropped)) = state.messages.remove(index) {
                        warn!(
                            target: "network",
                            kind = dropped.kind(),
                            %from,
                            "inbound queue full, shedding oldest non-critical message"
                        );
                        self.metrics.inc_dropped();
                    }
                }
                // Everything queued is critical: grow rather than lose one.
                None => {}
            }
        }
        self.metrics.inc_message(message.kind());
        state.messages.push_back((sender, message));
        drop(state);
        self.notify.notify_one();
    }

    /// Dequeues the next message, waiting until one arrives or the queue is
    /// closed and drained.
    pub async fn pop(&self) -> Option<(ValidatorId, PeerMessage)> {
        loop {
            {
                let mut state = match self.inner.lock() {
                    Ok(state) => state,
                    Err(poisoned) => poisoned.into_inner(),
                };
                if let Some(entry) = state.messages.pop_front() {
                    return Some(entry);
                }
                if state.closed {
                    return None;
                }
            }
            self.notify.notified().await;
        }
    }

    /// Closes the queue; `pop` returns `None` once drained.
    pub fn close(&self) {
        let mut state = match self.inner.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        state.closed = true;
        drop(state);
        self.notify.notify_waiters();
    }

    /// The number of queued messages.
    pub fn len(&self) -> usize {
        match self.inner.lock() {
            Ok(state) => state.messages.len(),
            Err(poisoned) => poisoned.into_inner().messages.len(),
        }
    }

    /// True when nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conductor_telemetry::sinks::NoopMetrics;
    use conductor_types::app::QuorumCertificate;

    fn vid(b: u8) -> ValidatorId {
        ValidatorId([b; 32])
    }

    fn noncritical(i: u32) -> PeerMessage {
        PeerMessage::FragmentRequest {
            batch_id: [0; 32],
            index: i,
            requester: vid(1),
        }
    }

    fn critical(epoch: u64) -> PeerMessage {
        PeerMessage::Commit {
            epoch,
            block_digest: [0; 32],
            quorum_cert: QuorumCertificate {
                epoch_or_day: epoch,
                payload_hash: [0; 32],
                signatures: Default::default(),
                aggregated_signature: vec![],
            },
        }
    }

    #[tokio::test]
    async fn fifo_order_per_sender() {
        let queue = InboundQueue::new(8, Arc::new(NoopMetrics));
        for i in 0..3 {
            queue.push(vid(1), noncritical(i));
        }
        for i in 0..3 {
            let (_, msg) = queue.pop().await.unwrap();
            assert!(matches!(msg, PeerMessage::FragmentRequest { index, .. } if index == i));
        }
    }

    #[tokio::test]
    async fn overflow_sheds_oldest_noncritical_first() {
        let queue = InboundQueue::new(3, Arc::new(NoopMetrics));
        queue.push(vid(1), noncritical(0));
        queue.push(vid(1), critical(1));
        queue.push(vid(1), noncritical(2));
        // Overflow: noncritical(0) is the oldest sheddable message.
        queue.push(vid(1), noncritical(3));

        assert_eq!(queue.len(), 3);
        let (_, first) = queue.pop().await.unwrap();
        assert!(matches!(first, PeerMessage::Commit { .. }));
    }

    #[tokio::test]
    async fn critical_messages_are_never_shed() {
        let queue = InboundQueue::new(2, Arc::new(NoopMetrics));
        queue.push(vid(1), critical(1));
        queue.push(vid(1), critical(2));
        // All queued messages are critical: the queue grows instead.
        queue.push(vid(1), critical(3));
        assert_eq!(queue.len(), 3);
    }

    #[tokio::test]
    async fn close_drains_then_ends() {
        let queue = InboundQueue::new(4, Arc::new(NoopMetrics));
        queue.push(vid(1), noncritical(0));
        queue.close();
        assert!(queue.pop().await.is_some());
        assert!(queue.pop().await.is_none());
    }
}
