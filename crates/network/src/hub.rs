// Path: crates/network/src/hub.rs
//! An in-process mesh transport.
//!
//! Implements the peer-exchange contract over per-node bounded queues. Sends
//! from one task are delivered in order; across senders no ordering is
//! promised, which matches what the real transport provides.

use crate::queue::InboundQueue;
use crate::traits::{Inbound, PeerExchange};
use async_trait::async_trait;
use conductor_telemetry::sinks::{NetworkMetrics, NoopMetrics};
use conductor_types::app::{PeerMessage, ValidatorId};
use conductor_types::error::NetworkError;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

const DEFAULT_QUEUE_BOUND: usize = 1024;

/// A mesh of in-process nodes.
#[derive(Clone, Default)]
pub struct InProcessHub {
    nodes: Arc<RwLock<HashMap<ValidatorId, Arc<InboundQueue>>>>,
}

impl InProcessHub {
    /// Creates an empty mesh.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a node and returns its transport handle.
    pub fn register(&self, id: ValidatorId) -> HubHandle {
        self.register_with_metrics(id, Arc::new(NoopMetrics))
    }

    /// Registers a node with a metrics sink for its inbound queue.
    pub fn register_with_metrics(
        &self,
        id: ValidatorId,
        metrics: Arc<dyn NetworkMetrics>,
    ) -> HubHandle {
        let queue = InboundQueue::new(DEFAULT_QUEUE_BOUND, metrics);
        if let Ok(mut nodes) = self.nodes.write() {
            nodes.insert(id, queue.clone());
        }
        HubHandle {
            local: id,
            hub: self.clone(),
            inbound: Arc::new(Mutex::new(Some(queue))),
        }
    }

    /// Disconnects a node; its queue closes and peers stop delivering to it.
    pub fn disconnect(&self, id: &ValidatorId) {
        if let Ok(mut nodes) = self.nodes.write() {
            if let Some(queue) = nodes.remove(id) {
                queue.close();
            }
        }
    }

    fn deliver(&self, sender: ValidatorId, target: Option<&ValidatorId>, message: &PeerMessage) {
        let nodes = match self.nodes.read() {
            Ok(nodes) => nodes,
            Err(poisoned) => poisoned.into_inner(),
        };
        match target {
            Some(target) => {
                if let Some(queue) = nodes.get(target) {
                    queue.push(sender, message.clone());
                }
            }
            None => {
                for (id, queue) in nodes.iter() {
                    if *id != sender {
                        queue.push(sender, message.clone());
                    }
                }
            }
        }
    }

    fn node_count(&self) -> usize {
        match self.nodes.read() {
            Ok(nodes) => nodes.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }
}

/// One node's connection to the hub: the sending half plus (until taken) the
/// receiving half.
pub struct HubHandle {
    local: ValidatorId,
    hub: InProcessHub,
    inbound: Arc<Mutex<Option<Arc<InboundQueue>>>>,
}

impl HubHandle {
    /// Takes the receiving half. The dispatch loop owns it; a second call
    /// returns `None`.
    pub fn take_inbound(&self) -> Option<HubInbound> {
        let mut slot = match self.inbound.lock() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        };
        slot.take().map(|queue| HubInbound { queue })
    }
}

#[async_trait]
impl PeerExchange for HubHandle {
    async fn broadcast(&self, message: PeerMessage) -> Result<(), NetworkError> {
        self.hub.deliver(self.local, None, &message);
        Ok(())
    }

    async fn send_to(&self, peer: ValidatorId, message: PeerMessage) -> Result<(), NetworkError> {
        let known = match self.hub.nodes.read() {
            Ok(nodes) => nodes.contains_key(&peer),
            Err(poisoned) => poisoned.into_inner().contains_key(&peer),
        };
        if !known {
            return Err(NetworkError::PeerUnreachable(peer.to_string()));
        }
        self.hub.deliver(self.local, Some(&peer), &message);
        Ok(())
    }

    fn local_id(&self) -> ValidatorId {
        self.local
    }

    fn peer_count(&self) -> usize {
        self.hub.node_count().saturating_sub(1)
    }
}

/// The receiving half of a hub connection.
pub struct HubInbound {
    queue: Arc<InboundQueue>,
}

#[async_trait]
impl Inbound for HubInbound {
    async fn recv(&mut self) -> Option<(ValidatorId, PeerMessage)> {
        self.queue.pop().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vid(b: u8) -> ValidatorId {
        ValidatorId([b; 32])
    }

    fn ping(i: u32) -> PeerMessage {
        PeerMessage::FragmentRequest {
            batch_id: [0; 32],
            index: i,
            requester: vid(0),
        }
    }

    #[tokio::test]
    async fn broadcast_reaches_everyone_but_the_sender() {
        let hub = InProcessHub::new();
        let a = hub.register(vid(1));
        let b = hub.register(vid(2));
        let c = hub.register(vid(3));

        let mut b_in = b.take_inbound().unwrap();
        let mut c_in = c.take_inbound().unwrap();

        a.broadcast(ping(7)).await.unwrap();

        let (from, msg) = b_in.recv().await.unwrap();
        assert_eq!(from, vid(1));
        assert!(matches!(msg, PeerMessage::FragmentRequest { index: 7, .. }));
        assert!(c_in.recv().await.is_some());

        // The sender's own queue stays empty.
        let a_in = a.take_inbound().unwrap();
        assert!(a_in.queue.is_empty());
    }

    #[tokio::test]
    async fn direct_send_hits_one_peer() {
        let hub = InProcessHub::new();
        let a = hub.register(vid(1));
        let b = hub.register(vid(2));
        let c = hub.register(vid(3));

        let mut b_in = b.take_inbound().unwrap();
        let c_in = c.take_inbound().unwrap();

        a.send_to(vid(2), ping(1)).await.unwrap();
        assert!(b_in.recv().await.is_some());
        assert!(c_in.queue.is_empty());
    }

    #[tokio::test]
    async fn unknown_peer_is_unreachable() {
        let hub = InProcessHub::new();
        let a = hub.register(vid(1));
        assert!(matches!(
            a.send_to(vid(9), ping(0)).await,
            Err(NetworkError::PeerUnreachable(_))
        ));
    }

    #[tokio::test]
    async fn disconnect_closes_the_inbound() {
        let hub = InProcessHub::new();
        let a = hub.register(vid(1));
        let mut a_in = a.take_inbound().unwrap();
        hub.disconnect(&vid(1));
        assert!(a_in.recv().await.is_none());
    }

    #[tokio::test]
    async fn inbound_can_only_be_taken_once() {
        let hub = InProcessHub::new();
        let a = hub.register(vid(1));
        assert!(a.take_inbound().is_some());
        assert!(a.take_inbound().is_none());
    }
}
