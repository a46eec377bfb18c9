// Path: crates/network/src/traits.rs
//! Trait definitions for the peer-exchange contract.

use async_trait::async_trait;
use conductor_types::app::{PeerMessage, ValidatorId};
use conductor_types::error::NetworkError;

/// The sending side of the peer exchange.
///
/// Delivery is best-effort: messages may arrive out of order or duplicated,
/// and every consumer of this trait tolerates both.
#[async_trait]
pub trait PeerExchange: Send + Sync {
    /// Sends a message to every known peer.
    async fn broadcast(&self, message: PeerMessage) -> Result<(), NetworkError>;

    /// Sends a message to one peer.
    async fn send_to(&self, peer: ValidatorId, message: PeerMessage) -> Result<(), NetworkError>;

    /// The local validator's identity.
    fn local_id(&self) -> ValidatorId;

    /// The number of currently reachable peers.
    fn peer_count(&self) -> usize;
}

/// The receiving side of the peer exchange: a stream of `(sender, message)`
/// pairs in per-sender FIFO order.
#[async_trait]
pub trait Inbound: Send {
    /// Waits for the next inbound message. `None` means the transport has
    /// shut down.
    async fn recv(&mut self) -> Option<(ValidatorId, PeerMessage)>;
}
