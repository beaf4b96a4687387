//! Connection registry - outbound channels of the players in one room

use std::collections::HashMap;

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::debug;
use uuid::Uuid;

use super::snapshot::Payload;

/// Frames buffered per connection before new ones are dropped
pub const OUTBOUND_BUFFER: usize = 32;

/// Sending half of a connection's outbound queue
pub type OutboundTx = mpsc::Sender<Payload>;
/// Receiving half, drained by the connection's writer task
pub type OutboundRx = mpsc::Receiver<Payload>;

/// Create a bounded outbound queue for one connection
pub fn outbound_channel() -> (OutboundTx, OutboundRx) {
    mpsc::channel(OUTBOUND_BUFFER)
}

/// Result of a single non-blocking send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    /// Queue full, frame dropped for this connection only
    Dropped,
    /// Receiver gone
    Closed,
    Unknown,
}

/// Per-broadcast delivery summary
#[derive(Debug, Default)]
pub struct BroadcastReport {
    pub sent: usize,
    pub dropped: usize,
    /// Connections whose receiver has gone away
    pub closed: Vec<Uuid>,
}

/// Maps player identity to its outbound channel; holds no game state
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: HashMap<Uuid, OutboundTx>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, id: Uuid, tx: OutboundTx) {
        self.connections.insert(id, tx);
    }

    pub fn unregister(&mut self, id: &Uuid) -> bool {
        self.connections.remove(id).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Send to one connection without waiting
    pub fn send_to(&self, id: &Uuid, payload: Payload) -> Delivery {
        match self.connections.get(id) {
            Some(tx) => try_deliver(tx, payload),
            None => Delivery::Unknown,
        }
    }

    /// Fan the same payload out to every connection without waiting
    pub fn broadcast(&self, payload: &Payload) -> BroadcastReport {
        let mut report = BroadcastReport::default();
        for (id, tx) in &self.connections {
            match try_deliver(tx, payload.clone()) {
                Delivery::Sent => report.sent += 1,
                Delivery::Dropped => {
                    debug!(player_id = %id, "Outbound queue full, dropping frame");
                    report.dropped += 1;
                }
                Delivery::Closed => report.closed.push(*id),
                Delivery::Unknown => {}
            }
        }
        report
    }
}

fn try_deliver(tx: &OutboundTx, payload: Payload) -> Delivery {
    match tx.try_send(payload) {
        Ok(()) => Delivery::Sent,
        Err(TrySendError::Full(_)) => Delivery::Dropped,
        Err(TrySendError::Closed(_)) => Delivery::Closed,
    }
}
