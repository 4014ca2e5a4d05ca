use crate::peer::{Message, PeerError, PeerId};
use bytes::Bytes;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

/// The registry's grip on one live connection.
///
/// Holds the peer's send queue and close signal; the read and write tasks
/// themselves only see their channel ends, which keeps connection tasks
/// free of registry references.
#[derive(Clone)]
pub struct PeerHandle {
    id: PeerId,
    addr: SocketAddr,
    outbox: mpsc::Sender<Bytes>,
    close: Arc<watch::Sender<bool>>,
}

impl PeerHandle {
    pub fn new(
        id: PeerId,
        addr: SocketAddr,
        outbox: mpsc::Sender<Bytes>,
        close: watch::Sender<bool>,
    ) -> Self {
        Self {
            id,
            addr,
            outbox,
            close: Arc::new(close),
        }
    }

    pub fn id(&self) -> PeerId {
        self.id
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Enqueues a message without blocking.
    ///
    /// A full queue is the soft [`PeerError::OutboxFull`]; a gone writer
    /// task reports [`PeerError::ConnectionClosed`].
    pub fn send(&self, message: &Message) -> Result<(), PeerError> {
        match self.outbox.try_send(message.encode()) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => Err(PeerError::OutboxFull),
            Err(mpsc::error::TrySendError::Closed(_)) => Err(PeerError::ConnectionClosed),
        }
    }

    /// Signals the connection tasks to stop. Idempotent.
    pub fn close(&self) {
        let _ = self.close.send(true);
    }
}
