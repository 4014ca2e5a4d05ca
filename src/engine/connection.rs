use super::error::EngineError;
use crate::constants::{BACKPRESSURE_STRIKE_LIMIT, HANDSHAKE_TIMEOUT, OUTBOX_DEPTH};
use crate::metainfo::ContentId;
use crate::peer::{
    read_handshake, send_handshake, FrameReader, FrameWriter, Handshake, Message, PeerError,
    PeerId,
};
use crate::storage::PieceStore;
use crate::swarm::{PeerHandle, SwarmRegistry};
use bytes::Bytes;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tokio::time::timeout;
use tracing::{debug, trace, warn};

/// Whether we dialed the remote or accepted it. Decides who sends the
/// handshake first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Direction {
    Outbound,
    Inbound,
}

/// A raw frame payload tagged with its origin, queued for dispatch.
#[derive(Debug)]
pub(crate) struct InboundMessage {
    pub peer_id: PeerId,
    pub addr: SocketAddr,
    pub payload: Bytes,
}

/// The slice of engine state a connection needs.
///
/// Read tasks hold this instead of a registry reference for sending, which
/// keeps the ownership cycle between registry and connections one-way.
#[derive(Clone)]
pub(crate) struct ConnectionCtx {
    pub content_id: ContentId,
    pub local_id: PeerId,
    pub registry: Arc<SwarmRegistry>,
    pub store: Arc<PieceStore>,
    pub inbound: mpsc::Sender<InboundMessage>,
}

/// Handshakes a fresh stream, registers the peer, and spawns its read and
/// write tasks.
///
/// Works over any duplex byte stream; TCP is what the engine feeds it, an
/// in-memory pair works the same way. On any validation failure the stream
/// is dropped and nothing is registered.
pub(crate) async fn spawn_peer<S>(
    mut stream: S,
    addr: SocketAddr,
    direction: Direction,
    ctx: ConnectionCtx,
) -> Result<PeerId, EngineError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let ours = Handshake::new(*ctx.content_id.as_bytes(), *ctx.local_id.as_bytes());
    let theirs = timeout(HANDSHAKE_TIMEOUT, exchange_handshake(&mut stream, &ours, direction))
        .await
        .map_err(|_| PeerError::HandshakeTimeout)??;

    if theirs.content_id != *ctx.content_id.as_bytes() {
        return Err(PeerError::ContentIdMismatch.into());
    }
    if theirs.peer_id == *ctx.local_id.as_bytes() {
        debug!(%addr, "dropping connection to self");
        return Err(PeerError::SelfConnection.into());
    }

    let peer_id = PeerId(theirs.peer_id);
    let (outbox_tx, outbox_rx) = mpsc::channel(OUTBOX_DEPTH);
    let (close_tx, close_rx) = watch::channel(false);
    let handle = PeerHandle::new(peer_id, addr, outbox_tx, close_tx);

    ctx.registry.register(handle.clone())?;

    // Open with our bitfield; the remote answers with interest or silence.
    if let Err(e) = handle.send(&Message::Bitfield(ctx.store.bitfield().to_bytes())) {
        warn!(peer = ?peer_id, error = %e, "failed to queue registration bitfield");
    }

    let (read_half, write_half) = tokio::io::split(stream);
    tokio::spawn(write_loop(write_half, outbox_rx, peer_id));
    tokio::spawn(read_loop(read_half, close_rx, peer_id, addr, ctx));

    Ok(peer_id)
}

async fn exchange_handshake<S>(
    stream: &mut S,
    ours: &Handshake,
    direction: Direction,
) -> Result<Handshake, PeerError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    match direction {
        Direction::Outbound => {
            send_handshake(stream, ours).await?;
            read_handshake(stream).await
        }
        Direction::Inbound => {
            let theirs = read_handshake(stream).await?;
            send_handshake(stream, ours).await?;
            Ok(theirs)
        }
    }
}

/// Reads frames until the stream dies or the registry closes the peer,
/// then removes the peer from the swarm.
///
/// A full inbound queue is a soft error like a full outbox: the frame is
/// dropped and logged, and only [`BACKPRESSURE_STRIKE_LIMIT`] consecutive
/// occurrences close the connection.
async fn read_loop<R>(
    read_half: R,
    mut close_rx: watch::Receiver<bool>,
    peer_id: PeerId,
    addr: SocketAddr,
    ctx: ConnectionCtx,
) where
    R: AsyncRead + Unpin + Send + 'static,
{
    let mut reader = FrameReader::new(read_half);
    let mut strikes = 0u32;

    loop {
        tokio::select! {
            _ = close_rx.changed() => break,
            frame = reader.read_frame() => match frame {
                Ok(payload) => {
                    trace!(peer = ?peer_id, bytes = payload.len(), "frame received");
                    let message = InboundMessage { peer_id, addr, payload };
                    match ctx.inbound.try_send(message) {
                        Ok(()) => strikes = 0,
                        Err(TrySendError::Full(_)) => {
                            strikes += 1;
                            warn!(peer = ?peer_id, strikes, "inbound queue full, frame dropped");
                            if strikes >= BACKPRESSURE_STRIKE_LIMIT {
                                warn!(peer = ?peer_id, "repeated backpressure, closing connection");
                                break;
                            }
                        }
                        // Dispatch task gone; the engine is shutting down.
                        Err(TrySendError::Closed(_)) => break,
                    }
                }
                Err(PeerError::ConnectionClosed) => {
                    debug!(peer = ?peer_id, "peer closed the connection");
                    break;
                }
                Err(e) => {
                    debug!(peer = ?peer_id, error = %e, "read failed");
                    break;
                }
            }
        }
    }

    ctx.registry.remove(&peer_id);
}

/// Drains the outbox onto the wire. Ends when the handle is dropped or the
/// stream fails, then shuts the write side down.
async fn write_loop<W>(write_half: W, mut outbox: mpsc::Receiver<Bytes>, peer_id: PeerId)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let mut writer = FrameWriter::new(write_half);

    while let Some(payload) = outbox.recv().await {
        if let Err(e) = writer.write_frame(&payload).await {
            debug!(peer = ?peer_id, error = %e, "write failed");
            break;
        }
    }

    let _ = writer.shutdown().await;
}
