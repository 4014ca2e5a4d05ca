use thiserror::Error;

/// Errors on a single peer connection.
///
/// Protocol violations (bad handshake, oversized frames, id mismatches) are
/// fatal to the connection but never to the engine.
#[derive(Debug, Error)]
pub enum PeerError {
    /// Stream I/O failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Handshake frame is the wrong shape.
    #[error("invalid handshake")]
    InvalidHandshake,

    /// Handshake carried an unexpected protocol string.
    #[error("unexpected protocol string")]
    BadProtocol,

    /// The remote is part of a different swarm.
    #[error("content id mismatch")]
    ContentIdMismatch,

    /// The remote handed back our own peer id.
    #[error("connected to self")]
    SelfConnection,

    /// Frame length prefix exceeds the protocol cap.
    #[error("frame length {0} exceeds maximum")]
    FrameTooLarge(u32),

    /// Message body shorter than its type requires.
    #[error("truncated message: {0}")]
    TruncatedMessage(&'static str),

    /// First payload byte is not a known message type.
    #[error("unknown message id: {0:#04x}")]
    UnknownMessageId(u8),

    /// The remote closed the stream.
    #[error("connection closed")]
    ConnectionClosed,

    /// The handshake did not complete in time.
    #[error("handshake timed out")]
    HandshakeTimeout,

    /// The per-peer send queue is full.
    #[error("outbox full")]
    OutboxFull,
}
