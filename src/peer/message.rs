use super::error::PeerError;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// The piXTorrent protocol identifier.
pub const PROTOCOL: &[u8] = b"piXTorrent protocol";
/// Length of the handshake frame in bytes.
pub const HANDSHAKE_LEN: usize = 68;

/// Message type identifiers.
///
/// Every message except the keep-alive starts its payload with one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageId {
    /// Would request pieces if unchoked.
    Interested = 0x01,
    /// No longer wants pieces.
    NotInterested = 0x02,
    /// Ask for a whole piece by index.
    Request = 0x03,
    /// Deliver piece data.
    Piece = 0x04,
    /// Announce a newly acquired piece.
    Have = 0x05,
    /// Announce all held pieces at once.
    Bitfield = 0x06,
    /// Willing to serve requests.
    Unchoke = 0x07,
    /// Refusing to serve requests.
    Choke = 0x08,
}

impl TryFrom<u8> for MessageId {
    type Error = PeerError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(MessageId::Interested),
            0x02 => Ok(MessageId::NotInterested),
            0x03 => Ok(MessageId::Request),
            0x04 => Ok(MessageId::Piece),
            0x05 => Ok(MessageId::Have),
            0x06 => Ok(MessageId::Bitfield),
            0x07 => Ok(MessageId::Unchoke),
            0x08 => Ok(MessageId::Choke),
            other => Err(PeerError::UnknownMessageId(other)),
        }
    }
}

/// The handshake frame exchanged at connection setup.
///
/// Layout: `pstrlen(1) || pstr(19) || reserved(8, zero) || content_id(20)
/// || peer_id(20)`, 68 bytes total. The dialing side sends first; the
/// accepting side reads first.
#[derive(Debug, Clone)]
pub struct Handshake {
    /// The swarm's content identifier.
    pub content_id: [u8; 20],
    /// The sender's peer id.
    pub peer_id: [u8; 20],
}

impl Handshake {
    pub fn new(content_id: [u8; 20], peer_id: [u8; 20]) -> Self {
        Self {
            content_id,
            peer_id,
        }
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(HANDSHAKE_LEN);
        buf.put_u8(PROTOCOL.len() as u8);
        buf.put_slice(PROTOCOL);
        buf.put_slice(&[0u8; 8]);
        buf.put_slice(&self.content_id);
        buf.put_slice(&self.peer_id);
        buf.freeze()
    }

    pub fn decode(data: &[u8]) -> Result<Self, PeerError> {
        if data.len() < HANDSHAKE_LEN {
            return Err(PeerError::InvalidHandshake);
        }
        if data[0] as usize != PROTOCOL.len() || &data[1..20] != PROTOCOL {
            return Err(PeerError::BadProtocol);
        }

        let mut content_id = [0u8; 20];
        content_id.copy_from_slice(&data[28..48]);
        let mut peer_id = [0u8; 20];
        peer_id.copy_from_slice(&data[48..68]);

        Ok(Self {
            content_id,
            peer_id,
        })
    }
}

/// A typed wire message.
///
/// [`encode`](Message::encode) produces the frame payload: the type byte
/// followed by the body. The length prefix belongs to the framing codec,
/// not the message. A keep-alive encodes to an empty payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Empty frame; no side effects.
    KeepAlive,
    Interested,
    NotInterested,
    /// Ask the remote for a whole piece.
    Request { piece: u32 },
    /// A whole piece: index plus raw bytes.
    Piece { piece: u32, data: Bytes },
    Have { piece: u32 },
    /// Packed bit vector, MSB-first per byte.
    Bitfield(Bytes),
    Unchoke,
    Choke,
}

impl Message {
    /// Encodes the message to its frame payload.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::new();

        match self {
            Message::KeepAlive => {}
            Message::Interested => buf.put_u8(MessageId::Interested as u8),
            Message::NotInterested => buf.put_u8(MessageId::NotInterested as u8),
            Message::Request { piece } => {
                buf.put_u8(MessageId::Request as u8);
                buf.put_u32(*piece);
            }
            Message::Piece { piece, data } => {
                buf.put_u8(MessageId::Piece as u8);
                buf.put_u32(*piece);
                buf.put_slice(data);
            }
            Message::Have { piece } => {
                buf.put_u8(MessageId::Have as u8);
                buf.put_u32(*piece);
            }
            Message::Bitfield(bits) => {
                buf.put_u8(MessageId::Bitfield as u8);
                buf.put_slice(bits);
            }
            Message::Unchoke => buf.put_u8(MessageId::Unchoke as u8),
            Message::Choke => buf.put_u8(MessageId::Choke as u8),
        }

        buf.freeze()
    }

    /// Decodes a frame payload. An empty payload is a keep-alive.
    pub fn decode(mut payload: Bytes) -> Result<Self, PeerError> {
        if payload.is_empty() {
            return Ok(Message::KeepAlive);
        }

        let id = MessageId::try_from(payload.get_u8())?;

        match id {
            MessageId::Interested => Ok(Message::Interested),
            MessageId::NotInterested => Ok(Message::NotInterested),
            MessageId::Request => {
                if payload.remaining() < 4 {
                    return Err(PeerError::TruncatedMessage("request"));
                }
                Ok(Message::Request {
                    piece: payload.get_u32(),
                })
            }
            MessageId::Piece => {
                if payload.remaining() < 4 {
                    return Err(PeerError::TruncatedMessage("piece"));
                }
                let piece = payload.get_u32();
                Ok(Message::Piece {
                    piece,
                    data: payload,
                })
            }
            MessageId::Have => {
                if payload.remaining() < 4 {
                    return Err(PeerError::TruncatedMessage("have"));
                }
                Ok(Message::Have {
                    piece: payload.get_u32(),
                })
            }
            MessageId::Bitfield => Ok(Message::Bitfield(payload)),
            MessageId::Unchoke => Ok(Message::Unchoke),
            MessageId::Choke => Ok(Message::Choke),
        }
    }
}
