//! The peer wire protocol.
//!
//! Covers everything a single connection needs: the 68-byte handshake, the
//! length-prefixed framing codec, the typed message set, piece bitfields,
//! and per-peer state bookkeeping.

mod bitfield;
mod error;
mod framing;
mod message;
mod peer_id;
mod state;

pub use bitfield::Bitfield;
pub use error::PeerError;
pub use framing::{read_handshake, send_handshake, FrameReader, FrameWriter};
pub use message::{Handshake, Message, MessageId, HANDSHAKE_LEN, PROTOCOL};
pub use peer_id::PeerId;
pub use state::PeerState;
