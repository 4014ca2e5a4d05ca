//! pixbit - A swarm engine for the piXTorrent protocol
//!
//! This library implements the core of a BitTorrent-compatible peer-to-peer
//! file distribution node: peer connections, the length-prefixed wire
//! protocol, rarest-first piece selection, tit-for-tat choking, piece
//! verification, and tracker-based peer discovery.
//!
//! # Modules
//!
//! - [`bencode`] - Bencode encoding/decoding
//! - [`metainfo`] - Content-metadata parsing and content ids
//! - [`peer`] - Wire messages, handshake, framing, bitfields, peer state
//! - [`swarm`] - Swarm registry, piece selection, choking scheduler
//! - [`storage`] - In-memory piece store and completion assembly
//! - [`tracker`] - HTTP tracker announce/scrape client
//! - [`engine`] - Connection runtime and the engine event loop

pub mod bencode;
pub mod constants;
pub mod engine;
pub mod metainfo;
pub mod peer;
pub mod storage;
pub mod swarm;
pub mod tracker;

pub use bencode::{decode, encode, BencodeError, Value};
pub use engine::{Engine, EngineConfig, EngineError, EngineHandle};
pub use metainfo::{ContentId, Info, Metainfo, MetainfoError};
pub use peer::{Bitfield, Handshake, Message, MessageId, PeerError, PeerId, PeerState};
pub use storage::{PieceStore, StorageError};
pub use swarm::{PeerHandle, SwarmError, SwarmRegistry, UnchokeAction};
pub use tracker::{AnnounceEvent, AnnounceResponse, ScrapeStats, TrackerClient, TrackerError};
