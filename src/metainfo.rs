//! Content metadata: the document describing what a swarm distributes.
//!
//! A metadata document is a bencoded dictionary carrying the tracker URL and
//! an `info` section (name, length, piece length, piece hashes). The SHA-1
//! of the canonically encoded info section is the [`ContentId`] that names
//! the swarm.

mod content_id;
mod error;
mod torrent;

pub use content_id::ContentId;
pub use error::MetainfoError;
pub use torrent::{Info, Metainfo};

#[cfg(test)]
mod tests;
