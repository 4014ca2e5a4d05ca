//! Swarm-wide state: the peer registry, piece availability, rarest-first
//! selection, and the tit-for-tat choking scheduler.
//!
//! The registry is the single owner of per-peer state. Everything lives
//! under one mutex, and only the engine's dispatch task mutates it, so
//! no further locking is needed.

mod choking;
mod error;
mod handle;
mod registry;

pub use choking::UnchokeAction;
pub use error::SwarmError;
pub use handle::PeerHandle;
pub use registry::SwarmRegistry;

#[cfg(test)]
mod tests;
