use thiserror::Error;

/// Engine-level errors.
///
/// Connection-scoped failures stay on their connection; this type surfaces
/// the ones callers of the engine API can hit directly.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("peer error: {0}")]
    Peer(#[from] crate::peer::PeerError),

    #[error("swarm error: {0}")]
    Swarm(#[from] crate::swarm::SwarmError),

    #[error("storage error: {0}")]
    Storage(#[from] crate::storage::StorageError),

    #[error("tracker error: {0}")]
    Tracker(#[from] crate::tracker::TrackerError),
}
