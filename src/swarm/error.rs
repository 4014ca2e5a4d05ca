use crate::peer::PeerId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SwarmError {
    /// A connection for this id is already registered.
    #[error("peer {0:?} already registered")]
    DuplicatePeer(PeerId),
}
