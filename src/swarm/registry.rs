use super::error::SwarmError;
use super::handle::PeerHandle;
use crate::peer::{Bitfield, PeerId, PeerState};
use crate::storage::PieceStore;
use parking_lot::Mutex;
use rand::Rng as _;
use std::collections::HashMap;
use tracing::debug;

/// The set of live peers and everything known about them.
///
/// A peer is registered once its handshake succeeds and removed when its
/// connection dies; registration and removal keep the handle, state, and
/// bitfield maps in lockstep.
pub struct SwarmRegistry {
    num_pieces: usize,
    inner: Mutex<Inner>,
}

#[derive(Default)]
pub(super) struct Inner {
    pub(super) peers: HashMap<PeerId, PeerHandle>,
    pub(super) states: HashMap<PeerId, PeerState>,
    pub(super) bitfields: HashMap<PeerId, Bitfield>,
    pending_requests: HashMap<PeerId, Vec<u32>>,
    pub(super) optimistic: Option<PeerId>,
    pub(super) round: u64,
}

impl SwarmRegistry {
    pub fn new(num_pieces: usize) -> Self {
        Self {
            num_pieces,
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn num_pieces(&self) -> usize {
        self.num_pieces
    }

    /// Registers a freshly handshaken connection.
    ///
    /// Rejects a second connection for an id that is already live; the
    /// caller closes the new connection in that case.
    pub fn register(&self, handle: PeerHandle) -> Result<(), SwarmError> {
        let mut inner = self.inner.lock();
        let id = handle.id();

        if inner.peers.contains_key(&id) {
            return Err(SwarmError::DuplicatePeer(id));
        }

        debug!(peer = ?id, addr = %handle.addr(), "peer joined swarm");
        inner.peers.insert(id, handle);
        inner.states.insert(id, PeerState::new());
        Ok(())
    }

    /// Drops every trace of a peer and closes its connection. Idempotent.
    pub fn remove(&self, id: &PeerId) {
        let mut inner = self.inner.lock();
        if let Some(handle) = inner.peers.remove(id) {
            handle.close();
            inner.states.remove(id);
            inner.bitfields.remove(id);
            inner.pending_requests.remove(id);
            if inner.optimistic == Some(*id) {
                inner.optimistic = None;
            }
            debug!(peer = ?id, "peer removed from swarm");
        }
    }

    pub fn contains(&self, id: &PeerId) -> bool {
        self.inner.lock().peers.contains_key(id)
    }

    pub fn peer_count(&self) -> usize {
        self.inner.lock().peers.len()
    }

    pub fn handle(&self, id: &PeerId) -> Option<PeerHandle> {
        self.inner.lock().peers.get(id).cloned()
    }

    /// Snapshot of every live handle, for broadcasts.
    pub fn handles(&self) -> Vec<PeerHandle> {
        self.inner.lock().peers.values().cloned().collect()
    }

    /// Clone of a peer's state, for observation.
    pub fn state(&self, id: &PeerId) -> Option<PeerState> {
        self.inner.lock().states.get(id).cloned()
    }

    pub fn set_peer_interested(&self, id: &PeerId, interested: bool) {
        if let Some(state) = self.inner.lock().states.get_mut(id) {
            state.peer_interested = interested;
        }
    }

    pub fn set_peer_choking(&self, id: &PeerId, choking: bool) {
        if let Some(state) = self.inner.lock().states.get_mut(id) {
            state.peer_choking = choking;
        }
    }

    pub fn set_am_interested(&self, id: &PeerId, interested: bool) {
        if let Some(state) = self.inner.lock().states.get_mut(id) {
            state.am_interested = interested;
        }
    }

    /// Whether we are currently choking this peer. Unknown peers count as
    /// choked.
    pub fn am_choking(&self, id: &PeerId) -> bool {
        self.inner
            .lock()
            .states
            .get(id)
            .map_or(true, |s| s.am_choking)
    }

    /// Whether this peer is choking us. Unknown peers count as choking.
    pub fn peer_choking(&self, id: &PeerId) -> bool {
        self.inner
            .lock()
            .states
            .get(id)
            .map_or(true, |s| s.peer_choking)
    }

    pub fn record_upload(&self, id: &PeerId, bytes: i64) {
        if let Some(state) = self.inner.lock().states.get_mut(id) {
            state.record_upload(bytes);
        }
    }

    pub fn record_download(&self, id: &PeerId, bytes: i64) {
        if let Some(state) = self.inner.lock().states.get_mut(id) {
            state.record_download(bytes);
        }
    }

    /// Swarm-wide `(uploaded, downloaded)` byte totals, for announces.
    pub fn totals(&self) -> (i64, i64) {
        let inner = self.inner.lock();
        inner.states.values().fold((0, 0), |(up, down), s| {
            (up + s.uploaded, down + s.downloaded)
        })
    }

    /// Replaces the stored bitfield for a peer.
    pub fn update_peer_bitfield(&self, id: &PeerId, bitfield: Bitfield) {
        self.inner.lock().bitfields.insert(*id, bitfield);
    }

    /// OR-sets one piece into a peer's bitfield, creating an empty one if
    /// the peer never announced a full bitfield.
    pub fn set_peer_has(&self, id: &PeerId, piece: u32) {
        let mut inner = self.inner.lock();
        let num_pieces = self.num_pieces;
        inner
            .bitfields
            .entry(*id)
            .or_insert_with(|| Bitfield::new(num_pieces))
            .set(piece as usize);
    }

    /// Stores the pieces to request from a peer once it unchokes us.
    pub fn store_pending_requests(&self, id: &PeerId, pieces: Vec<u32>) {
        self.inner.lock().pending_requests.insert(*id, pieces);
    }

    /// Drains the pending request list for a peer.
    pub fn take_pending_requests(&self, id: &PeerId) -> Vec<u32> {
        self.inner
            .lock()
            .pending_requests
            .remove(id)
            .unwrap_or_default()
    }

    /// Candidate pieces to request from a peer, rarest first.
    ///
    /// Availability is counted over every stored bitfield; candidates are
    /// the pieces missing locally that the peer offers. Equal-rarity
    /// candidates are shuffled so the swarm does not converge on one
    /// request order.
    pub fn rarest_missing(&self, store: &PieceStore, peer_bitfield: &Bitfield) -> Vec<u32> {
        let inner = self.inner.lock();

        let mut availability = vec![0u32; self.num_pieces];
        for bf in inner.bitfields.values() {
            for (piece, slot) in availability.iter_mut().enumerate() {
                if bf.has(piece) {
                    *slot += 1;
                }
            }
        }
        drop(inner);

        let mut rng = rand::rng();
        let mut candidates: Vec<(u32, u32, u32)> = store
            .missing(peer_bitfield)
            .into_iter()
            .map(|i| (i, availability[i as usize], rng.random::<u32>()))
            .collect();

        candidates.sort_by_key(|&(_, avail, tiebreak)| (avail, tiebreak));
        candidates.into_iter().map(|(i, _, _)| i).collect()
    }

    /// Closes every connection and clears all state.
    pub fn shutdown(&self) {
        let mut inner = self.inner.lock();
        for handle in inner.peers.values() {
            handle.close();
        }
        inner.peers.clear();
        inner.states.clear();
        inner.bitfields.clear();
        inner.pending_requests.clear();
        inner.optimistic = None;
    }

    pub(super) fn lock(&self) -> parking_lot::MutexGuard<'_, Inner> {
        self.inner.lock()
    }

    #[cfg(test)]
    pub(crate) fn set_download_rate(&self, id: &PeerId, rate: f64) {
        if let Some(state) = self.inner.lock().states.get_mut(id) {
            state.force_download_rate(rate);
        }
    }

    #[cfg(test)]
    pub(crate) fn optimistic_slot(&self) -> Option<PeerId> {
        self.inner.lock().optimistic
    }
}
