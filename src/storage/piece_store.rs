use super::error::StorageError;
use crate::peer::Bitfield;
use bytes::Bytes;
use parking_lot::RwLock;
use sha1::{Digest, Sha1};
use std::collections::HashMap;

/// Owns pieces `0..N` and the expected-hash table.
///
/// Internally synchronised: readers share, insertion is exclusive. A piece
/// goes from missing to present exactly once, and only the engine inserts,
/// after verifying. Without a hash table (no-verify mode) every payload
/// verifies.
pub struct PieceStore {
    num_pieces: usize,
    hashes: Option<Vec<[u8; 20]>>,
    pieces: RwLock<HashMap<u32, Bytes>>,
}

impl PieceStore {
    /// A store that accepts any payload for its pieces.
    pub fn new(num_pieces: usize) -> Self {
        Self {
            num_pieces,
            hashes: None,
            pieces: RwLock::new(HashMap::new()),
        }
    }

    /// A store verifying each piece against its expected SHA-1.
    pub fn with_hashes(hashes: Vec<[u8; 20]>) -> Self {
        Self {
            num_pieces: hashes.len(),
            hashes: Some(hashes),
            pieces: RwLock::new(HashMap::new()),
        }
    }

    pub fn num_pieces(&self) -> usize {
        self.num_pieces
    }

    pub fn received_count(&self) -> usize {
        self.pieces.read().len()
    }

    pub fn all_received(&self) -> bool {
        self.received_count() == self.num_pieces
    }

    pub fn has_piece(&self, index: u32) -> bool {
        self.pieces.read().contains_key(&index)
    }

    /// True iff `data` matches the expected hash for `index`, or the store
    /// runs without a hash table. Out-of-range indices never verify.
    pub fn verify(&self, index: u32, data: &[u8]) -> bool {
        if index as usize >= self.num_pieces {
            return false;
        }
        match &self.hashes {
            None => true,
            Some(hashes) => {
                let digest: [u8; 20] = Sha1::digest(data).into();
                hashes[index as usize] == digest
            }
        }
    }

    /// Inserts a piece. The caller must have verified the payload; this
    /// only guards the index range and double insertion.
    pub fn insert(&self, index: u32, data: Bytes) -> Result<(), StorageError> {
        if index as usize >= self.num_pieces {
            return Err(StorageError::OutOfRange(index));
        }

        let mut pieces = self.pieces.write();
        if pieces.contains_key(&index) {
            return Err(StorageError::AlreadyHave(index));
        }
        pieces.insert(index, data);
        Ok(())
    }

    pub fn get(&self, index: u32) -> Option<Bytes> {
        self.pieces.read().get(&index).cloned()
    }

    /// Packed bitfield of present pieces, MSB-first.
    pub fn bitfield(&self) -> Bitfield {
        let pieces = self.pieces.read();
        let mut bf = Bitfield::new(self.num_pieces);
        for index in pieces.keys() {
            bf.set(*index as usize);
        }
        bf
    }

    /// Indices missing locally that `peer_bitfield` has, ascending.
    pub fn missing(&self, peer_bitfield: &Bitfield) -> Vec<u32> {
        let pieces = self.pieces.read();
        (0..self.num_pieces as u32)
            .filter(|i| peer_bitfield.has(*i as usize) && !pieces.contains_key(i))
            .collect()
    }
}
