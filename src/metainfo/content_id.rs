use super::error::MetainfoError;
use sha1::{Digest, Sha1};
use std::fmt;

/// A 20-byte content identifier: the SHA-1 of the canonical info section.
///
/// Identifies a swarm to trackers and to peers during the handshake.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentId(pub [u8; 20]);

impl ContentId {
    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Hashes a canonically encoded info section.
    pub fn from_info_bytes(info_bytes: &[u8]) -> Self {
        let digest: [u8; 20] = Sha1::digest(info_bytes).into();
        Self(digest)
    }

    /// Parses a 40-character hex string.
    pub fn from_hex(s: &str) -> Result<Self, MetainfoError> {
        if s.len() != 40 {
            return Err(MetainfoError::InvalidContentIdLength);
        }
        let mut id = [0u8; 20];
        for (i, byte) in id.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16)
                .map_err(|_| MetainfoError::InvalidContentIdLength)?;
        }
        Ok(Self(id))
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }

    /// Percent-encodes every byte for tracker announce requests.
    pub fn url_encode(&self) -> String {
        self.0.iter().map(|b| format!("%{:02x}", b)).collect()
    }
}

impl fmt::Debug for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentId({})", self.to_hex())
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}
