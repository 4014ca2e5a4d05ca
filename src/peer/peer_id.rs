use rand::Rng as _;
use std::fmt;

/// A 20-byte peer identifier.
///
/// Locally generated ids look like `-XXdddd-` (two random uppercase
/// letters, four random digits) followed by 12 random bytes. Remote ids
/// are whatever the handshake carried.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeerId(pub [u8; 20]);

impl PeerId {
    /// Generates a fresh local id for this engine run.
    pub fn generate() -> Self {
        let mut rng = rand::rng();
        let mut id = [0u8; 20];

        id[0] = b'-';
        id[1] = rng.random_range(b'A'..=b'Z');
        id[2] = rng.random_range(b'A'..=b'Z');
        for byte in &mut id[3..7] {
            *byte = rng.random_range(b'0'..=b'9');
        }
        id[7] = b'-';
        rng.fill(&mut id[8..]);

        Self(id)
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != 20 {
            return None;
        }
        let mut id = [0u8; 20];
        id.copy_from_slice(bytes);
        Some(Self(id))
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Renders the id as 40 hex characters, the form trackers receive.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }

    fn prefix(&self) -> Option<&str> {
        if self.0[0] == b'-' && self.0[7] == b'-' {
            std::str::from_utf8(&self.0[1..7]).ok()
        } else {
            None
        }
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.prefix() {
            Some(prefix) => write!(f, "PeerId({})", prefix),
            None => write!(f, "PeerId({:02x?})", &self.0[..8]),
        }
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}
