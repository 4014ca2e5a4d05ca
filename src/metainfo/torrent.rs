use super::content_id::ContentId;
use super::error::MetainfoError;
use crate::bencode::{decode, encode, Value};

/// A parsed content-metadata document.
#[derive(Debug, Clone)]
pub struct Metainfo {
    /// Base URL of the tracker coordinating the swarm.
    pub announce: String,
    /// The info section describing the content itself.
    pub info: Info,
    /// SHA-1 of the canonically encoded info section.
    pub content_id: ContentId,
}

/// The info section of a metadata document.
#[derive(Debug, Clone)]
pub struct Info {
    /// Suggested name for the content.
    pub name: String,
    /// Total content length in bytes.
    pub length: u64,
    /// Bytes per piece; the last piece may be shorter.
    pub piece_length: u64,
    /// Expected SHA-1 hash per piece.
    pub pieces: Vec<[u8; 20]>,
}

impl Metainfo {
    /// Parses a metadata document from raw bytes.
    ///
    /// The content id is computed by re-encoding the decoded info section;
    /// the canonical encoder reproduces the original bytes for
    /// standard-compliant documents, so the id matches the one the swarm
    /// announces under.
    pub fn from_bytes(data: &[u8]) -> Result<Self, MetainfoError> {
        let value = decode(data)?;
        let dict = value.as_dict().ok_or(MetainfoError::InvalidField("root"))?;

        let announce = dict
            .get(b"announce".as_slice())
            .ok_or(MetainfoError::MissingField("announce"))?
            .as_str()
            .ok_or(MetainfoError::InvalidField("announce"))?
            .to_string();

        let info_value = dict
            .get(b"info".as_slice())
            .ok_or(MetainfoError::MissingField("info"))?;
        let content_id = ContentId::from_info_bytes(&encode(info_value)?);
        let info = parse_info(info_value)?;

        Ok(Self {
            announce,
            info,
            content_id,
        })
    }

    pub fn piece_count(&self) -> usize {
        self.info.pieces.len()
    }

    /// Size of the piece at `index`, accounting for the shorter last piece.
    pub fn piece_size(&self, index: usize) -> u64 {
        let full = self.info.piece_length;
        let start = index as u64 * full;
        full.min(self.info.length.saturating_sub(start))
    }
}

fn parse_info(value: &Value) -> Result<Info, MetainfoError> {
    let dict = value.as_dict().ok_or(MetainfoError::InvalidField("info"))?;

    if dict.contains_key(b"files".as_slice()) {
        return Err(MetainfoError::MultiFileUnsupported);
    }

    let name = dict
        .get(b"name".as_slice())
        .ok_or(MetainfoError::MissingField("name"))?
        .as_str()
        .ok_or(MetainfoError::InvalidField("name"))?
        .to_string();

    let length = dict
        .get(b"length".as_slice())
        .ok_or(MetainfoError::MissingField("length"))?
        .as_integer()
        .filter(|l| *l >= 0)
        .ok_or(MetainfoError::InvalidField("length"))? as u64;

    let piece_length = dict
        .get(b"piece length".as_slice())
        .ok_or(MetainfoError::MissingField("piece length"))?
        .as_integer()
        .filter(|l| *l > 0)
        .ok_or(MetainfoError::InvalidField("piece length"))? as u64;

    let pieces_raw = dict
        .get(b"pieces".as_slice())
        .ok_or(MetainfoError::MissingField("pieces"))?
        .as_bytes()
        .ok_or(MetainfoError::InvalidField("pieces"))?;

    if pieces_raw.len() % 20 != 0 {
        return Err(MetainfoError::InvalidPiecesLength);
    }

    let pieces = pieces_raw
        .chunks_exact(20)
        .map(|chunk| {
            let mut hash = [0u8; 20];
            hash.copy_from_slice(chunk);
            hash
        })
        .collect();

    Ok(Info {
        name,
        length,
        piece_length,
        pieces,
    })
}
