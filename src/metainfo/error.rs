use crate::bencode::BencodeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetainfoError {
    #[error("bencode error: {0}")]
    Bencode(#[from] BencodeError),

    #[error("missing field: {0}")]
    MissingField(&'static str),

    #[error("invalid field: {0}")]
    InvalidField(&'static str),

    #[error("pieces string length is not a multiple of 20")]
    InvalidPiecesLength,

    #[error("invalid content id length")]
    InvalidContentIdLength,

    #[error("multi-file content is not supported")]
    MultiFileUnsupported,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
