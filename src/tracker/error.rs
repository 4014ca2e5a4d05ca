use crate::bencode::BencodeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("bencode error: {0}")]
    Bencode(#[from] BencodeError),

    /// The tracker answered with a `failure reason` string.
    #[error("tracker returned failure: {0}")]
    Failure(String),

    #[error("invalid response: {0}")]
    InvalidResponse(&'static str),

    #[error("invalid tracker url: {0}")]
    InvalidUrl(String),
}
