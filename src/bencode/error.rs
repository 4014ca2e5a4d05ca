use thiserror::Error;

/// Errors from bencode encoding or decoding.
#[derive(Debug, Error)]
pub enum BencodeError {
    /// Input ended before a complete value was parsed.
    #[error("unexpected end of input")]
    UnexpectedEof,

    /// Integer is malformed (empty, leading zeros, overflow).
    #[error("invalid integer: {0}")]
    InvalidInteger(String),

    /// Byte-string length prefix is not a valid number.
    #[error("invalid string length")]
    InvalidStringLength,

    /// Encountered a character that starts no value kind.
    #[error("unexpected character: {0}")]
    UnexpectedChar(char),

    /// Extra data after the value.
    #[error("trailing data after value")]
    TrailingData,

    /// Recursion limit exceeded.
    #[error("nesting too deep")]
    NestingTooDeep,

    /// I/O error while encoding.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
