use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("piece {0} already present")]
    AlreadyHave(u32),

    #[error("piece index {0} out of range")]
    OutOfRange(u32),

    #[error("piece {0} missing during assembly")]
    MissingPiece(u32),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
