use super::error::StorageError;
use super::piece_store::PieceStore;
use crate::metainfo::ContentId;
use std::path::{Path, PathBuf};

/// Concatenates all pieces in index order and writes the result to
/// `<root>/<hex-content-id>.<extension>`, creating the directory if needed.
///
/// Returns the path of the written file. Any still-missing piece aborts the
/// write untouched.
pub async fn assemble(
    store: &PieceStore,
    root: &Path,
    content_id: &ContentId,
    extension: &str,
) -> Result<PathBuf, StorageError> {
    let mut data = Vec::new();
    for index in 0..store.num_pieces() as u32 {
        let piece = store.get(index).ok_or(StorageError::MissingPiece(index))?;
        data.extend_from_slice(&piece);
    }

    tokio::fs::create_dir_all(root).await?;
    let path = root.join(format!("{}.{}", content_id.to_hex(), extension));
    tokio::fs::write(&path, &data).await?;

    // The output mode is 0644 regardless of the process umask.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).await?;
    }

    tracing::info!(path = %path.display(), bytes = data.len(), "content assembled");
    Ok(path)
}
