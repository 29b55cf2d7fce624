//! Upload storage on the local filesystem
//!
//! Files land at `<uploads>/<user_id>/<uuid>.<ext>`. The client's filename is
//! never part of the path.

use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Write upload bytes, returning the stored path
pub async fn store_upload(
    uploads_dir: &Path,
    user_id: Uuid,
    file_id: Uuid,
    extension: &str,
    bytes: &[u8],
) -> std::io::Result<PathBuf> {
    let user_dir = uploads_dir.join(user_id.to_string());
    tokio::fs::create_dir_all(&user_dir).await?;

    let path = user_dir.join(format!("{}.{}", file_id, extension));
    let tmp_path = path.with_extension(format!("{}.part", extension));

    tokio::fs::write(&tmp_path, bytes).await?;
    tokio::fs::rename(&tmp_path, &path).await?;

    Ok(path)
}

/// Delete a stored upload
///
/// Paths outside `uploads_dir` are refused. A file that is already gone is
/// not an error.
pub async fn remove_upload(uploads_dir: &Path, stored_path: &Path) -> std::io::Result<()> {
    if !is_within(uploads_dir, stored_path) {
        tracing::warn!(
            path = %stored_path.display(),
            "Refusing to delete file outside uploads folder"
        );
        return Err(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "path outside uploads folder",
        ));
    }

    match tokio::fs::remove_file(stored_path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %stored_path.display(), "Upload already removed");
            Ok(())
        }
        Err(e) => Err(e),
    }
}

/// Lexical containment check (no `..` components allowed)
fn is_within(root: &Path, path: &Path) -> bool {
    let has_parent_component = path
        .components()
        .any(|c| matches!(c, std::path::Component::ParentDir));

    !has_parent_component && path.starts_with(root)
}
