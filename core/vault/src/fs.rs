//! Atomic file persistence.
//!
//! Every mutation of vault state goes through temp-file-plus-rename:
//! the final path is either absent, the previous version, or the fully
//! written new version, never a partial write. The rename is the single
//! irreversible commit point.

use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use inkvault_common::Result;

/// Build a temp path in the same directory as `path`.
///
/// Same directory matters: rename is only atomic within a filesystem.
pub(crate) fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("vault");
    path.with_file_name(format!(".{}.{}.tmp", name, Uuid::new_v4()))
}

/// Write `bytes` to `path` atomically.
///
/// Writes to a temp sibling, flushes to disk, then renames over the
/// final path. If anything fails before the rename, the previous file
/// version (if any) is left intact and the temp file is removed.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }

    let temp_path = temp_sibling(path);

    let write_result = async {
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(bytes).await?;
        file.sync_all().await?;
        Ok::<(), std::io::Error>(())
    }
    .await;

    if let Err(err) = write_result {
        let _ = fs::remove_file(&temp_path).await;
        return Err(err.into());
    }

    rename_with_fallback(&temp_path, path).await?;
    Ok(())
}

/// Rename with a fallback for platforms where rename fails if the
/// target exists (notably Windows). Cleans up the temp file if the
/// rename ultimately fails.
async fn rename_with_fallback(temp_path: &Path, destination: &Path) -> Result<()> {
    if let Err(initial_err) = fs::rename(temp_path, destination).await {
        let _ = fs::remove_file(destination).await;
        if let Err(retry_err) = fs::rename(temp_path, destination).await {
            let _ = fs::remove_file(temp_path).await;
            return Err(std::io::Error::new(
                retry_err.kind(),
                format!(
                    "Atomic rename failed (initial: {}, retry: {})",
                    initial_err, retry_err
                ),
            )
            .into());
        }
    }
    Ok(())
}

/// True for the temp files produced by [`write_atomic`].
///
/// Directory scans skip these so an interrupted write is invisible.
pub fn is_temp_file(path: &Path) -> bool {
    path.extension().map_or(false, |ext| ext == "tmp")
}
