use std::{os::unix::fs::PermissionsExt, path::Path};

use tokio::fs;

use crate::{utils, FlatimgError, FlatimgResult};

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Removes a directory tree left behind by an earlier run. A missing directory is not an error.
///
/// Directories are made readable, writable and searchable first, so restrictive modes unpacked
/// from an image-save archive cannot block the removal.
///
/// # Errors
/// Returns error if:
/// - Failed to fix permissions for cleanup
/// - Failed to remove the directory tree
pub async fn remove(dir: impl AsRef<Path>) -> FlatimgResult<()> {
    let dir = dir.as_ref();
    match fs::symlink_metadata(dir).await {
        Ok(metadata) if metadata.is_dir() => {}
        Ok(_) => {
            return fs::remove_file(dir)
                .await
                .map_err(|e| FlatimgError::path_io(dir, e));
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(FlatimgError::path_io(dir, e)),
    }

    let mut dir_stack = vec![dir.to_path_buf()];

    // Process directories in a stack-based manner
    while let Some(current) = dir_stack.pop() {
        make_accessible(&current).await?;

        let Ok(mut entries) = fs::read_dir(&current).await else {
            continue;
        };

        while let Ok(Some(entry)) = entries.next_entry().await {
            if let Ok(file_type) = entry.file_type().await {
                if file_type.is_dir() {
                    dir_stack.push(entry.path());
                }
            }
        }
    }

    match fs::remove_dir_all(dir).await {
        Ok(_) => {
            tracing::debug!("removed {}", dir.display());
            Ok(())
        }
        Err(e) => {
            tracing::error!("failed to remove {}: {}", dir.display(), e);
            Err(FlatimgError::path_io(dir, e))
        }
    }
}

async fn make_accessible(dir: &Path) -> FlatimgResult<()> {
    let metadata = fs::symlink_metadata(dir)
        .await
        .map_err(|e| FlatimgError::path_io(dir, e))?;

    let mode = metadata.permissions().mode();
    let rwx_mode = mode | 0o700;
    if rwx_mode != mode {
        fs::set_permissions(dir, std::fs::Permissions::from_mode(rwx_mode))
            .await
            .map_err(|e| FlatimgError::path_io(dir, e))?;
        tracing::debug!(
            "made {} accessible: {} -> {}",
            dir.display(),
            utils::format_mode(mode),
            utils::format_mode(rwx_mode)
        );
    }

    Ok(())
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
