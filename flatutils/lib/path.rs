//! `flatutils::path` is a module containing path utilities for the flatimg project.

use std::{ffi::OsStr, os::unix::ffi::OsStrExt, path::PathBuf};

use typed_path::{UnixComponent, UnixPath};

use crate::{FlatutilsError, FlatutilsResult};

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Normalizes a path recorded inside an archive into a path relative to the archive root.
///
/// Rules:
/// - Removes `.` components, redundant separators and trailing slashes
/// - Rejects absolute paths
/// - Rejects every `..` component, even one that would stay inside the root
/// - Accepts arbitrary non-UTF-8 bytes in components
///
/// A path that only names the root (`.`, `./`) normalizes to an empty path.
///
/// # Arguments
/// * `path` - The raw path bytes as stored in the archive
///
/// # Returns
/// An error if the path is empty, absolute, or contains a parent reference
pub fn normalize_archive_path(path: &[u8]) -> FlatutilsResult<PathBuf> {
    if path.is_empty() {
        return Err(FlatutilsError::PathValidation(
            "Path cannot be empty".to_string(),
        ));
    }

    let mut normalized = PathBuf::new();
    for component in UnixPath::new(path).components() {
        match component {
            UnixComponent::RootDir => {
                return Err(FlatutilsError::PathValidation(format!(
                    "Invalid path: absolute path '{}' is not allowed",
                    String::from_utf8_lossy(path)
                )));
            }
            UnixComponent::ParentDir => {
                return Err(FlatutilsError::PathValidation(format!(
                    "Invalid path: parent reference in '{}' is not allowed",
                    String::from_utf8_lossy(path)
                )));
            }
            UnixComponent::CurDir => continue,
            UnixComponent::Normal(c) => {
                if !c.is_empty() {
                    normalized.push(OsStr::from_bytes(c));
                }
            }
        }
    }

    Ok(normalized)
}

/// Turns an image reference into something usable as a file name stem.
///
/// Every `/` is replaced with `_`, so `registry.io/library/alpine:3.20` becomes
/// `registry.io_library_alpine:3.20`.
pub fn sanitize_name_for_path(name: &str) -> String {
    name.replace('/', "_")
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
