use std::{fs::File, io::BufReader, path::Path};

use crate::{FlatimgError, FlatimgResult, FormatError};

use super::archive;

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Unpacks an image-save archive (plain or gzip-compressed) into `dest`.
///
/// The archive reader refuses entries that would land outside `dest`.
pub fn extract_save_archive(archive_path: &Path, dest: &Path) -> FlatimgResult<()> {
    tracing::info!(
        "extracting save archive {} into {}",
        archive_path.display(),
        dest.display()
    );

    std::fs::create_dir_all(dest).map_err(|e| FlatimgError::path_io(dest, e))?;

    let file = File::open(archive_path).map_err(|e| FlatimgError::path_io(archive_path, e))?;
    let malformed = |source| FormatError::MalformedArchive {
        archive: archive_path.display().to_string(),
        source,
    };

    let mut archive = archive::wrap_archive(BufReader::new(file)).map_err(malformed)?;
    archive.set_preserve_permissions(false);
    archive.set_overwrite(true);
    archive.unpack(dest).map_err(malformed)?;

    Ok(())
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
