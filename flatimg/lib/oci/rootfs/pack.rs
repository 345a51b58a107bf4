use std::{
    fs::{self, File},
    io::{self, Write},
    path::Path,
};

use tar::{Builder, EntryType, Header};
use walkdir::WalkDir;

use crate::{config::CANONICAL_MTIME, FlatimgError, FlatimgResult};

use super::{EntryAttributes, EntryKind, MergedTree};

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Serializes the merged tree as a canonical tar stream and returns the writer.
///
/// Entries are emitted depth-first with siblings in byte order of their names. Every header is a
/// GNU header with mtime fixed at the epoch, ownership and mode taken from the tree's index, and
/// extended attributes in a preceding PAX record. Hard-linked paths are written as independent
/// regular files. Two trees with the same paths, contents and attributes produce the same bytes.
///
/// Every path on disk must be described by the index; anything else under the root is an
/// [`FlatimgError::UnindexedPath`] error.
pub fn pack<W: Write>(tree: &MergedTree, writer: W) -> FlatimgResult<W> {
    let root = tree.root();
    let mut builder = Builder::new(writer);
    builder.follow_symlinks(false);

    let mut count = 0usize;
    let walker = WalkDir::new(root)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name();

    for dir_entry in walker {
        let dir_entry = dir_entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            FlatimgError::path_io(path, io::Error::from(e))
        })?;

        let disk_path = dir_entry.path();
        let path = disk_path
            .strip_prefix(root)
            .map_err(|e| FlatimgError::path_io(disk_path, io::Error::other(e)))?;

        let attrs = tree
            .get(path)
            .ok_or_else(|| FlatimgError::UnindexedPath(path.to_path_buf()))?;

        append_entry(&mut builder, disk_path, path, attrs)
            .map_err(|e| FlatimgError::path_io(disk_path, e))?;

        tracing::trace!("packed {}", path.display());
        count += 1;
    }

    let writer = builder
        .into_inner()
        .map_err(|e| FlatimgError::path_io(root, e))?;

    tracing::info!("packed {} entries from {}", count, root.display());
    Ok(writer)
}

fn append_entry<W: Write>(
    builder: &mut Builder<W>,
    disk_path: &Path,
    path: &Path,
    attrs: &EntryAttributes,
) -> io::Result<()> {
    if !attrs.get_xattrs().is_empty() {
        builder.append_pax_extensions(
            attrs
                .get_xattrs()
                .iter()
                .map(|(key, value)| (key.as_str(), value.as_slice())),
        )?;
    }

    let mut header = Header::new_gnu();
    header.set_mtime(CANONICAL_MTIME);
    header.set_uid(*attrs.get_uid());
    header.set_gid(*attrs.get_gid());
    header.set_mode(*attrs.get_mode() & 0o7777);

    match attrs.get_kind() {
        EntryKind::Directory => {
            header.set_entry_type(EntryType::Directory);
            header.set_size(0);
            builder.append_data(&mut header, path, io::empty())
        }
        EntryKind::Regular => {
            let file = File::open(disk_path)?;
            header.set_entry_type(EntryType::Regular);
            header.set_size(file.metadata()?.len());
            builder.append_data(&mut header, path, file)
        }
        EntryKind::Symlink => {
            let target = fs::read_link(disk_path)?;
            header.set_entry_type(EntryType::Symlink);
            header.set_size(0);
            builder.append_link(&mut header, path, target)
        }
        kind @ (EntryKind::Fifo | EntryKind::CharDevice | EntryKind::BlockDevice) => {
            header.set_entry_type(match kind {
                EntryKind::Fifo => EntryType::Fifo,
                EntryKind::CharDevice => EntryType::Char,
                _ => EntryType::Block,
            });
            header.set_size(0);
            let (major, minor) = (*attrs.get_device()).unwrap_or((0, 0));
            header.set_device_major(major)?;
            header.set_device_minor(minor)?;
            builder.append_data(&mut header, path, io::empty())
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
