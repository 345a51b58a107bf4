//! Helpers for building layer archives and image-save directories in tests.

use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use flate2::{write::GzEncoder, Compression};
use tar::{Builder, EntryType, Header};

use crate::utils::{MANIFEST_FILENAME, OPAQUE_WHITEOUT_MARKER, WHITEOUT_PREFIX};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Builds an in-memory layer archive entry by entry, in the order the methods are called.
pub(crate) struct LayerBuilder {
    builder: Builder<Vec<u8>>,
}

/// Lays out an extracted image-save directory: one `<id>/layer.tar` per layer and a manifest.
pub(crate) struct SaveDirBuilder {
    root: PathBuf,
    layers: Vec<String>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl LayerBuilder {
    pub(crate) fn new() -> Self {
        Self {
            builder: Builder::new(Vec::new()),
        }
    }

    pub(crate) fn dir(self, path: &str, mode: u32) -> Self {
        self.entry(path, EntryType::Directory, mode, 0, 0, b"")
    }

    pub(crate) fn owned_dir(self, path: &str, mode: u32, uid: u64, gid: u64) -> Self {
        self.entry(path, EntryType::Directory, mode, uid, gid, b"")
    }

    pub(crate) fn file(self, path: &str, contents: &[u8], mode: u32) -> Self {
        self.entry(path, EntryType::Regular, mode, 0, 0, contents)
    }

    pub(crate) fn owned_file(
        self,
        path: &str,
        contents: &[u8],
        mode: u32,
        uid: u64,
        gid: u64,
    ) -> Self {
        self.entry(path, EntryType::Regular, mode, uid, gid, contents)
    }

    pub(crate) fn fifo(self, path: &str, mode: u32) -> Self {
        self.entry(path, EntryType::Fifo, mode, 0, 0, b"")
    }

    pub(crate) fn char_device(mut self, path: &str, major: u32, minor: u32) -> Self {
        let mut header = Header::new_gnu();
        header.set_entry_type(EntryType::Char);
        header.set_mode(0o666);
        header.set_size(0);
        header.set_device_major(major).unwrap();
        header.set_device_minor(minor).unwrap();
        self.builder
            .append_data(&mut header, path, &b""[..])
            .unwrap();
        self
    }

    pub(crate) fn symlink(mut self, path: &str, target: &str) -> Self {
        let mut header = Header::new_gnu();
        header.set_entry_type(EntryType::Symlink);
        header.set_mode(0o777);
        header.set_size(0);
        self.builder.append_link(&mut header, path, target).unwrap();
        self
    }

    pub(crate) fn hardlink(mut self, path: &str, target: &str) -> Self {
        let mut header = Header::new_gnu();
        header.set_entry_type(EntryType::Link);
        header.set_mode(0o644);
        header.set_size(0);
        self.builder.append_link(&mut header, path, target).unwrap();
        self
    }

    /// Adds a `.wh.` marker deleting `path`.
    pub(crate) fn whiteout(self, path: &str) -> Self {
        let marker = match path.rsplit_once('/') {
            Some((parent, name)) => format!("{parent}/{WHITEOUT_PREFIX}{name}"),
            None => format!("{WHITEOUT_PREFIX}{path}"),
        };
        self.file(&marker, b"", 0o644)
    }

    /// Adds an opaque marker inside `dir`.
    pub(crate) fn opaque(self, dir: &str) -> Self {
        self.file(&format!("{dir}/{OPAQUE_WHITEOUT_MARKER}"), b"", 0o644)
    }

    pub(crate) fn xattr_file(
        mut self,
        path: &str,
        contents: &[u8],
        xattrs: &[(&str, &[u8])],
    ) -> Self {
        self.builder
            .append_pax_extensions(xattrs.iter().copied())
            .unwrap();
        self.file(path, contents, 0o644)
    }

    /// Adds a regular file whose name is stored byte for byte, bypassing the path checks of
    /// the archive writer.
    pub(crate) fn raw_path_file(mut self, raw_path: &[u8], contents: &[u8]) -> Self {
        let mut header = Header::new_gnu();
        header.as_old_mut().name[..raw_path.len()].copy_from_slice(raw_path);
        header.set_entry_type(EntryType::Regular);
        header.set_mode(0o644);
        header.set_size(contents.len() as u64);
        header.set_cksum();
        self.builder.append(&header, contents).unwrap();
        self
    }

    /// Adds a hard link whose target is stored byte for byte.
    pub(crate) fn raw_hardlink(mut self, path: &str, raw_target: &[u8]) -> Self {
        let mut header = Header::new_gnu();
        header.set_path(path).unwrap();
        header.as_old_mut().linkname[..raw_target.len()].copy_from_slice(raw_target);
        header.set_entry_type(EntryType::Link);
        header.set_mode(0o644);
        header.set_size(0);
        header.set_cksum();
        self.builder.append(&header, &b""[..]).unwrap();
        self
    }

    pub(crate) fn build(self) -> Vec<u8> {
        self.builder.into_inner().unwrap()
    }

    pub(crate) fn build_gz(self) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&self.build()).unwrap();
        encoder.finish().unwrap()
    }

    fn entry(
        mut self,
        path: &str,
        entry_type: EntryType,
        mode: u32,
        uid: u64,
        gid: u64,
        contents: &[u8],
    ) -> Self {
        let mut header = Header::new_gnu();
        header.set_entry_type(entry_type);
        header.set_mode(mode);
        header.set_uid(uid);
        header.set_gid(gid);
        header.set_size(contents.len() as u64);
        self.builder
            .append_data(&mut header, path, contents)
            .unwrap();
        self
    }
}

impl SaveDirBuilder {
    pub(crate) fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        fs::create_dir_all(&root).unwrap();
        Self {
            root,
            layers: Vec::new(),
        }
    }

    /// Stores a layer archive under a fresh layer directory.
    pub(crate) fn layer(mut self, archive: Vec<u8>) -> Self {
        let id = format!("{:064x}", self.layers.len() + 1);
        let relative = format!("{id}/layer.tar");
        fs::create_dir_all(self.root.join(&id)).unwrap();
        fs::write(self.root.join(&relative), archive).unwrap();
        self.layers.push(relative);
        self
    }

    /// Writes the manifest and returns the save root.
    pub(crate) fn finish(self) -> PathBuf {
        let manifest = serde_json::json!([{
            "Config": "config.json",
            "RepoTags": ["test/image:latest"],
            "Layers": self.layers,
        }]);
        fs::write(
            self.root.join(MANIFEST_FILENAME),
            serde_json::to_vec_pretty(&manifest).unwrap(),
        )
        .unwrap();
        self.root
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Lists every path under `root`, relative and sorted.
pub(crate) fn list_tree(root: &Path) -> Vec<String> {
    let mut paths: Vec<String> = walkdir::WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .map(|entry| {
            entry
                .unwrap()
                .path()
                .strip_prefix(root)
                .unwrap()
                .display()
                .to_string()
        })
        .collect();
    paths.sort();
    paths
}
