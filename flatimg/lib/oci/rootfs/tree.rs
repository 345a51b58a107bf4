use std::{
    collections::{BTreeMap, HashSet},
    fs::{self, OpenOptions},
    io::{self, Read},
    os::unix::fs::{DirBuilderExt, OpenOptionsExt},
    path::{Path, PathBuf},
};

use getset::Getters;

use crate::{
    config::{DEFAULT_DIR_MODE, DEFAULT_FILE_MODE},
    ConfigError, FlatimgError, FlatimgResult,
};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The kind of a filesystem object in the merged tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// A directory.
    Directory,

    /// A regular file.
    Regular,

    /// A symbolic link. Its target lives on disk as a real symlink.
    Symlink,

    /// A named pipe. Stored on disk as an empty placeholder file.
    Fifo,

    /// A character device. Stored on disk as an empty placeholder file.
    CharDevice,

    /// A block device. Stored on disk as an empty placeholder file.
    BlockDevice,
}

/// The attributes the merged tree keeps for every path.
///
/// The on-disk tree only holds structure and content. Everything the canonical archive needs
/// beyond that lives here.
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
#[getset(get = "pub with_prefix")]
pub struct EntryAttributes {
    /// The object kind.
    kind: EntryKind,

    /// The permission bits, including setuid, setgid and sticky.
    mode: u32,

    /// The owning user id.
    uid: u64,

    /// The owning group id.
    gid: u64,

    /// Extended attributes keyed by their full PAX record name.
    xattrs: BTreeMap<String, Vec<u8>>,

    /// Device major and minor numbers, for device nodes.
    device: Option<(u32, u32)>,
}

/// The accumulating filesystem that layers are applied to.
///
/// Paths are relative to the tree root and never contain `.` or `..` components. The ordering
/// of [`PathBuf`] compares component by component, so every descendant of a path sorts directly
/// after it in the index.
#[derive(Debug)]
pub struct MergedTree {
    root: PathBuf,
    index: BTreeMap<PathBuf, EntryAttributes>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl EntryKind {
    /// Whether the object is a device node or a pipe.
    pub fn is_special(&self) -> bool {
        matches!(
            self,
            EntryKind::Fifo | EntryKind::CharDevice | EntryKind::BlockDevice
        )
    }
}

impl EntryAttributes {
    /// Creates attributes with no extended attributes and no device numbers.
    pub fn new(kind: EntryKind, mode: u32, uid: u64, gid: u64) -> Self {
        Self {
            kind,
            mode: mode & 0o7777,
            uid,
            gid,
            xattrs: BTreeMap::new(),
            device: None,
        }
    }

    /// The attributes of a directory created implicitly as a missing parent.
    pub fn implicit_directory() -> Self {
        Self::new(EntryKind::Directory, DEFAULT_DIR_MODE, 0, 0)
    }

    /// Sets the extended attributes.
    pub fn with_xattrs(mut self, xattrs: BTreeMap<String, Vec<u8>>) -> Self {
        self.xattrs = xattrs;
        self
    }

    /// Sets the device numbers.
    pub fn with_device(mut self, major: u32, minor: u32) -> Self {
        self.device = Some((major, minor));
        self
    }
}

impl MergedTree {
    /// Creates an empty tree rooted at `root`, creating the directory if needed.
    ///
    /// The root must be empty: the index has to describe every path under it.
    pub fn create(root: impl Into<PathBuf>) -> FlatimgResult<Self> {
        let root = root.into();
        fs::DirBuilder::new()
            .recursive(true)
            .mode(DEFAULT_DIR_MODE)
            .create(&root)
            .map_err(|e| FlatimgError::path_io(&root, e))?;

        let mut contents = fs::read_dir(&root).map_err(|e| FlatimgError::path_io(&root, e))?;
        if contents.next().is_some() {
            return Err(ConfigError::ExtractionNotEmpty(root).into());
        }

        Ok(Self {
            root,
            index: BTreeMap::new(),
        })
    }

    /// The directory the tree is materialized in.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where a tree path lives on disk.
    pub fn disk_path(&self, path: &Path) -> PathBuf {
        self.root.join(path)
    }

    /// Looks up the attributes recorded for a path.
    pub fn get(&self, path: &Path) -> Option<&EntryAttributes> {
        self.index.get(path)
    }

    /// Whether the tree holds a path.
    pub fn contains(&self, path: &Path) -> bool {
        self.index.contains_key(path)
    }

    /// Iterates over every path in canonical order.
    pub fn entries(&self) -> impl Iterator<Item = (&Path, &EntryAttributes)> {
        self.index.iter().map(|(path, attrs)| (path.as_path(), attrs))
    }

    /// The number of paths in the tree.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether the tree is empty.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Returns the closest proper ancestor of `path` that is a symlink in the tree.
    pub fn symlink_ancestor<'a>(&self, path: &'a Path) -> Option<&'a Path> {
        path.ancestors()
            .skip(1)
            .filter(|ancestor| !ancestor.as_os_str().is_empty())
            .find(|ancestor| {
                self.index
                    .get(*ancestor)
                    .is_some_and(|attrs| attrs.kind == EntryKind::Symlink)
            })
    }

    /// Makes sure every proper ancestor of `path` is a directory.
    ///
    /// Missing ancestors are created with default attributes. A non-directory in an ancestor
    /// position is replaced. Callers check for symlink ancestors first.
    pub fn ensure_parents(&mut self, path: &Path) -> io::Result<()> {
        let mut ancestors: Vec<&Path> = path
            .ancestors()
            .skip(1)
            .filter(|ancestor| !ancestor.as_os_str().is_empty())
            .collect();
        ancestors.reverse();

        for ancestor in ancestors {
            match self.index.get(ancestor).map(|attrs| attrs.kind) {
                Some(EntryKind::Directory) => continue,
                Some(_) => {
                    tracing::debug!("replacing {} with a directory", ancestor.display());
                    self.remove(ancestor)?;
                }
                None => {}
            }

            self.create_dir_on_disk(ancestor)?;
            self.index
                .insert(ancestor.to_path_buf(), EntryAttributes::implicit_directory());
        }

        Ok(())
    }

    /// Removes a path and everything beneath it. Removing a missing path is not an error, even
    /// when one of its ancestors is not a directory.
    ///
    /// Returns whether anything was removed.
    pub fn remove(&mut self, path: &Path) -> io::Result<bool> {
        let disk_path = self.disk_path(path);
        let removed_on_disk = match fs::symlink_metadata(&disk_path) {
            Ok(metadata) if metadata.is_dir() => {
                fs::remove_dir_all(&disk_path)?;
                true
            }
            Ok(_) => {
                fs::remove_file(&disk_path)?;
                true
            }
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::NotFound | io::ErrorKind::NotADirectory
                ) =>
            {
                false
            }
            Err(e) => return Err(e),
        };

        let doomed: Vec<PathBuf> = self
            .index
            .range(path.to_path_buf()..)
            .take_while(|(candidate, _)| candidate.starts_with(path))
            .map(|(candidate, _)| candidate.clone())
            .collect();

        for candidate in &doomed {
            self.index.remove(candidate);
        }

        Ok(removed_on_disk || !doomed.is_empty())
    }

    /// Removes every path beneath `dir` that is not in `keep`. `dir` itself is left alone.
    ///
    /// `keep` must be closed under ancestors, so a kept path never loses its parent.
    pub fn remove_descendants_except(
        &mut self,
        dir: &Path,
        keep: &HashSet<PathBuf>,
    ) -> io::Result<usize> {
        let doomed: Vec<PathBuf> = self
            .index
            .range(dir.to_path_buf()..)
            .take_while(|(candidate, _)| candidate.starts_with(dir))
            .filter(|(candidate, _)| candidate.as_path() != dir && !keep.contains(*candidate))
            .map(|(candidate, _)| candidate.clone())
            .collect();

        let mut removed = 0;
        for candidate in &doomed {
            if self.remove(candidate)? {
                removed += 1;
            }
        }

        Ok(removed)
    }

    /// Records a directory. An existing directory keeps its contents; anything else at the
    /// path is replaced.
    pub fn insert_dir(&mut self, path: &Path, attrs: EntryAttributes) -> io::Result<()> {
        if self.index.get(path).map(|existing| existing.kind) != Some(EntryKind::Directory) {
            self.remove(path)?;
            self.create_dir_on_disk(path)?;
        }

        self.index.insert(path.to_path_buf(), attrs);
        Ok(())
    }

    /// Writes a regular file from `contents`, replacing whatever was at the path.
    ///
    /// An existing file is unlinked rather than truncated, so hard-link siblings keep their data.
    pub fn insert_file(
        &mut self,
        path: &Path,
        contents: &mut impl Read,
        attrs: EntryAttributes,
    ) -> io::Result<u64> {
        self.remove(path)?;

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .mode(DEFAULT_FILE_MODE)
            .open(self.disk_path(path))?;
        let written = io::copy(contents, &mut file)?;

        self.index.insert(path.to_path_buf(), attrs);
        Ok(written)
    }

    /// Records a symlink. The target is stored verbatim and never resolved.
    pub fn insert_symlink(
        &mut self,
        path: &Path,
        target: &Path,
        attrs: EntryAttributes,
    ) -> io::Result<()> {
        self.remove(path)?;
        std::os::unix::fs::symlink(target, self.disk_path(path))?;
        self.index.insert(path.to_path_buf(), attrs);
        Ok(())
    }

    /// Links `path` to the existing non-directory `target`. The new path shares the target's
    /// attributes.
    pub fn insert_hardlink(&mut self, path: &Path, target: &Path) -> io::Result<()> {
        let attrs = match self.index.get(target) {
            Some(attrs) if attrs.kind != EntryKind::Directory => attrs.clone(),
            _ => {
                return Err(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("hard link target {} is not a file", target.display()),
                ))
            }
        };

        if path == target {
            return Ok(());
        }

        self.remove(path)?;
        fs::hard_link(self.disk_path(target), self.disk_path(path))?;
        self.index.insert(path.to_path_buf(), attrs);
        Ok(())
    }

    /// Records a FIFO or device node, backed on disk by an empty placeholder file.
    pub fn insert_special(&mut self, path: &Path, attrs: EntryAttributes) -> io::Result<()> {
        self.insert_file(path, &mut io::empty(), attrs).map(|_| ())
    }

    fn create_dir_on_disk(&self, path: &Path) -> io::Result<()> {
        match fs::DirBuilder::new()
            .mode(DEFAULT_DIR_MODE)
            .create(self.disk_path(path))
        {
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(()),
            result => result,
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
