use std::{
    collections::{BTreeMap, HashSet},
    ffi::OsStr,
    io::{self, Read},
    os::unix::ffi::OsStrExt,
    path::{Path, PathBuf},
};

use getset::Getters;
use tar::{Archive, Entry, EntryType};

use crate::{
    oci::{archive, Layer},
    utils::PAX_XATTR_PREFIX,
    FlatimgError, FlatimgResult, FormatError,
};

use super::{
    whiteout::{self, Whiteout},
    EntryAttributes, EntryKind, MergedTree,
};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Counters collected while applying one layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Getters)]
#[getset(get = "pub with_prefix")]
pub struct LayerStats {
    /// Entries materialized in the tree.
    applied: usize,

    /// Deletion and opaque markers processed.
    whiteouts: usize,

    /// Entries that carried nothing to materialize.
    skipped: usize,
}

/// Applies the entries of one layer archive, tracking which paths the layer wrote.
struct LayerApplier<'a> {
    tree: &'a mut MergedTree,
    layer: &'a str,

    /// Paths this layer wrote, plus every ancestor of them. Closed under ancestors.
    touched: HashSet<PathBuf>,

    /// Paths this layer wrote an entry for.
    written: HashSet<PathBuf>,
    stats: LayerStats,
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Applies every layer, in order, onto the merged tree.
///
/// Each layer archive is read from `save_root`. The first error aborts the merge and leaves the
/// tree as it was when the error happened.
pub fn merge(tree: &mut MergedTree, save_root: &Path, layers: &[Layer]) -> FlatimgResult<()> {
    for layer in layers {
        apply_layer(tree, save_root, layer)?;
    }

    tracing::info!(
        "merged {} layer(s) into {} ({} paths)",
        layers.len(),
        tree.root().display(),
        tree.len()
    );

    Ok(())
}

/// Opens one layer archive (plain or gzip-compressed) and applies it to the tree.
pub fn apply_layer(
    tree: &mut MergedTree,
    save_root: &Path,
    layer: &Layer,
) -> FlatimgResult<LayerStats> {
    let label = layer.to_string();
    tracing::info!("applying layer {}: {}", layer.get_ordinal(), label);

    let archive_path = layer.archive_path(save_root);
    let mut archive =
        archive::open_archive(&archive_path).map_err(|e| FlatimgError::LayerHandling {
            layer: label.clone(),
            source: e,
        })?;

    let stats = apply_archive(tree, &label, &mut archive)?;
    tracing::info!(
        "layer {} done: applied={}, whiteouts={}, skipped={}",
        label,
        stats.applied,
        stats.whiteouts,
        stats.skipped
    );

    Ok(stats)
}

/// Applies the entries of an already opened layer archive, in archive order.
///
/// `layer` names the archive in errors and logs.
pub fn apply_archive<R: Read>(
    tree: &mut MergedTree,
    layer: &str,
    archive: &mut Archive<R>,
) -> FlatimgResult<LayerStats> {
    let mut applier = LayerApplier {
        tree,
        layer,
        touched: HashSet::new(),
        written: HashSet::new(),
        stats: LayerStats::default(),
    };

    let entries = archive.entries().map_err(|e| applier.malformed(e))?;
    for entry in entries {
        let entry = entry.map_err(|e| applier.malformed(e))?;
        applier.apply_entry(entry)?;
    }

    Ok(applier.stats)
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl LayerApplier<'_> {
    fn apply_entry<R: Read>(&mut self, mut entry: Entry<'_, R>) -> FlatimgResult<()> {
        let entry_type = entry.header().entry_type();
        if entry_type == EntryType::XGlobalHeader {
            self.stats.skipped += 1;
            return Ok(());
        }

        let raw_path = entry.path_bytes().into_owned();
        let path = self.normalize(&raw_path)?;

        let Some(name) = path.file_name() else {
            tracing::debug!("skipping root entry {:?}", String::from_utf8_lossy(&raw_path));
            self.stats.skipped += 1;
            return Ok(());
        };

        match whiteout::classify(name) {
            Whiteout::None => {}
            Whiteout::Meta => {
                tracing::debug!("skipping whiteout metadata {}", path.display());
                self.stats.skipped += 1;
                return Ok(());
            }
            Whiteout::Invalid => {
                return Err(FormatError::UnsafePath {
                    layer: self.layer.to_string(),
                    path: String::from_utf8_lossy(&raw_path).into_owned(),
                    reason: "whiteout does not name a sibling".to_string(),
                }
                .into());
            }
            Whiteout::Remove(target) => return self.apply_whiteout(&path, target),
            Whiteout::Opaque => return self.apply_opaque(&path),
        }

        self.check_symlink_ancestor(&path)?;
        self.tree
            .ensure_parents(&path)
            .map_err(|e| self.io_error(e))?;

        let attrs = self.attributes(&mut entry, &path)?;
        match entry_type {
            EntryType::Directory => {
                tracing::debug!("dir {}", path.display());
                self.tree
                    .insert_dir(&path, attrs)
                    .map_err(|e| self.io_error(e))?;
            }
            EntryType::Regular | EntryType::Continuous | EntryType::GNUSparse => {
                tracing::debug!("file {}", path.display());
                self.tree
                    .insert_file(&path, &mut entry, attrs)
                    .map_err(|e| self.io_error(e))?;
            }
            EntryType::Symlink => {
                let target = entry
                    .link_name_bytes()
                    .map(|target| target.into_owned())
                    .ok_or_else(|| {
                        self.malformed(io::Error::new(
                            io::ErrorKind::InvalidData,
                            format!("symlink {} has no target", path.display()),
                        ))
                    })?;
                tracing::debug!(
                    "symlink {} -> {}",
                    path.display(),
                    String::from_utf8_lossy(&target)
                );
                self.tree
                    .insert_symlink(&path, Path::new(OsStr::from_bytes(&target)), attrs)
                    .map_err(|e| self.io_error(e))?;
            }
            EntryType::Link => self.apply_hardlink(&entry, &path)?,
            EntryType::Fifo | EntryType::Char | EntryType::Block => {
                tracing::debug!("special {} ({:?})", path.display(), entry_type);
                self.tree
                    .insert_special(&path, attrs)
                    .map_err(|e| self.io_error(e))?;
            }
            other => {
                return Err(FormatError::UnsupportedEntry {
                    layer: self.layer.to_string(),
                    path: path.display().to_string(),
                    entry_type: format!("{other:?}"),
                }
                .into());
            }
        }

        self.touch(&path);
        self.written.insert(path);
        self.stats.applied += 1;
        Ok(())
    }

    fn apply_whiteout(&mut self, marker: &Path, name: &OsStr) -> FlatimgResult<()> {
        let target = marker.with_file_name(name);
        self.check_symlink_ancestor(&target)?;

        let removed = self
            .tree
            .remove(&target)
            .map_err(|e| self.io_error(e))?;
        tracing::debug!("whiteout {} (removed: {})", target.display(), removed);

        self.stats.whiteouts += 1;
        Ok(())
    }

    fn apply_opaque(&mut self, marker: &Path) -> FlatimgResult<()> {
        let dir = marker.parent().unwrap_or(Path::new(""));
        self.check_symlink_ancestor(marker)?;

        let removed = if dir.as_os_str().is_empty() {
            let root_children: Vec<PathBuf> = self
                .tree
                .entries()
                .filter(|(path, _)| !self.touched.contains(*path))
                .map(|(path, _)| path.to_path_buf())
                .collect();

            let mut removed = 0;
            for path in root_children {
                if self.tree.remove(&path).map_err(|e| self.io_error(e))? {
                    removed += 1;
                }
            }
            self.reset_passed_through(dir)?;
            removed
        } else {
            self.tree
                .ensure_parents(dir)
                .map_err(|e| self.io_error(e))?;
            if self.tree.get(dir).map(|attrs| *attrs.get_kind()) != Some(EntryKind::Directory) {
                self.tree
                    .insert_dir(dir, EntryAttributes::implicit_directory())
                    .map_err(|e| self.io_error(e))?;
            }

            let removed = self
                .tree
                .remove_descendants_except(dir, &self.touched)
                .map_err(|e| self.io_error(e))?;
            self.reset_passed_through(dir)?;
            self.touch(dir);
            removed
        };

        tracing::debug!("opaque {} (removed {} paths)", dir.display(), removed);
        self.stats.whiteouts += 1;
        Ok(())
    }

    fn apply_hardlink<R: Read>(&mut self, entry: &Entry<'_, R>, path: &Path) -> FlatimgResult<()> {
        let raw_target = entry
            .link_name_bytes()
            .map(|target| target.into_owned())
            .unwrap_or_default();
        let target_display = String::from_utf8_lossy(&raw_target).into_owned();

        let invalid = |reason: &str| FormatError::InvalidHardLink {
            layer: self.layer.to_string(),
            path: path.display().to_string(),
            target: target_display.clone(),
            reason: reason.to_string(),
        };

        let target = match flatutils::normalize_archive_path(&raw_target) {
            Ok(target) if !target.as_os_str().is_empty() => target,
            Ok(_) => return Err(invalid("target names the tree root").into()),
            Err(e) => return Err(invalid(&e.to_string()).into()),
        };

        self.check_symlink_ancestor(&target)?;

        match self.tree.get(&target).map(|attrs| *attrs.get_kind()) {
            None => return Err(invalid("target does not exist").into()),
            Some(EntryKind::Directory) => return Err(invalid("target is a directory").into()),
            Some(_) => {}
        }

        tracing::debug!("hardlink {} -> {}", path.display(), target.display());
        self.tree
            .insert_hardlink(path, &target)
            .map_err(|e| self.io_error(e))?;
        Ok(())
    }

    fn attributes<R: Read>(
        &self,
        entry: &mut Entry<'_, R>,
        path: &Path,
    ) -> FlatimgResult<EntryAttributes> {
        let header = entry.header();
        let kind = match header.entry_type() {
            EntryType::Directory => EntryKind::Directory,
            EntryType::Symlink => EntryKind::Symlink,
            EntryType::Fifo => EntryKind::Fifo,
            EntryType::Char => EntryKind::CharDevice,
            EntryType::Block => EntryKind::BlockDevice,
            _ => EntryKind::Regular,
        };

        let mode = header.mode().map_err(|e| self.malformed(e))?;
        let uid = header.uid().map_err(|e| self.malformed(e))?;
        let gid = header.gid().map_err(|e| self.malformed(e))?;
        let mut attrs = EntryAttributes::new(kind, mode, uid, gid);

        if kind == EntryKind::CharDevice || kind == EntryKind::BlockDevice {
            let major = header.device_major().map_err(|e| self.malformed(e))?;
            let minor = header.device_minor().map_err(|e| self.malformed(e))?;
            attrs = attrs.with_device(major.unwrap_or(0), minor.unwrap_or(0));
        }

        let mut xattrs = BTreeMap::new();
        if let Some(extensions) = entry.pax_extensions().map_err(|e| self.malformed(e))? {
            for extension in extensions {
                let extension = extension.map_err(|e| self.malformed(e))?;
                let Ok(key) = extension.key() else {
                    tracing::debug!("ignoring non UTF-8 PAX key on {}", path.display());
                    continue;
                };

                if key.starts_with(PAX_XATTR_PREFIX) {
                    xattrs.insert(key.to_string(), extension.value_bytes().to_vec());
                }
            }
        }

        Ok(attrs.with_xattrs(xattrs))
    }

    fn normalize(&self, raw_path: &[u8]) -> FlatimgResult<PathBuf> {
        flatutils::normalize_archive_path(raw_path).map_err(|e| {
            FormatError::UnsafePath {
                layer: self.layer.to_string(),
                path: String::from_utf8_lossy(raw_path).into_owned(),
                reason: e.to_string(),
            }
            .into()
        })
    }

    fn check_symlink_ancestor(&self, path: &Path) -> FlatimgResult<()> {
        match self.tree.symlink_ancestor(path) {
            Some(symlink) => Err(FormatError::SymlinkTraversal {
                layer: self.layer.to_string(),
                path: path.display().to_string(),
                symlink: symlink.display().to_string(),
            }
            .into()),
            None => Ok(()),
        }
    }

    /// Resets directories under `dir` that survived an opaque marker only as ancestors of this
    /// layer's entries. They get the attributes of an implicitly created parent.
    fn reset_passed_through(&mut self, dir: &Path) -> FlatimgResult<()> {
        let passed: Vec<PathBuf> = self
            .touched
            .iter()
            .filter(|path| path.as_path() != dir && path.starts_with(dir))
            .filter(|path| !self.written.contains(*path))
            .filter(|path| {
                self.tree
                    .get(path)
                    .is_some_and(|attrs| *attrs.get_kind() == EntryKind::Directory)
            })
            .cloned()
            .collect();

        for path in passed {
            tracing::trace!("resetting {} under opaque {}", path.display(), dir.display());
            self.tree
                .insert_dir(&path, EntryAttributes::implicit_directory())
                .map_err(|e| self.io_error(e))?;
        }

        Ok(())
    }

    /// Marks a path and all its ancestors as touched by this layer.
    fn touch(&mut self, path: &Path) {
        for ancestor in path.ancestors() {
            if ancestor.as_os_str().is_empty() || !self.touched.insert(ancestor.to_path_buf()) {
                break;
            }
        }
    }

    fn malformed(&self, source: io::Error) -> FlatimgError {
        FormatError::MalformedArchive {
            archive: self.layer.to_string(),
            source,
        }
        .into()
    }

    fn io_error(&self, source: io::Error) -> FlatimgError {
        FlatimgError::LayerHandling {
            layer: self.layer.to_string(),
            source,
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::{fs, io::Cursor, os::unix::fs::MetadataExt};

    use tempfile::tempdir;

    use crate::test_utils::{list_tree, LayerBuilder};

    use super::*;

    #[test_log::test]
    fn test_merge_whiteout_handling() -> anyhow::Result<()> {
        let temp = tempdir()?;
        let mut tree = MergedTree::create(temp.path().join("merged"))?;

        helper::apply(
            &mut tree,
            LayerBuilder::new()
                .file("file1.txt", b"original content", 0o644)
                .file("file2.txt", b"keep this file", 0o644)
                .dir("dir1", 0o755)
                .file("dir1/inside1.txt", b"inside1", 0o644)
                .file("dir1/inside2.txt", b"inside2", 0o644)
                .build(),
        )?;
        let stats = helper::apply(
            &mut tree,
            LayerBuilder::new()
                .whiteout("file1.txt")
                .whiteout("never-existed")
                .file("file3.txt", b"new file", 0o644)
                .build(),
        )?;

        assert_eq!(stats.get_whiteouts(), &2);
        assert_eq!(stats.get_applied(), &1);
        assert_eq!(
            list_tree(tree.root()),
            vec![
                "dir1",
                "dir1/inside1.txt",
                "dir1/inside2.txt",
                "file2.txt",
                "file3.txt"
            ]
        );
        assert!(!tree.contains(Path::new("file1.txt")));

        helper::apply(&mut tree, LayerBuilder::new().whiteout("dir1").build())?;
        assert!(!tree.contains(Path::new("dir1")));
        assert!(!tree.contains(Path::new("dir1/inside1.txt")));
        assert_eq!(list_tree(tree.root()), vec!["file2.txt", "file3.txt"]);

        // A marker below a regular file names nothing.
        let stats = helper::apply(
            &mut tree,
            LayerBuilder::new().whiteout("file2.txt/ghost").build(),
        )?;
        assert_eq!(stats.get_whiteouts(), &1);
        assert_eq!(list_tree(tree.root()), vec!["file2.txt", "file3.txt"]);

        Ok(())
    }

    #[test_log::test]
    fn test_merge_opaque_independent_of_marker_position() -> anyhow::Result<()> {
        let base = || {
            LayerBuilder::new()
                .dir("dir1", 0o755)
                .file("dir1/inside1.txt", b"inside1", 0o644)
                .dir("dir1/sub", 0o755)
                .file("dir1/sub/deep.txt", b"deep", 0o644)
                .owned_dir("dir1/owned", 0o700, 1000, 1000)
                .owned_file("dir1/owned/old.txt", b"old", 0o600, 1000, 1000)
                .file("outside.txt", b"outside", 0o644)
                .build()
        };

        let marker_first = LayerBuilder::new()
            .dir("dir1", 0o755)
            .opaque("dir1")
            .file("dir1/new_file.txt", b"new content", 0o644)
            .file("dir1/owned/new.txt", b"new", 0o644)
            .build();

        let marker_last = LayerBuilder::new()
            .dir("dir1", 0o755)
            .file("dir1/new_file.txt", b"new content", 0o644)
            .file("dir1/owned/new.txt", b"new", 0o644)
            .opaque("dir1")
            .build();

        let mut results = Vec::new();
        for upper in [marker_first, marker_last] {
            let temp = tempdir()?;
            let mut tree = MergedTree::create(temp.path().join("merged"))?;
            helper::apply(&mut tree, base())?;
            helper::apply(&mut tree, upper)?;

            assert_eq!(
                list_tree(tree.root()),
                vec![
                    "dir1",
                    "dir1/new_file.txt",
                    "dir1/owned",
                    "dir1/owned/new.txt",
                    "outside.txt"
                ]
            );
            assert_eq!(
                fs::read_to_string(tree.root().join("dir1/new_file.txt"))?,
                "new content"
            );

            let entries: Vec<(PathBuf, EntryAttributes)> = tree
                .entries()
                .map(|(path, attrs)| (path.to_path_buf(), attrs.clone()))
                .collect();
            results.push(entries);
        }

        assert_eq!(results[0], results[1]);
        let owned = results[0]
            .iter()
            .find(|(path, _)| path == Path::new("dir1/owned"))
            .map(|(_, attrs)| attrs)
            .unwrap();
        assert_eq!(owned, &EntryAttributes::implicit_directory());

        Ok(())
    }

    #[test_log::test]
    fn test_merge_opaque_creates_missing_directory() -> anyhow::Result<()> {
        let temp = tempdir()?;
        let mut tree = MergedTree::create(temp.path().join("merged"))?;

        helper::apply(&mut tree, LayerBuilder::new().opaque("fresh/dir").build())?;

        assert_eq!(list_tree(tree.root()), vec!["fresh", "fresh/dir"]);
        assert_eq!(
            tree.get(Path::new("fresh/dir")).map(|attrs| *attrs.get_kind()),
            Some(EntryKind::Directory)
        );

        Ok(())
    }

    #[test_log::test]
    fn test_merge_override_and_type_changes() -> anyhow::Result<()> {
        let temp = tempdir()?;
        let mut tree = MergedTree::create(temp.path().join("merged"))?;

        helper::apply(
            &mut tree,
            LayerBuilder::new()
                .file("etc/config", b"v1", 0o644)
                .dir("becomes-file", 0o755)
                .file("becomes-file/child", b"child", 0o644)
                .file("becomes-dir", b"file", 0o644)
                .build(),
        )?;
        helper::apply(
            &mut tree,
            LayerBuilder::new()
                .owned_file("etc/config", b"v2", 0o600, 1000, 1000)
                .file("becomes-file", b"now a file", 0o644)
                .dir("becomes-dir", 0o700)
                .symlink("etc/link", "/etc/config")
                .build(),
        )?;

        assert_eq!(fs::read(tree.root().join("etc/config"))?, b"v2");
        let config = tree.get(Path::new("etc/config")).unwrap();
        assert_eq!(*config.get_mode(), 0o600);
        assert_eq!((*config.get_uid(), *config.get_gid()), (1000, 1000));

        assert!(tree.root().join("becomes-file").is_file());
        assert!(!tree.contains(Path::new("becomes-file/child")));
        assert!(tree.root().join("becomes-dir").is_dir());
        assert_eq!(
            fs::read_link(tree.root().join("etc/link"))?,
            Path::new("/etc/config")
        );

        Ok(())
    }

    #[test_log::test]
    fn test_merge_rejects_unsafe_paths() -> anyhow::Result<()> {
        let temp = tempdir()?;
        let outside = temp.path().join("escape");

        for raw in [&b"../escape"[..], b"/escape", b"a/../../escape"] {
            let mut tree = MergedTree::create(temp.path().join("merged"))?;
            let err = helper::apply(
                &mut tree,
                LayerBuilder::new().raw_path_file(raw, b"pwned").build(),
            )
            .unwrap_err();

            assert!(
                matches!(err, FlatimgError::Format(FormatError::UnsafePath { .. })),
                "unexpected error for {:?}: {err}",
                String::from_utf8_lossy(raw)
            );
            assert!(!outside.exists());
            fs::remove_dir_all(temp.path().join("merged"))?;
        }

        let mut tree = MergedTree::create(temp.path().join("merged"))?;
        let err = helper::apply(
            &mut tree,
            LayerBuilder::new().file(".wh..", b"", 0o644).build(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            FlatimgError::Format(FormatError::UnsafePath { .. })
        ));

        Ok(())
    }

    #[test_log::test]
    fn test_merge_rejects_writes_through_symlinks() -> anyhow::Result<()> {
        let temp = tempdir()?;
        let outside = temp.path().join("outside");
        fs::create_dir(&outside)?;

        let mut tree = MergedTree::create(temp.path().join("merged"))?;
        helper::apply(
            &mut tree,
            LayerBuilder::new()
                .symlink("escape", outside.to_str().unwrap())
                .build(),
        )?;

        let err = helper::apply(
            &mut tree,
            LayerBuilder::new().file("escape/pwned", b"x", 0o644).build(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            FlatimgError::Format(FormatError::SymlinkTraversal { .. })
        ));

        let err = helper::apply(
            &mut tree,
            LayerBuilder::new().whiteout("escape/victim").build(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            FlatimgError::Format(FormatError::SymlinkTraversal { .. })
        ));

        assert_eq!(fs::read_dir(&outside)?.count(), 0);

        // Replacing the symlink itself is fine.
        helper::apply(&mut tree, LayerBuilder::new().dir("escape", 0o755).build())?;
        assert!(tree.root().join("escape").is_dir());

        Ok(())
    }

    #[test_log::test]
    fn test_merge_hardlinks() -> anyhow::Result<()> {
        let temp = tempdir()?;
        let mut tree = MergedTree::create(temp.path().join("merged"))?;

        helper::apply(
            &mut tree,
            LayerBuilder::new()
                .owned_file("bin/busybox", b"busybox", 0o755, 0, 10)
                .hardlink("bin/sh", "bin/busybox")
                .hardlink("bin/busybox", "bin/busybox")
                .build(),
        )?;

        let sh = tree.get(Path::new("bin/sh")).unwrap();
        assert_eq!(*sh.get_mode(), 0o755);
        assert_eq!(*sh.get_gid(), 10);
        assert_eq!(
            fs::metadata(tree.root().join("bin/sh"))?.ino(),
            fs::metadata(tree.root().join("bin/busybox"))?.ino()
        );

        helper::apply(
            &mut tree,
            LayerBuilder::new().file("bin/busybox", b"patched", 0o755).build(),
        )?;
        assert_eq!(fs::read(tree.root().join("bin/sh"))?, b"busybox");
        assert_eq!(fs::read(tree.root().join("bin/busybox"))?, b"patched");

        for (target, expected) in [
            ("missing", "does not exist"),
            ("bin", "directory"),
        ] {
            let err = helper::apply(
                &mut tree,
                LayerBuilder::new().hardlink("bin/bad", target).build(),
            )
            .unwrap_err();
            assert!(
                matches!(&err, FlatimgError::Format(FormatError::InvalidHardLink { reason, .. }) if reason.contains(expected)),
                "unexpected error: {err}"
            );
        }

        let err = helper::apply(
            &mut tree,
            LayerBuilder::new().raw_hardlink("bin/bad", b"../etc/passwd").build(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            FlatimgError::Format(FormatError::InvalidHardLink { .. })
        ));

        Ok(())
    }

    #[test_log::test]
    fn test_merge_restrictive_modes_do_not_block_later_layers() -> anyhow::Result<()> {
        let temp = tempdir()?;
        let mut tree = MergedTree::create(temp.path().join("merged"))?;

        helper::apply(
            &mut tree,
            LayerBuilder::new()
                .dir("readonly", 0o555)
                .file("readonly/file", b"v1", 0o444)
                .dir("noperm", 0o000)
                .build(),
        )?;
        helper::apply(
            &mut tree,
            LayerBuilder::new()
                .file("readonly/file", b"v2", 0o444)
                .file("readonly/new", b"new", 0o200)
                .file("noperm/inside", b"x", 0o644)
                .build(),
        )?;

        assert_eq!(fs::read(tree.root().join("readonly/file"))?, b"v2");
        assert_eq!(*tree.get(Path::new("readonly")).unwrap().get_mode(), 0o555);
        assert_eq!(*tree.get(Path::new("noperm")).unwrap().get_mode(), 0o000);
        assert_eq!(*tree.get(Path::new("readonly/new")).unwrap().get_mode(), 0o200);

        Ok(())
    }

    #[test_log::test]
    fn test_merge_special_files_and_xattrs() -> anyhow::Result<()> {
        let temp = tempdir()?;
        let mut tree = MergedTree::create(temp.path().join("merged"))?;

        helper::apply(
            &mut tree,
            LayerBuilder::new()
                .fifo("run/pipe", 0o600)
                .char_device("dev/null", 1, 3)
                .xattr_file(
                    "usr/bin/ping",
                    b"ping",
                    &[("SCHILY.xattr.security.capability", &b"\x01\x02"[..])],
                )
                .build(),
        )?;

        let pipe = tree.get(Path::new("run/pipe")).unwrap();
        assert_eq!(*pipe.get_kind(), EntryKind::Fifo);
        assert!(tree.root().join("run/pipe").is_file());

        let null = tree.get(Path::new("dev/null")).unwrap();
        assert_eq!(*null.get_kind(), EntryKind::CharDevice);
        assert_eq!(*null.get_device(), Some((1, 3)));

        let ping = tree.get(Path::new("usr/bin/ping")).unwrap();
        assert_eq!(
            ping.get_xattrs().get("SCHILY.xattr.security.capability"),
            Some(&b"\x01\x02".to_vec())
        );

        Ok(())
    }

    #[test_log::test]
    fn test_merge_skips_root_and_meta_entries() -> anyhow::Result<()> {
        let temp = tempdir()?;
        let mut tree = MergedTree::create(temp.path().join("merged"))?;

        let stats = helper::apply(
            &mut tree,
            LayerBuilder::new()
                .dir("./", 0o700)
                .file(".wh..wh..plnk", b"", 0o644)
                .file("./a/./b.txt", b"b", 0o644)
                .build(),
        )?;

        assert_eq!(stats.get_skipped(), &2);
        assert_eq!(list_tree(tree.root()), vec!["a", "a/b.txt"]);

        Ok(())
    }

    #[test_log::test]
    fn test_apply_layer_gzip_and_missing_archive() -> anyhow::Result<()> {
        let temp = tempdir()?;
        let save_root = temp.path().join("save");
        fs::create_dir_all(save_root.join("l1"))?;
        fs::write(
            save_root.join("l1/layer.tar"),
            LayerBuilder::new().file("hello.txt", b"hi", 0o644).build_gz(),
        )?;

        let mut tree = MergedTree::create(temp.path().join("merged"))?;
        let stats = apply_layer(&mut tree, &save_root, &Layer::new("l1/layer.tar", 0))?;
        assert_eq!(stats.get_applied(), &1);
        assert_eq!(fs::read(tree.root().join("hello.txt"))?, b"hi");

        let err = apply_layer(&mut tree, &save_root, &Layer::new("l2/layer.tar", 1)).unwrap_err();
        assert!(matches!(err, FlatimgError::LayerHandling { .. }));

        fs::write(save_root.join("garbage.tar"), vec![0x1f, 0x8b, 0x00, 0x01])?;
        let err =
            apply_layer(&mut tree, &save_root, &Layer::new("garbage.tar", 2)).unwrap_err();
        assert!(matches!(
            err,
            FlatimgError::Format(FormatError::MalformedArchive { .. })
        ));

        Ok(())
    }

    mod helper {
        use super::*;

        pub(super) fn apply(tree: &mut MergedTree, layer: Vec<u8>) -> FlatimgResult<LayerStats> {
            let mut archive = Archive::new(Cursor::new(layer));
            apply_archive(tree, "test-layer", &mut archive)
        }
    }
}
