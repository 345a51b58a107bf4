//! Merged rootfs materialization and canonical serialization.
//!
//! Layers are applied one after another onto a [`MergedTree`]: an on-disk directory holding the
//! structure and file contents, plus an index holding the attributes the disk copy does not keep
//! faithfully (real modes, ownership, device numbers and extended attributes). The on-disk tree
//! stays owner-writable the whole time, so restrictive modes in one layer never block the next.
//!
//! Whiteouts follow the OCI layer conventions:
//! - `.wh.<name>` removes `<name>` and everything beneath it
//! - `.wh..wh..opq` hides everything lower layers put in its directory
//! - other `.wh..wh.` names are skipped
//!
//! Once every layer is applied, [`pack`] writes the tree as a deterministic tar stream.
//!
//! # Examples
//!
//! ```no_run
//! use std::{fs::File, path::Path};
//! use flatimg::oci::{self, rootfs::{self, MergedTree}};
//!
//! # fn example() -> flatimg::FlatimgResult<()> {
//! let save_root = Path::new("/path/to/save");
//! let layers = oci::read_layers(save_root)?;
//!
//! let mut tree = MergedTree::create("/path/to/work/extraction")?;
//! rootfs::merge(&mut tree, save_root, &layers)?;
//!
//! let output = File::create("/path/to/alpine.tar")?;
//! rootfs::pack(&tree, output)?;
//! # Ok(())
//! # }
//! ```

mod merge;
mod pack;
mod remove;
mod tree;
mod whiteout;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use merge::*;
pub use pack::*;
pub use remove::*;
pub use tree::*;
pub use whiteout::*;
