//! Conversion of the canonical archive into block filesystem images.
//!
//! The encoding itself is done by an external tool behind [`FilesystemEncoder`]. [`Tar2Ext4`]
//! drives the `tar2ext4` command line tool.

mod encoder;
mod options;
mod tar2ext4;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use encoder::*;
pub use options::*;
pub use tar2ext4::*;
