//! Image-save archives: manifest parsing, layer composition and canonical serialization.

mod archive;
mod manifest;
mod save;

pub mod rootfs;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use archive::*;
pub use manifest::*;
pub use save::*;
