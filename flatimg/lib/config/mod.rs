//! Configuration types and helpers.

mod defaults;
mod image_ref;
mod materialize;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use defaults::*;
pub use image_ref::*;
pub use materialize::*;
