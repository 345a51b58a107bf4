//! Management of materialization runs.

mod materialize;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use materialize::*;
