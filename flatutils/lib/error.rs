//! `flatutils::error` is a module containing error utilities for the flatimg project.

use thiserror::Error;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The result of a flatutils-related operation.
pub type FlatutilsResult<T> = Result<T, FlatutilsError>;

/// An error that occurred in one of the flatutils helpers.
#[derive(pretty_error_debug::Debug, Error)]
pub enum FlatutilsError {
    /// An error that occurred when validating paths
    #[error("path validation error: {0}")]
    PathValidation(String),

    /// An error that occurred when performing an IO operation
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),
}
