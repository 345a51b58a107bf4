//! The container engine that builds images and saves them as image-save archives.

mod docker;

use std::path::Path;

use crate::{config::ImageRef, EngineError};

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use docker::*;

//--------------------------------------------------------------------------------------------------
// Traits
//--------------------------------------------------------------------------------------------------

/// A container engine able to build an image and save it as an archive.
#[async_trait::async_trait]
pub trait ContainerEngine: Send + Sync {
    /// Builds the image in `context_dir` and tags it.
    async fn build(&self, context_dir: &Path, tag: &ImageRef) -> Result<(), EngineError>;

    /// Saves a local image as an image-save archive at `archive`.
    async fn save(&self, image: &ImageRef, archive: &Path) -> Result<(), EngineError>;
}
