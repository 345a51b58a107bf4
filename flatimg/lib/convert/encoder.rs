use std::path::Path;

use crate::ConversionError;

use super::ConvertOptions;

//--------------------------------------------------------------------------------------------------
// Traits
//--------------------------------------------------------------------------------------------------

/// An encoder that turns a canonical archive into a block filesystem image.
///
/// Implementations must leave `canonical_tar` untouched so the same archive can be encoded again
/// with different options.
#[async_trait::async_trait]
pub trait FilesystemEncoder: Send + Sync {
    /// Encodes `canonical_tar` into the image at `output`.
    async fn encode(
        &self,
        canonical_tar: &Path,
        output: &Path,
        options: ConvertOptions,
    ) -> Result<(), ConversionError>;
}
