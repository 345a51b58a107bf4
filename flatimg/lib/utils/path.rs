//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// The filename of the manifest document inside an image-save archive.
pub const MANIFEST_FILENAME: &str = "manifest.json";

/// The sub directory of the work directory that holds the merged tree.
pub const EXTRACTION_SUBDIR: &str = "extraction";

/// The suffix of the image-save archive written by the container engine.
pub const SAVE_ARCHIVE_SUFFIX: &str = "image.tar";

/// The extension of the canonical archive.
pub const CANONICAL_ARCHIVE_EXTENSION: &str = "tar";

/// The opaque directory marker file name used in OCI layers.
pub const OPAQUE_WHITEOUT_MARKER: &str = ".wh..wh..opq";

/// The prefix for whiteout files in OCI layers.
pub const WHITEOUT_PREFIX: &str = ".wh.";

/// The prefix for AUFS metadata entries, which are never materialized.
pub const WHITEOUT_META_PREFIX: &str = ".wh..wh.";

/// The PAX record prefix carrying extended attributes.
pub const PAX_XATTR_PREFIX: &str = "SCHILY.xattr.";
