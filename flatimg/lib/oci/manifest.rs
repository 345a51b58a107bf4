use std::{
    fmt, fs, io,
    os::unix::ffi::OsStrExt,
    path::{Path, PathBuf},
};

use getset::Getters;
use serde::Deserialize;

use crate::{utils::MANIFEST_FILENAME, FlatimgError, FlatimgResult, FormatError};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// One image description as recorded in an image-save manifest.
///
/// Only the fields the pipeline reads are modelled; anything else in the document is ignored.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ImageDescriptor {
    /// The image configuration document, relative to the save root.
    #[serde(default)]
    pub config: Option<String>,

    /// The tags the image was saved under. Untagged images carry `null` here.
    #[serde(default)]
    pub repo_tags: Option<Vec<String>>,

    /// The layer archives, bottom-most first.
    pub layers: Vec<String>,
}

/// The parsed manifest of an extracted image-save archive.
#[derive(Debug, Clone, Getters)]
#[getset(get = "pub with_prefix")]
pub struct Manifest {
    /// The image configuration document, for diagnostics only.
    config: Option<String>,

    /// The tags the image was saved under, for diagnostics only.
    repo_tags: Vec<String>,

    /// The layers in application order.
    layers: Vec<Layer>,
}

/// A reference to one layer archive inside the image-save root.
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
#[getset(get = "pub with_prefix")]
pub struct Layer {
    /// The archive path, relative to the image-save root.
    path: PathBuf,

    /// The position of the layer in application order, starting at 0.
    ordinal: usize,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl Manifest {
    /// Reads and parses `manifest.json` from the root of an extracted image-save archive.
    pub fn load(save_root: impl AsRef<Path>) -> FlatimgResult<Self> {
        let path = save_root.as_ref().join(MANIFEST_FILENAME);
        let contents = match fs::read(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(FormatError::ManifestNotFound(path).into());
            }
            Err(e) => return Err(FlatimgError::path_io(&path, e)),
        };

        Ok(Self::parse(&contents, &path)?)
    }

    /// Parses a manifest document.
    ///
    /// `path` is only used to give errors context.
    pub fn parse(contents: &[u8], path: &Path) -> Result<Self, FormatError> {
        let invalid = |reason: String| FormatError::InvalidManifest {
            path: path.to_path_buf(),
            reason,
        };

        let descriptors: Vec<ImageDescriptor> =
            serde_json::from_slice(contents).map_err(|e| invalid(e.to_string()))?;

        let mut descriptors = descriptors.into_iter();
        let descriptor = descriptors
            .next()
            .ok_or_else(|| invalid("manifest lists no images".to_string()))?;

        let ignored = descriptors.len();
        if ignored > 0 {
            tracing::warn!(
                "manifest {} describes {} more image(s); only the first is materialized",
                path.display(),
                ignored
            );
        }

        let layers = descriptor
            .layers
            .iter()
            .enumerate()
            .map(|(ordinal, layer)| {
                let normalized = flatutils::normalize_archive_path(layer.as_bytes())
                    .map_err(|e| invalid(format!("layer path '{layer}': {e}")))?;

                if normalized.as_os_str().is_empty() {
                    return Err(invalid(format!("layer path '{layer}' names the save root")));
                }

                Ok(Layer {
                    path: normalized,
                    ordinal,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            config: descriptor.config,
            repo_tags: descriptor.repo_tags.unwrap_or_default(),
            layers,
        })
    }

    /// Consumes the manifest, keeping only the layers.
    pub fn into_layers(self) -> Vec<Layer> {
        self.layers
    }
}

impl Layer {
    /// Creates a layer reference.
    pub fn new(path: impl Into<PathBuf>, ordinal: usize) -> Self {
        Self {
            path: path.into(),
            ordinal,
        }
    }

    /// The layer archive's location on disk.
    pub fn archive_path(&self, save_root: &Path) -> PathBuf {
        save_root.join(&self.path)
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(self.path.as_os_str().as_bytes()))
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Returns the ordered layers of the first image in the save root's manifest.
pub fn read_layers(save_root: impl AsRef<Path>) -> FlatimgResult<Vec<Layer>> {
    let manifest = Manifest::load(save_root)?;
    tracing::info!(
        "manifest lists {} layer(s) for {:?}",
        manifest.layers.len(),
        manifest.repo_tags
    );
    Ok(manifest.into_layers())
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
