use std::path::{Path, PathBuf};

use getset::Getters;
use typed_builder::TypedBuilder;

use crate::{
    convert::ImageVariant,
    utils::{CANONICAL_ARCHIVE_EXTENSION, EXTRACTION_SUBDIR, SAVE_ARCHIVE_SUFFIX},
    ConfigError,
};

use super::{ImageRef, DEFAULT_OUTPUT_DIR, DEFAULT_WORK_DIR};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Where the image-save contents come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// A directory that already holds an extracted image-save archive.
    Extracted(PathBuf),

    /// An image-save archive that will be extracted into the work directory.
    SaveArchive(PathBuf),

    /// Ask the container engine to save the image, optionally building it first from a
    /// context directory.
    Engine {
        /// The build context, if the image should be built before it is saved.
        build_context: Option<PathBuf>,
    },
}

/// The configuration of one materialization run.
///
/// ## Example
///
/// ```
/// use flatimg::config::{ImageSource, MaterializeConfig};
///
/// let config = MaterializeConfig::builder()
///     .image("alpine:3.20".parse().unwrap())
///     .source(ImageSource::Engine { build_context: None })
///     .work_dir("/tmp/flatimg/work")
///     .build();
///
/// assert_eq!(
///     config.extraction_dir(),
///     std::path::Path::new("/tmp/flatimg/work/extraction")
/// );
/// ```
#[derive(Debug, Clone, TypedBuilder, Getters)]
#[getset(get = "pub with_prefix")]
pub struct MaterializeConfig {
    /// The image to materialize.
    image: ImageRef,

    /// Where the image-save contents come from.
    source: ImageSource,

    /// The directory holding extracted image-save contents and the merged tree.
    #[builder(default = PathBuf::from(DEFAULT_WORK_DIR), setter(into))]
    work_dir: PathBuf,

    /// The directory receiving the canonical archive and filesystem images.
    #[builder(default = PathBuf::from(DEFAULT_OUTPUT_DIR), setter(into))]
    output_dir: PathBuf,

    /// The filesystem image variants to produce from the canonical archive.
    #[builder(default = ImageVariant::ALL.to_vec())]
    variants: Vec<ImageVariant>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl MaterializeConfig {
    /// The directory the merged tree is materialized into.
    pub fn extraction_dir(&self) -> PathBuf {
        self.work_dir.join(EXTRACTION_SUBDIR)
    }

    /// The root of the extracted image-save contents.
    pub fn save_root(&self) -> &Path {
        match &self.source {
            ImageSource::Extracted(dir) => dir,
            ImageSource::SaveArchive(_) | ImageSource::Engine { .. } => &self.work_dir,
        }
    }

    /// The path of the canonical archive.
    pub fn canonical_archive_path(&self) -> PathBuf {
        self.output_dir.join(format!(
            "{}.{CANONICAL_ARCHIVE_EXTENSION}",
            self.image.file_stem()
        ))
    }

    /// The path the container engine saves the image to.
    pub fn save_archive_path(&self) -> PathBuf {
        match &self.source {
            ImageSource::SaveArchive(archive) => archive.clone(),
            _ => self
                .output_dir
                .join(format!("{}.{SAVE_ARCHIVE_SUFFIX}", self.image.file_stem())),
        }
    }

    /// Whether the run needs a container engine.
    pub fn needs_engine(&self) -> bool {
        matches!(self.source, ImageSource::Engine { .. })
    }

    /// Checks the configuration before anything on disk is touched.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.work_dir.as_os_str().is_empty() {
            return Err(ConfigError::EmptyPath("work directory"));
        }

        if self.output_dir.as_os_str().is_empty() {
            return Err(ConfigError::EmptyPath("output directory"));
        }

        match &self.source {
            ImageSource::Extracted(dir) => {
                if !dir.is_dir() {
                    return Err(ConfigError::SaveRootNotDirectory(dir.clone()));
                }
            }
            ImageSource::SaveArchive(archive) => {
                if !archive.is_file() {
                    return Err(ConfigError::SaveArchiveNotFile(archive.clone()));
                }
            }
            ImageSource::Engine {
                build_context: Some(context),
            } => {
                if !context.is_dir() {
                    return Err(ConfigError::BuildContextNotDirectory(context.clone()));
                }
            }
            ImageSource::Engine {
                build_context: None,
            } => {}
        }

        self.check_extraction_overlap()
    }

    /// The extraction directory is wiped at the start of a run and serialized at the end, so it
    /// must hold neither the input nor the outputs.
    fn check_extraction_overlap(&self) -> Result<(), ConfigError> {
        let extraction = self.extraction_dir();
        let resolved_extraction = resolve(&extraction);

        let save_root = self.save_root();
        if resolve(save_root).starts_with(&resolved_extraction) {
            return Err(ConfigError::ExtractionOverlapsSaveRoot {
                extraction,
                save_root: save_root.to_path_buf(),
            });
        }

        if resolve(&self.output_dir).starts_with(&resolved_extraction) {
            return Err(ConfigError::OutputInsideExtraction {
                extraction,
                output: self.output_dir.clone(),
            });
        }

        Ok(())
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Makes `path` absolute, canonicalizes its longest existing prefix and appends the rest
/// unchanged.
fn resolve(path: &Path) -> PathBuf {
    let path = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    for ancestor in path.ancestors() {
        let Ok(resolved) = ancestor.canonicalize() else {
            continue;
        };

        return match path.strip_prefix(ancestor) {
            Ok(rest) if !rest.as_os_str().is_empty() => resolved.join(rest),
            _ => resolved,
        };
    }

    path
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
