//! The materialization pipeline.
//!
//! A run goes through these stages, strictly one after another:
//! 1. validate the configuration
//! 2. prepare the work directory, removing a stale extraction directory
//! 3. obtain the image-save contents, asking the container engine if needed
//! 4. parse the manifest, merge the layers and write the canonical archive
//! 5. encode one filesystem image per requested variant

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use getset::Getters;
use tokio::fs;

use crate::{
    config::{ImageSource, MaterializeConfig},
    convert::{FilesystemEncoder, ImageVariant},
    engine::ContainerEngine,
    oci::{
        self,
        rootfs::{self, MergedTree},
        Layer,
    },
    ConfigError, FlatimgError, FlatimgResult,
};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// What a materialization run produced.
#[derive(Debug, Clone, Getters)]
#[getset(get = "pub with_prefix")]
pub struct MaterializeReport {
    /// The number of layers applied.
    layers: usize,

    /// The number of paths in the merged tree.
    entries: usize,

    /// The merged tree's directory.
    extraction_dir: PathBuf,

    /// The canonical archive.
    canonical_archive: PathBuf,

    /// The filesystem images, in the order they were produced.
    images: Vec<PathBuf>,
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Runs the whole pipeline for one image.
///
/// `engine` is only consulted when the image comes from the container engine. Without an
/// `encoder` the run stops after the canonical archive is written.
pub async fn run(
    config: &MaterializeConfig,
    engine: Option<&dyn ContainerEngine>,
    encoder: Option<&dyn FilesystemEncoder>,
) -> FlatimgResult<MaterializeReport> {
    config.validate()?;
    if config.needs_engine() && engine.is_none() {
        return Err(ConfigError::EngineUnavailable.into());
    }

    tracing::trace!("materialize config: {:?}", config);

    // Prepare the working layout
    for dir in [config.get_work_dir(), config.get_output_dir()] {
        fs::create_dir_all(dir)
            .await
            .map_err(|e| FlatimgError::path_io(dir, e))?;
    }

    let extraction_dir = config.extraction_dir();
    rootfs::remove(&extraction_dir).await?;

    // Obtain the image-save contents
    match (config.get_source(), engine) {
        (ImageSource::Extracted(dir), _) => {
            tracing::info!("using extracted image at {}", dir.display());
        }
        (ImageSource::SaveArchive(archive), _) => {
            extract(archive.clone(), config.get_work_dir().clone()).await?;
        }
        (ImageSource::Engine { build_context }, Some(engine)) => {
            if let Some(context) = build_context {
                tracing::info!("building {} from {}", config.get_image(), context.display());
                engine.build(context, config.get_image()).await?;
            }

            let archive = config.save_archive_path();
            tracing::info!("saving {} to {}", config.get_image(), archive.display());
            engine.save(config.get_image(), &archive).await?;
            extract(archive, config.get_work_dir().clone()).await?;
        }
        (ImageSource::Engine { .. }, None) => return Err(ConfigError::EngineUnavailable.into()),
    }

    // Merge and serialize on a blocking thread
    let save_root = config.save_root().to_path_buf();
    let canonical_archive = config.canonical_archive_path();
    let (layers, entries) = {
        let extraction_dir = extraction_dir.clone();
        let canonical_archive = canonical_archive.clone();
        tokio::task::spawn_blocking(move || -> FlatimgResult<(usize, usize)> {
            let layers = oci::read_layers(&save_root)?;
            let tree = materialize_tree(&save_root, &layers, &extraction_dir)?;
            write_canonical_archive(&tree, &canonical_archive)?;
            Ok((layers.len(), tree.len()))
        })
        .await??
    };

    let images = match encoder {
        Some(encoder) => {
            convert_all(
                encoder,
                &canonical_archive,
                config.get_output_dir(),
                &config.get_image().file_stem(),
                config.get_variants(),
            )
            .await?
        }
        None => {
            tracing::info!("no encoder configured; skipping image conversion");
            Vec::new()
        }
    };

    Ok(MaterializeReport {
        layers,
        entries,
        extraction_dir,
        canonical_archive,
        images,
    })
}

/// Merges `layers`, read from `save_root`, into a new tree at `extraction_dir`.
pub fn materialize_tree(
    save_root: &Path,
    layers: &[Layer],
    extraction_dir: &Path,
) -> FlatimgResult<MergedTree> {
    let mut tree = MergedTree::create(extraction_dir)?;
    rootfs::merge(&mut tree, save_root, layers)?;
    Ok(tree)
}

/// Writes the canonical archive of `tree` to `path`, creating parent directories as needed.
pub fn write_canonical_archive(tree: &MergedTree, path: &Path) -> FlatimgResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| FlatimgError::path_io(parent, e))?;
    }

    let file = File::create(path).map_err(|e| FlatimgError::path_io(path, e))?;
    let mut writer = rootfs::pack(tree, BufWriter::new(file))?;
    writer.flush().map_err(|e| FlatimgError::path_io(path, e))?;

    tracing::info!("wrote canonical archive {}", path.display());
    Ok(())
}

/// Encodes the canonical archive once per variant and returns the produced images.
pub async fn convert_all(
    encoder: &dyn FilesystemEncoder,
    canonical_archive: &Path,
    output_dir: &Path,
    stem: &str,
    variants: &[ImageVariant],
) -> FlatimgResult<Vec<PathBuf>> {
    let mut images = Vec::with_capacity(variants.len());
    for variant in variants {
        let output = variant.output_path(output_dir, stem);
        tracing::info!("encoding {} image {}", variant, output.display());
        encoder
            .encode(canonical_archive, &output, variant.options())
            .await?;
        images.push(output);
    }

    Ok(images)
}

async fn extract(archive: PathBuf, dest: PathBuf) -> FlatimgResult<()> {
    tokio::task::spawn_blocking(move || oci::extract_save_archive(&archive, &dest)).await?
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
