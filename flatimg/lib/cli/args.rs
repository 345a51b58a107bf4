use std::path::PathBuf;

use clap::{ArgGroup, Parser};

use crate::{
    cli::styles,
    config::{
        ImageRef, ImageSource, MaterializeConfig, DEFAULT_OUTPUT_DIR, DEFAULT_WORK_DIR,
        DOCKER_ENV_VAR, TAR2EXT4_ENV_VAR, WORK_DIR_ENV_VAR,
    },
    convert::ImageVariant,
};

//-------------------------------------------------------------------------------------------------
// Types
//-------------------------------------------------------------------------------------------------

/// `flatimg` flattens a saved container image into a canonical rootfs archive and ext4 images
#[derive(Debug, Parser)]
#[command(name = "flatimg", author, version, styles=styles::styles())]
#[command(group(ArgGroup::new("source").args(["save_archive", "save_root"])))]
pub struct FlatimgArgs {
    /// The image to materialize, as the container engine names it
    #[arg(value_name = "IMAGE")]
    pub image: ImageRef,

    /// Use an image-save archive instead of asking the container engine
    #[arg(short = 'a', long, value_name = "ARCHIVE")]
    pub save_archive: Option<PathBuf>,

    /// Use an already extracted image-save directory
    #[arg(short = 's', long, value_name = "DIR")]
    pub save_root: Option<PathBuf>,

    /// Build the image from this context directory before saving it
    #[arg(short = 'b', long, value_name = "DIR", conflicts_with = "source")]
    pub build_context: Option<PathBuf>,

    /// Directory holding the extracted image and the merged tree
    #[arg(short, long, env = WORK_DIR_ENV_VAR, default_value = DEFAULT_WORK_DIR)]
    pub work_dir: PathBuf,

    /// Directory receiving the canonical archive and images
    #[arg(short, long, default_value = DEFAULT_OUTPUT_DIR)]
    pub output_dir: PathBuf,

    /// Image variants to produce; all of them when omitted
    #[arg(long = "variant", value_enum, value_name = "VARIANT")]
    pub variants: Vec<ImageVariant>,

    /// Stop after writing the canonical archive
    #[arg(long)]
    pub skip_convert: bool,

    /// Path to the tar2ext4 executable
    #[arg(long, env = TAR2EXT4_ENV_VAR, value_name = "PATH")]
    pub tar2ext4: Option<PathBuf>,

    /// Path to the docker executable
    #[arg(long, env = DOCKER_ENV_VAR, value_name = "PATH")]
    pub docker: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short = 'V', long)]
    pub verbose: bool,
}

//-------------------------------------------------------------------------------------------------
// Methods
//-------------------------------------------------------------------------------------------------

impl FlatimgArgs {
    /// The image source selected by the arguments.
    pub fn source(&self) -> ImageSource {
        match (&self.save_root, &self.save_archive) {
            (Some(dir), _) => ImageSource::Extracted(dir.clone()),
            (None, Some(archive)) => ImageSource::SaveArchive(archive.clone()),
            (None, None) => ImageSource::Engine {
                build_context: self.build_context.clone(),
            },
        }
    }

    /// Turns the arguments into a run configuration.
    pub fn to_config(&self) -> MaterializeConfig {
        let variants = if self.variants.is_empty() {
            ImageVariant::ALL.to_vec()
        } else {
            let mut variants = self.variants.clone();
            variants.sort();
            variants.dedup();
            variants
        };

        MaterializeConfig::builder()
            .image(self.image.clone())
            .source(self.source())
            .work_dir(self.work_dir.clone())
            .output_dir(self.output_dir.clone())
            .variants(variants)
            .build()
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_default_to_engine_source() {
        let args = FlatimgArgs::try_parse_from(["flatimg", "alpine:3.20"]).unwrap();
        assert_eq!(args.source(), ImageSource::Engine { build_context: None });

        let config = args.to_config();
        assert_eq!(config.get_image().to_string(), "alpine:3.20");
        assert_eq!(config.get_variants(), &ImageVariant::ALL.to_vec());
        assert_eq!(config.get_output_dir(), &PathBuf::from("."));
    }

    #[test]
    fn test_args_select_source_and_variants() {
        let args = FlatimgArgs::try_parse_from([
            "flatimg",
            "acme/app:1.0",
            "--save-archive",
            "app.image.tar",
            "--variant",
            "overlayfs",
            "--variant",
            "plain",
            "--variant",
            "plain",
            "-o",
            "out",
        ])
        .unwrap();

        let config = args.to_config();
        assert_eq!(
            config.get_source(),
            &ImageSource::SaveArchive("app.image.tar".into())
        );
        assert_eq!(
            config.get_variants(),
            &vec![ImageVariant::Plain, ImageVariant::Overlayfs]
        );
        assert_eq!(
            config.canonical_archive_path(),
            PathBuf::from("out/acme_app:1.0.tar")
        );

        let args = FlatimgArgs::try_parse_from(["flatimg", "app", "-b", "ctx"]).unwrap();
        assert_eq!(
            args.source(),
            ImageSource::Engine {
                build_context: Some("ctx".into())
            }
        );
    }

    #[test]
    fn test_args_reject_conflicting_sources() {
        assert!(FlatimgArgs::try_parse_from(["flatimg", "app", "-a", "x.tar", "-s", "dir"]).is_err());
        assert!(FlatimgArgs::try_parse_from(["flatimg", "app", "-s", "dir", "-b", "ctx"]).is_err());
        assert!(FlatimgArgs::try_parse_from(["flatimg", "Not Valid"]).is_err());
        assert!(FlatimgArgs::try_parse_from(["flatimg", "app", "--variant", "qcow2"]).is_err());
    }
}
