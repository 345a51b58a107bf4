use std::{fmt, path::Path, path::PathBuf};

use typed_builder::TypedBuilder;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Flags handed to the filesystem image encoder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, TypedBuilder)]
pub struct ConvertOptions {
    /// Append a VHD footer so the image can be attached as a virtual disk.
    #[builder(default)]
    pub append_vhd_footer: bool,

    /// Translate `.wh.` whiteout entries into overlay filesystem whiteouts.
    #[builder(default)]
    pub convert_whiteout: bool,

    /// Store small file contents inline in their inodes.
    #[builder(default)]
    pub inline_data: bool,
}

/// The filesystem images produced from one canonical archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, clap::ValueEnum)]
pub enum ImageVariant {
    /// A raw ext4 image.
    Plain,

    /// An ext4 image with a VHD footer.
    Vhd,

    /// An ext4 image usable as an overlay filesystem lower layer.
    Overlayfs,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ImageVariant {
    /// Every variant, in the order they are produced.
    pub const ALL: [ImageVariant; 3] = [
        ImageVariant::Plain,
        ImageVariant::Vhd,
        ImageVariant::Overlayfs,
    ];

    /// The encoder flags for this variant.
    pub fn options(&self) -> ConvertOptions {
        match self {
            ImageVariant::Plain => ConvertOptions::default(),
            ImageVariant::Vhd => ConvertOptions::builder().append_vhd_footer(true).build(),
            ImageVariant::Overlayfs => ConvertOptions::builder().convert_whiteout(true).build(),
        }
    }

    /// The file name suffix appended to the image stem.
    pub fn suffix(&self) -> &'static str {
        match self {
            ImageVariant::Plain => "ext4",
            ImageVariant::Vhd => "ext4.vhd",
            ImageVariant::Overlayfs => "overlayfs.ext4",
        }
    }

    /// The output path of this variant for an image stem.
    ///
    /// ## Examples
    ///
    /// ```
    /// use flatimg::convert::ImageVariant;
    /// use std::path::Path;
    ///
    /// assert_eq!(
    ///     ImageVariant::Vhd.output_path(Path::new("out"), "alpine:3.20"),
    ///     Path::new("out/alpine:3.20.ext4.vhd")
    /// );
    /// ```
    pub fn output_path(&self, output_dir: &Path, stem: &str) -> PathBuf {
        output_dir.join(format!("{stem}.{}", self.suffix()))
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl fmt::Display for ImageVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageVariant::Plain => write!(f, "plain"),
            ImageVariant::Vhd => write!(f, "vhd"),
            ImageVariant::Overlayfs => write!(f, "overlayfs"),
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
