//! `flatimg` flattens a saved container image into one canonical root filesystem archive and
//! turns that archive into block filesystem images.
//!
//! # Overview
//!
//! A container image is a stack of layer archives. Each layer adds, replaces or deletes paths
//! of the layers below it. flatimg:
//! - reads the image-save manifest to learn the layer order
//! - applies every layer onto one merged directory tree, honoring whiteouts
//! - serializes the merged tree into a byte-for-byte reproducible tar archive
//! - hands the archive to an external encoder (`tar2ext4`) once per output variant
//!
//! The image can come from an extracted image-save directory, an image-save archive, or the
//! container engine (`docker build` / `docker save`).
//!
//! # Usage Example
//!
//! ```rust,no_run
//! use flatimg::{
//!     config::{ImageSource, MaterializeConfig},
//!     convert::Tar2Ext4,
//!     management,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = MaterializeConfig::builder()
//!         .image("alpine:3.20".parse()?)
//!         .source(ImageSource::SaveArchive("alpine.image.tar".into()))
//!         .work_dir("/tmp/flatimg")
//!         .output_dir("out")
//!         .build();
//!
//!     let encoder = Tar2Ext4::locate(None)?;
//!     let report = management::run(&config, None, Some(&encoder)).await?;
//!     println!("{}", report.get_canonical_archive().display());
//!
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! - [`cli`] - Command-line argument types and styling
//! - [`config`] - Run configuration, image references and defaults
//! - [`convert`] - Filesystem image encoding
//! - [`engine`] - Container engine collaborator
//! - [`management`] - The end-to-end pipeline
//! - [`oci`] - Manifest parsing, layer merging and canonical serialization
//! - [`utils`] - Common constants and helpers
//!
//! # Platform Support
//!
//! Unix only. The merged tree relies on Unix permissions, symlinks and hard links.

#![warn(missing_docs)]

mod error;

#[cfg(test)]
mod test_utils;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub mod cli;
pub mod config;
pub mod convert;
pub mod engine;
pub mod management;
pub mod oci;
pub mod utils;

pub use error::*;
