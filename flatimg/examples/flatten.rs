//! This example flattens a local container image into its canonical rootfs archive.
//!
//! The example will:
//! 1. Ask `docker` to save the image (default `alpine:latest`) into the output directory
//! 2. Merge its layers into `build/work/extraction`
//! 3. Write the canonical archive to `build/<image>.tar` and list what went into it
//!
//! No filesystem images are encoded, so `tar2ext4` is not needed.
//!
//! To run the example:
//! ```bash
//! cargo run --example flatten -- alpine:3.20
//! ```

use std::{fs::File, path::PathBuf};

use flatimg::{
    config::{ImageSource, MaterializeConfig},
    engine::DockerCli,
    management,
};

//--------------------------------------------------------------------------------------------------
// Functions: main
//--------------------------------------------------------------------------------------------------

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let image = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "alpine:latest".to_string());
    let build_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("build");

    let config = MaterializeConfig::builder()
        .image(image.parse()?)
        .source(ImageSource::Engine {
            build_context: None,
        })
        .work_dir(build_dir.join("work"))
        .output_dir(build_dir.clone())
        .variants(vec![])
        .build();

    let docker = DockerCli::locate(None)?;
    let report = management::run(&config, Some(&docker), None).await?;

    println!(
        "\nMerged {} layers into {} entries",
        report.get_layers(),
        report.get_entries()
    );
    println!("Canonical archive: {}", report.get_canonical_archive().display());

    // The first entries of the archive, in canonical order
    let mut archive = tar::Archive::new(File::open(report.get_canonical_archive())?);
    for entry in archive.entries()?.take(20) {
        let entry = entry?;
        println!(
            "  {:o} {:>5}:{:<5} {}",
            entry.header().mode()?,
            entry.header().uid()?,
            entry.header().gid()?,
            entry.path()?.display()
        );
    }

    Ok(())
}
