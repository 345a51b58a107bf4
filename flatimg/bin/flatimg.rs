use std::process::ExitCode;

use clap::Parser;
use flatimg::{
    cli::{styles::AnsiStyles, FlatimgArgs},
    convert::{FilesystemEncoder, Tar2Ext4},
    engine::{ContainerEngine, DockerCli},
    management::{self, MaterializeReport},
    FlatimgResult,
};
use tracing_subscriber::{fmt, EnvFilter};

//--------------------------------------------------------------------------------------------------
// Functions: main
//--------------------------------------------------------------------------------------------------

#[tokio::main]
async fn main() -> ExitCode {
    let args = FlatimgArgs::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    fmt()
        .with_target(false)
        .with_file(false)
        .with_line_number(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_level(true)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    match run(&args).await {
        Ok(report) => {
            print_report(&report);
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{} {err}", "error:".error());
            ExitCode::from(err.kind().exit_code())
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Functions: *
//--------------------------------------------------------------------------------------------------

async fn run(args: &FlatimgArgs) -> FlatimgResult<MaterializeReport> {
    let config = args.to_config();
    tracing::trace!("parsed arguments: {args:?}");

    // Fail on configuration before looking for any collaborator
    config.validate()?;

    let engine = if config.needs_engine() {
        Some(DockerCli::locate(args.docker.as_deref())?)
    } else {
        None
    };

    let encoder = if args.skip_convert {
        None
    } else {
        Some(Tar2Ext4::locate(args.tar2ext4.as_deref())?)
    };

    management::run(
        &config,
        engine.as_ref().map(|e| e as &dyn ContainerEngine),
        encoder.as_ref().map(|e| e as &dyn FilesystemEncoder),
    )
    .await
}

fn print_report(report: &MaterializeReport) {
    println!(
        "{} {} layers, {} entries",
        "merged".valid(),
        report.get_layers(),
        report.get_entries()
    );
    println!(
        "{} {}",
        "archive".header(),
        report.get_canonical_archive().display().to_string().literal()
    );
    for image in report.get_images() {
        println!(
            "{} {}",
            "image".header(),
            image.display().to_string().literal()
        );
    }
}
