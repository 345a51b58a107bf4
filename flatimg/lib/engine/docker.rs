use std::{
    env,
    ffi::{OsStr, OsString},
    path::{Path, PathBuf},
};

use getset::Getters;
use tokio::process::Command;

use crate::{
    config::{ImageRef, DEFAULT_DOCKER_BIN, DOCKER_ENV_VAR},
    EngineError,
};

use super::ContainerEngine;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Drives the `docker` command line.
#[derive(Debug, Clone, Getters)]
#[getset(get = "pub with_prefix")]
pub struct DockerCli {
    /// The resolved executable.
    program: PathBuf,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl DockerCli {
    /// Uses the given executable as is.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Finds the executable: `explicit` first, then `FLATIMG_DOCKER`, then `docker` on `PATH`.
    pub fn locate(explicit: Option<&Path>) -> Result<Self, EngineError> {
        let requested = explicit
            .map(|path| path.as_os_str().to_owned())
            .or_else(|| env::var_os(DOCKER_ENV_VAR))
            .unwrap_or_else(|| OsString::from(DEFAULT_DOCKER_BIN));

        let program = which::which(&requested).map_err(|e| EngineError::NotFound {
            program: requested.to_string_lossy().into_owned(),
            reason: e.to_string(),
        })?;

        tracing::debug!("using container engine {}", program.display());
        Ok(Self { program })
    }

    async fn run(&self, args: &[&OsStr]) -> Result<(), EngineError> {
        let command = std::iter::once(self.program.as_os_str())
            .chain(args.iter().copied())
            .map(|arg| arg.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ");
        tracing::info!("running {}", command);

        let output = Command::new(&self.program)
            .args(args)
            .output()
            .await
            .map_err(|e| EngineError::Spawn {
                program: self.program.display().to_string(),
                source: e,
            })?;

        if !output.status.success() {
            return Err(EngineError::CommandFailed {
                command,
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(())
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

#[async_trait::async_trait]
impl ContainerEngine for DockerCli {
    async fn build(&self, context_dir: &Path, tag: &ImageRef) -> Result<(), EngineError> {
        let tag = tag.to_string();
        self.run(&[
            OsStr::new("build"),
            OsStr::new("-t"),
            OsStr::new(&tag),
            context_dir.as_os_str(),
        ])
        .await
    }

    async fn save(&self, image: &ImageRef, archive: &Path) -> Result<(), EngineError> {
        let image = image.to_string();
        self.run(&[
            OsStr::new("save"),
            OsStr::new("-o"),
            archive.as_os_str(),
            OsStr::new(&image),
        ])
        .await
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
