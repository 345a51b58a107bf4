use std::{
    env,
    ffi::OsString,
    path::{Path, PathBuf},
};

use getset::Getters;
use tokio::process::Command;

use crate::{
    config::{DEFAULT_TAR2EXT4_BIN, TAR2EXT4_ENV_VAR},
    ConversionError,
};

use super::{ConvertOptions, FilesystemEncoder};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Drives the `tar2ext4` command line tool.
#[derive(Debug, Clone, Getters)]
#[getset(get = "pub with_prefix")]
pub struct Tar2Ext4 {
    /// The resolved executable.
    program: PathBuf,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl Tar2Ext4 {
    /// Uses the given executable as is.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Finds the executable: `explicit` first, then `FLATIMG_TAR2EXT4`, then `tar2ext4` on `PATH`.
    pub fn locate(explicit: Option<&Path>) -> Result<Self, ConversionError> {
        let requested = explicit
            .map(|path| path.as_os_str().to_owned())
            .or_else(|| env::var_os(TAR2EXT4_ENV_VAR))
            .unwrap_or_else(|| OsString::from(DEFAULT_TAR2EXT4_BIN));

        let program = which::which(&requested).map_err(|e| ConversionError::EncoderNotFound {
            program: requested.to_string_lossy().into_owned(),
            reason: e.to_string(),
        })?;

        tracing::debug!("using encoder {}", program.display());
        Ok(Self { program })
    }

    /// The arguments passed to the executable.
    pub fn args(canonical_tar: &Path, output: &Path, options: ConvertOptions) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "-i".into(),
            canonical_tar.as_os_str().to_owned(),
            "-o".into(),
            output.as_os_str().to_owned(),
        ];

        if options.append_vhd_footer {
            args.push("-vhd".into());
        }

        if options.convert_whiteout {
            args.push("-overlay".into());
        }

        if options.inline_data {
            args.push("-inline".into());
        }

        args
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

#[async_trait::async_trait]
impl FilesystemEncoder for Tar2Ext4 {
    async fn encode(
        &self,
        canonical_tar: &Path,
        output: &Path,
        options: ConvertOptions,
    ) -> Result<(), ConversionError> {
        let args = Self::args(canonical_tar, output, options);
        tracing::trace!("{} {:?}", self.program.display(), args);

        let result = Command::new(&self.program)
            .args(&args)
            .output()
            .await
            .map_err(|e| ConversionError::Spawn {
                program: self.program.display().to_string(),
                source: e,
            })?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr).trim().to_string();
            tracing::error!("encoding {} failed: {}", output.display(), stderr);
            return Err(ConversionError::EncoderFailed {
                output: output.to_path_buf(),
                status: result.status.to_string(),
                stderr,
            });
        }

        tracing::info!("wrote {}", output.display());
        Ok(())
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
