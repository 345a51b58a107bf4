//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// The default work directory, relative to the current directory.
pub const DEFAULT_WORK_DIR: &str = "work";

/// The default output directory for the canonical archive and images.
pub const DEFAULT_OUTPUT_DIR: &str = ".";

/// The default encoder executable.
pub const DEFAULT_TAR2EXT4_BIN: &str = "tar2ext4";

/// The default container engine executable.
pub const DEFAULT_DOCKER_BIN: &str = "docker";

/// Permission bits of directories in the on-disk tree, and of implicitly created parents.
pub const DEFAULT_DIR_MODE: u32 = 0o755;

/// Permission bits of files in the on-disk tree.
pub const DEFAULT_FILE_MODE: u32 = 0o644;

/// Modification time stamped on every canonical archive entry.
pub const CANONICAL_MTIME: u64 = 0;

/// Environment variable overriding the work directory.
pub const WORK_DIR_ENV_VAR: &str = "FLATIMG_WORK_DIR";

/// Environment variable overriding the encoder executable.
pub const TAR2EXT4_ENV_VAR: &str = "FLATIMG_TAR2EXT4";

/// Environment variable overriding the container engine executable.
pub const DOCKER_ENV_VAR: &str = "FLATIMG_DOCKER";
