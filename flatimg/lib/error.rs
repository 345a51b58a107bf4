use std::{io, path::PathBuf};

use thiserror::Error;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The result of a flatimg-related operation.
pub type FlatimgResult<T> = Result<T, FlatimgError>;

/// An error that occurred while materializing an image.
#[derive(Debug, Error)]
pub enum FlatimgError {
    /// The run was misconfigured.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// A manifest or archive did not have the expected shape.
    #[error("format error: {0}")]
    Format(#[from] FormatError),

    /// An I/O error.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// An I/O error tied to a specific path.
    #[error("io error at {}: {source}", path.display())]
    PathIo {
        /// The path being read or written.
        path: PathBuf,

        /// The underlying error.
        #[source]
        source: io::Error,
    },

    /// A path under the merged tree root that the tree never recorded.
    #[error("unindexed path in merged tree: {}", .0.display())]
    UnindexedPath(PathBuf),

    /// An I/O error while applying a layer archive.
    #[error("failed to handle layer {layer}: {source}")]
    LayerHandling {
        /// The layer archive path, relative to the image-save root.
        layer: String,

        /// The underlying error.
        #[source]
        source: io::Error,
    },

    /// The container engine reported a failure.
    #[error("container engine error: {0}")]
    Engine(#[from] EngineError),

    /// The filesystem image encoder reported a failure.
    #[error("conversion error: {0}")]
    Conversion(#[from] ConversionError),

    /// A blocking task could not be joined.
    #[error("join error: {0}")]
    JoinError(#[from] tokio::task::JoinError),
}

/// The coarse category of a [`FlatimgError`], used for exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad configuration, detected before the pipeline starts.
    Config,

    /// Malformed manifest or archive, or an unsafe entry path.
    Format,

    /// Filesystem, stream or collaborator process failure.
    Io,

    /// The filesystem image encoder failed.
    Conversion,
}

/// An error in the run configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The image reference is not usable.
    #[error("invalid image reference '{reference}': {reason}")]
    InvalidImageReference {
        /// The reference as given.
        reference: String,

        /// Why it was rejected.
        reason: String,
    },

    /// The extracted image-save directory does not exist or is not a directory.
    #[error("save root is not a directory: {}", .0.display())]
    SaveRootNotDirectory(PathBuf),

    /// The image-save archive does not exist or is not a file.
    #[error("save archive is not a file: {}", .0.display())]
    SaveArchiveNotFile(PathBuf),

    /// The build context does not exist or is not a directory.
    #[error("build context is not a directory: {}", .0.display())]
    BuildContextNotDirectory(PathBuf),

    /// A directory setting was empty.
    #[error("{0} must not be empty")]
    EmptyPath(&'static str),

    /// The extraction directory would swallow the input it is built from.
    #[error("extraction directory {} overlaps save root {}", extraction.display(), save_root.display())]
    ExtractionOverlapsSaveRoot {
        /// The extraction directory.
        extraction: PathBuf,

        /// The save root.
        save_root: PathBuf,
    },

    /// The output directory lies inside the extraction directory, so outputs would land in the
    /// tree being serialized.
    #[error("output directory {} is inside extraction directory {}", output.display(), extraction.display())]
    OutputInsideExtraction {
        /// The extraction directory.
        extraction: PathBuf,

        /// The output directory.
        output: PathBuf,
    },

    /// The merged tree root already has content.
    #[error("extraction directory is not empty: {}", .0.display())]
    ExtractionNotEmpty(PathBuf),

    /// The source needs a container engine but none was supplied.
    #[error("image source requires a container engine but none is available")]
    EngineUnavailable,
}

/// An error in the shape of a manifest or archive.
#[derive(Debug, Error)]
pub enum FormatError {
    /// The image-save root has no manifest document.
    #[error("manifest not found at {}", .0.display())]
    ManifestNotFound(PathBuf),

    /// The manifest document is malformed.
    #[error("invalid manifest {}: {reason}", path.display())]
    InvalidManifest {
        /// The manifest path.
        path: PathBuf,

        /// What was wrong with it.
        reason: String,
    },

    /// An archive could not be decoded.
    #[error("malformed archive {archive}: {source}")]
    MalformedArchive {
        /// The archive path.
        archive: String,

        /// The decoder error.
        #[source]
        source: io::Error,
    },

    /// An entry path is absolute or escapes the tree root.
    #[error("unsafe path '{path}' in layer {layer}: {reason}")]
    UnsafePath {
        /// The layer archive path.
        layer: String,

        /// The entry path as stored.
        path: String,

        /// Why it was rejected.
        reason: String,
    },

    /// An entry would be written through a symlink already in the tree.
    #[error("entry '{path}' in layer {layer} traverses symlink '{symlink}'")]
    SymlinkTraversal {
        /// The layer archive path.
        layer: String,

        /// The entry path.
        path: String,

        /// The symlink ancestor.
        symlink: String,
    },

    /// A hard link names a target that cannot be linked.
    #[error("invalid hard link '{path}' -> '{target}' in layer {layer}: {reason}")]
    InvalidHardLink {
        /// The layer archive path.
        layer: String,

        /// The entry path.
        path: String,

        /// The link target.
        target: String,

        /// Why it was rejected.
        reason: String,
    },

    /// An entry has a type this pipeline does not materialize.
    #[error("unsupported entry type {entry_type} for '{path}' in layer {layer}")]
    UnsupportedEntry {
        /// The layer archive path.
        layer: String,

        /// The entry path.
        path: String,

        /// The raw entry type.
        entry_type: String,
    },
}

/// An error reported by the container engine collaborator.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine executable could not be located.
    #[error("container engine '{program}' not found: {reason}")]
    NotFound {
        /// The program name or path.
        program: String,

        /// Why the lookup failed.
        reason: String,
    },

    /// The engine process could not be started.
    #[error("failed to run '{program}': {source}")]
    Spawn {
        /// The program path.
        program: String,

        /// The spawn error.
        #[source]
        source: io::Error,
    },

    /// The engine process exited unsuccessfully.
    #[error("'{command}' exited with {status}: {stderr}")]
    CommandFailed {
        /// The command line.
        command: String,

        /// The exit status.
        status: String,

        /// Captured standard error.
        stderr: String,
    },
}

/// An error reported by the filesystem image encoder collaborator.
#[derive(Debug, Error)]
pub enum ConversionError {
    /// The encoder executable could not be located.
    #[error("encoder '{program}' not found: {reason}")]
    EncoderNotFound {
        /// The program name or path.
        program: String,

        /// Why the lookup failed.
        reason: String,
    },

    /// The encoder process could not be started.
    #[error("failed to run encoder '{program}': {source}")]
    Spawn {
        /// The program path.
        program: String,

        /// The spawn error.
        #[source]
        source: io::Error,
    },

    /// The encoder exited unsuccessfully.
    #[error("encoding {} exited with {status}: {stderr}", output.display())]
    EncoderFailed {
        /// The image that was being produced.
        output: PathBuf,

        /// The exit status.
        status: String,

        /// Captured standard error.
        stderr: String,
    },
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl FlatimgError {
    /// Returns the category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            FlatimgError::Config(_) => ErrorKind::Config,
            FlatimgError::Format(_) => ErrorKind::Format,
            FlatimgError::Conversion(_) => ErrorKind::Conversion,
            FlatimgError::Io(_)
            | FlatimgError::PathIo { .. }
            | FlatimgError::UnindexedPath(_)
            | FlatimgError::LayerHandling { .. }
            | FlatimgError::Engine(_)
            | FlatimgError::JoinError(_) => ErrorKind::Io,
        }
    }

    /// Wraps an I/O error with the path it happened at.
    pub fn path_io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        FlatimgError::PathIo {
            path: path.into(),
            source,
        }
    }
}

impl ErrorKind {
    /// The process exit code for this category.
    pub fn exit_code(&self) -> u8 {
        match self {
            ErrorKind::Config => 2,
            ErrorKind::Format => 3,
            ErrorKind::Io => 4,
            ErrorKind::Conversion => 5,
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
