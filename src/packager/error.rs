//! Packager error types.
//!
//! The `Display` text of [`ResolveError`] is the detail string sent to clients.

/// Errors raised while mapping a module name to a location on disk.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    /// No module with this name exists (or the name is not a valid module name).
    #[error("Module '{0}' not found")]
    NotFound(String),

    /// The module exists but has neither a package directory nor a source file.
    #[error("Cannot determine path for module '{0}'")]
    Undeterminable(String),
}

/// Errors raised while compiling a source file.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    /// The interpreter process could not be started.
    #[error("failed to start interpreter '{interpreter}': {source}")]
    Spawn {
        interpreter: String,
        source: std::io::Error,
    },

    /// The interpreter ran but rejected the source.
    #[error("compiler exited with {status}: {message}")]
    Failed { status: String, message: String },

    /// The interpreter rejected this file (syntax error etc.) while compiling a batch.
    #[error("{0}")]
    Rejected(String),

    /// The batch run carrying this file failed as a whole.
    #[error("batch compile failed: {0}")]
    Batch(String),

    /// The interpreter exited successfully without writing any bytecode.
    #[error("compiler produced no output")]
    EmptyOutput,

    /// Filesystem I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that prevent an archive from being produced at all.
#[derive(Debug, thiserror::Error)]
pub enum PackageError {
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The blocking build task panicked or was cancelled.
    #[error("archive task failed: {0}")]
    Task(String),
}
