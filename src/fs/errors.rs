//! Filesystem error type

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Result type for filesystem primitives
pub type FsResult<T> = Result<T, FsError>;

/// A failed filesystem operation, with the operation name and the path it
/// was applied to.
#[derive(Debug, Error)]
#[error("{op} failed for {}: {source}", .path.display())]
pub struct FsError {
    op: &'static str,
    path: PathBuf,
    #[source]
    source: io::Error,
}

impl FsError {
    /// Create a new filesystem error
    pub fn new(op: &'static str, path: impl AsRef<Path>, source: io::Error) -> Self {
        Self {
            op,
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Name of the primitive that failed (e.g. `"create_file"`)
    pub fn op(&self) -> &'static str {
        self.op
    }

    /// Path the primitive was applied to
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Kind of the underlying I/O error
    pub fn kind(&self) -> io::ErrorKind {
        self.source.kind()
    }
}
