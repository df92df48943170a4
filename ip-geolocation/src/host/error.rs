//! Host storage error types.

use std::path::PathBuf;

/// Errors that can occur when reading or writing device storage.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Reading or writing the backing file failed
    #[error("storage I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Backing file is not a flat JSON object of strings
    #[error("storage file {path:?} is malformed: {message}")]
    Malformed { path: PathBuf, message: String },
}
