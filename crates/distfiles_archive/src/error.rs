//! Error types for the distfiles_archive crate

use std::path::PathBuf;

/// Result type for archive operations
pub type Result<T> = std::result::Result<T, ArchiveError>;

/// Error type for archive operations
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    /// I/O error while touching the destination filesystem
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream does not start with any supported compression magic
    #[error("unknown compression format")]
    UnknownFormat,

    /// An entry would be written, or would point, outside the destination
    #[error("unsafe path in archive: {path}: {reason}")]
    UnsafePath { path: PathBuf, reason: &'static str },

    /// The decoder or the tar framing failed
    #[error("corrupt archive: {message}")]
    CorruptArchive { message: String },
}

impl ArchiveError {
    /// Create a new unsafe path error
    pub fn unsafe_path(path: impl Into<PathBuf>, reason: &'static str) -> Self {
        Self::UnsafePath {
            path: path.into(),
            reason,
        }
    }

    /// Create a new corrupt archive error
    pub fn corrupt_archive(message: impl ToString) -> Self {
        Self::CorruptArchive {
            message: message.to_string(),
        }
    }
}
