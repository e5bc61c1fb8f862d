//! Error types for archive and filesystem operations.
//!
//! Every I/O failure is wrapped with the operation that was attempted and the
//! path it was attempted on, so the operator can tell which file broke a
//! staging or packaging run.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors arising from zip, unzip, checksum, and copy operations.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// A filesystem operation failed.
    #[error("failed to {operation} {}: {source}", path.display())]
    Io {
        /// The operation that was attempted (for example "create directory").
        operation: &'static str,
        /// The path the operation was attempted on.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The zip container could not be read or written.
    #[error("zip error for {}: {source}", path.display())]
    Zip {
        /// Path of the archive being read or written.
        path: PathBuf,
        /// The underlying zip error.
        #[source]
        source: zip::result::ZipError,
    },

    /// An entry in the archive would be written outside the destination.
    #[error("illegal file path in archive: {entry} escapes the destination directory")]
    PathTraversal {
        /// The offending entry name as stored in the archive.
        entry: String,
    },

    /// Walking the source directory failed.
    #[error("failed to walk {}: {source}", path.display())]
    Walk {
        /// Root of the walk.
        path: PathBuf,
        /// The underlying walk error.
        #[source]
        source: walkdir::Error,
    },

    /// A checksum string was not of the form `sha256:<hex>`.
    #[error("invalid checksum \"{value}\": {reason}")]
    InvalidChecksum {
        /// The rejected checksum string.
        value: String,
        /// Description of the validation failure.
        reason: String,
    },
}

impl ArchiveError {
    /// Build a closure that wraps an I/O error with an operation and path.
    pub(crate) fn io(operation: &'static str, path: &Path) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.to_path_buf();
        move |source| Self::Io {
            operation,
            path,
            source,
        }
    }

    /// Build a closure that wraps a zip error with the archive path.
    pub(crate) fn zip(path: &Path) -> impl FnOnce(zip::result::ZipError) -> Self {
        let path = path.to_path_buf();
        move |source| Self::Zip { path, source }
    }
}

/// Result type alias using [`ArchiveError`].
pub type Result<T> = std::result::Result<T, ArchiveError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_names_operation_and_path() {
        let err = ArchiveError::io("create directory", Path::new("/tmp/ws/policies"))(
            std::io::Error::other("disk full"),
        );
        let msg = err.to_string();
        assert!(msg.contains("create directory"));
        assert!(msg.contains("/tmp/ws/policies"));
        assert!(msg.contains("disk full"));
    }

    #[test]
    fn path_traversal_names_entry() {
        let err = ArchiveError::PathTraversal {
            entry: "../../evil".to_owned(),
        };
        assert!(err.to_string().contains("../../evil"));
    }
}
