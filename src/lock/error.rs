//! Errors raised by lock resolution and lock file I/O.

use crate::manifest::ManifestError;
use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors that can occur while resolving or persisting a lock file.
#[derive(Debug, Error)]
pub enum LockError {
    /// No discovered candidate could be selected for a manifest entry.
    #[error("failed to determine version for policy '{name}'")]
    UnresolvedEntry {
        /// Name of the unresolved entry.
        name: String,
    },

    /// The source manifest could not be loaded.
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    /// A lock file could not be read.
    #[error("failed to read lock file {path}: {source}")]
    Read {
        /// Path of the lock file.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A lock file is not valid YAML or does not match the schema.
    #[error("malformed lock file {path}: {source}")]
    Parse {
        /// Path of the lock file.
        path: Utf8PathBuf,
        /// The underlying YAML error.
        #[source]
        source: serde_yaml_ng::Error,
    },

    /// The lock file could not be serialised.
    #[error("failed to serialise lock file: {source}")]
    Serialize {
        /// The underlying YAML error.
        #[source]
        source: serde_yaml_ng::Error,
    },

    /// Writing the lock file failed.
    #[error("failed to {operation} {path}: {source}")]
    Write {
        /// The operation that was attempted.
        operation: &'static str,
        /// The path the operation was attempted on.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias using [`LockError`].
pub type Result<T> = std::result::Result<T, LockError>;
