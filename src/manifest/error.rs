//! Errors raised while loading and validating a build manifest.

use crate::classifier::SourceError;
use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors that can occur while reading, parsing, or validating a manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// The manifest file could not be read.
    #[error("failed to read build file {path}: {source}")]
    Read {
        /// Path of the manifest file.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The manifest is not valid YAML or does not match the schema.
    #[error("malformed build file: {source}")]
    Malformed {
        /// The underlying YAML error.
        #[source]
        source: serde_yaml_ng::Error,
    },

    /// The manifest could not be serialised.
    #[error("failed to serialise build file: {source}")]
    Serialize {
        /// The underlying YAML error.
        #[source]
        source: serde_yaml_ng::Error,
    },

    /// The manifest lists no policies.
    #[error("build file must list at least one policy")]
    EmptyPolicyList,

    /// A policy entry has no name.
    #[error("policy at index {index} is missing a name")]
    MissingName {
        /// Zero-based position of the entry.
        index: usize,
    },

    /// A local policy source path does not exist.
    #[error("policy at index {index} ('{name}'): local source {path} not found")]
    LocalSourceNotFound {
        /// Zero-based position of the entry.
        index: usize,
        /// Name of the entry.
        name: String,
        /// The resolved source path.
        path: Utf8PathBuf,
    },

    /// A local policy source path is not a directory.
    #[error("policy at index {index} ('{name}'): local source {path} must be a directory")]
    LocalSourceNotDirectory {
        /// Zero-based position of the entry.
        index: usize,
        /// Name of the entry.
        name: String,
        /// The resolved source path.
        path: Utf8PathBuf,
    },

    /// A local policy source failed layout validation.
    #[error("policy at index {index} ('{name}'): {source}")]
    LocalSourceInvalid {
        /// Zero-based position of the entry.
        index: usize,
        /// Name of the entry.
        name: String,
        /// The layout problem found in the source.
        #[source]
        source: SourceError,
    },
}

/// Result type alias using [`ManifestError`].
pub type Result<T> = std::result::Result<T, ManifestError>;
