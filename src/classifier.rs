//! Local/remote classification and local source checks.
//!
//! An entry is local when it carries a `filePath`; every other entry is
//! remote and left to the build engine. Local sources must be directories
//! whose root holds a `policy-definition.yaml` naming the same policy as the
//! manifest entry. Archives are checked the same way once extracted into a
//! scratch directory.

use crate::POLICY_DEFINITION_FILE;
use crate::archive::{ArchiveError, ArchiveExtractor, ZipExtractor};
use crate::manifest::{BuildManifest, ManifestEntry};
use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Manifest entries split by origin, each group in manifest order.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Classified<'a> {
    /// Entries with a local `filePath`.
    pub local: Vec<&'a ManifestEntry>,
    /// Entries resolved by module reference or by name.
    pub remote: Vec<&'a ManifestEntry>,
}

/// Partition the manifest's entries into local and remote groups.
///
/// The partition is stable: relative order within each group matches the
/// manifest.
#[must_use]
pub fn classify(manifest: &BuildManifest) -> Classified<'_> {
    let (local, remote) = manifest
        .policies
        .iter()
        .partition(|entry| entry.is_local());
    Classified { local, remote }
}

/// The parts of `policy-definition.yaml` this crate reads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PolicyDefinition {
    /// Declared policy name.
    #[serde(default)]
    pub name: String,
    /// Declared policy version, if any.
    #[serde(default, deserialize_with = "crate::manifest::model::optional_scalar")]
    pub version: Option<String>,
}

/// Errors raised while checking a local policy source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The source path is missing or is not a directory.
    #[error("policy source {} is not a directory", path.display())]
    NotADirectory {
        /// The offending path.
        path: PathBuf,
    },

    /// The source has no definition file at its root.
    #[error("{POLICY_DEFINITION_FILE} not found at the root of {}", source_path.display())]
    DefinitionFileMissing {
        /// The policy source directory or archive.
        source_path: PathBuf,
    },

    /// The definition file exists but could not be read.
    #[error("failed to read {}: {source}", path.display())]
    DefinitionUnreadable {
        /// Path of the definition file.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The definition file is not valid YAML.
    #[error("failed to parse {POLICY_DEFINITION_FILE} in {}: {source}", source_path.display())]
    DefinitionUnparsable {
        /// The policy source directory or archive.
        source_path: PathBuf,
        /// The underlying YAML error.
        #[source]
        source: serde_yaml_ng::Error,
    },

    /// The definition file has no `name`.
    #[error("{POLICY_DEFINITION_FILE} in {} does not declare a name", source_path.display())]
    NameMissing {
        /// The policy source directory or archive.
        source_path: PathBuf,
    },

    /// The definition names a different policy than the manifest entry.
    #[error(
        "name mismatch: build file specifies '{expected}' but {POLICY_DEFINITION_FILE} contains '{actual}'"
    )]
    NameMismatch {
        /// Name from the manifest entry.
        expected: String,
        /// Name from the definition file.
        actual: String,
    },

    /// An archive source does not have a `.zip` extension.
    #[error("policy archive {} must be a .zip file", path.display())]
    NotAnArchive {
        /// The offending path.
        path: PathBuf,
    },

    /// The scratch directory for archive extraction could not be created.
    #[error("failed to create scratch directory: {source}")]
    Scratch {
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Extracting the archive failed.
    #[error("failed to extract policy archive: {0}")]
    Archive(#[from] ArchiveError),
}

/// Check that `path` is a policy source directory named `expected_name`.
///
/// An empty `expected_name` skips the name comparison. Nothing is written.
///
/// # Errors
///
/// Returns the first [`SourceError`] found.
pub fn validate_local_source(path: &Path, expected_name: &str) -> Result<PolicyDefinition, SourceError> {
    let is_dir = fs::metadata(path).is_ok_and(|metadata| metadata.is_dir());
    if !is_dir {
        return Err(SourceError::NotADirectory {
            path: path.to_path_buf(),
        });
    }
    read_definition(path, path, expected_name)
}

/// Check that the zip at `zip_path` holds a policy named `expected_name`.
///
/// The archive root must contain `policy-definition.yaml` directly; an
/// archive that wraps the policy in a single folder is rejected.
///
/// # Errors
///
/// Returns [`SourceError::NotAnArchive`] for paths without a `.zip`
/// extension, [`SourceError::Archive`] if extraction fails, or any of the
/// definition errors from [`validate_local_source`].
pub fn validate_local_archive(
    zip_path: &Path,
    expected_name: &str,
) -> Result<PolicyDefinition, SourceError> {
    validate_local_archive_with(&ZipExtractor, zip_path, expected_name)
}

/// [`validate_local_archive`] with an injected extractor.
///
/// # Errors
///
/// See [`validate_local_archive`].
pub fn validate_local_archive_with(
    extractor: &dyn ArchiveExtractor,
    zip_path: &Path,
    expected_name: &str,
) -> Result<PolicyDefinition, SourceError> {
    let is_zip = zip_path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"));
    if !is_zip {
        return Err(SourceError::NotAnArchive {
            path: zip_path.to_path_buf(),
        });
    }

    // Dropping the guard removes the scratch tree on every path.
    let scratch = tempfile::Builder::new()
        .prefix("policy-archive-")
        .tempdir()
        .map_err(|source| SourceError::Scratch { source })?;
    extractor.extract(zip_path, scratch.path())?;
    read_definition(scratch.path(), zip_path, expected_name)
}

/// Read and check the definition at the root of `root`.
///
/// `reported` is the path named in errors, which differs from `root` when
/// `root` is a scratch extraction.
fn read_definition(
    root: &Path,
    reported: &Path,
    expected_name: &str,
) -> Result<PolicyDefinition, SourceError> {
    let definition_path = root.join(POLICY_DEFINITION_FILE);
    let bytes = fs::read(&definition_path).map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            SourceError::DefinitionFileMissing {
                source_path: reported.to_path_buf(),
            }
        } else {
            SourceError::DefinitionUnreadable {
                path: definition_path.clone(),
                source,
            }
        }
    })?;

    let definition: PolicyDefinition =
        serde_yaml_ng::from_slice(&bytes).map_err(|source| SourceError::DefinitionUnparsable {
            source_path: reported.to_path_buf(),
            source,
        })?;

    let actual = definition.name.trim();
    if actual.is_empty() {
        return Err(SourceError::NameMissing {
            source_path: reported.to_path_buf(),
        });
    }
    if !expected_name.is_empty() && actual != expected_name {
        return Err(SourceError::NameMismatch {
            expected: expected_name.to_owned(),
            actual: actual.to_owned(),
        });
    }

    log::debug!("validated policy '{actual}' at {}", reported.display());
    Ok(definition)
}

#[cfg(test)]
#[path = "classifier_tests.rs"]
mod tests;
