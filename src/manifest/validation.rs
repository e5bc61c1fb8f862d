//! Manifest validation rules.
//!
//! Both passes fail fast on the first offending entry, in manifest order.

use super::error::{ManifestError, Result};
use super::model::BuildManifest;
use crate::classifier::{PolicyDefinition, validate_local_source};
use camino::Utf8Path;
use std::fs;

/// Check the manifest's structure and that local sources are directories.
///
/// Relative `filePath` values are resolved against `manifest_dir`. Archive
/// files are rejected here; only directories are valid local sources.
///
/// # Errors
///
/// Returns [`ManifestError::EmptyPolicyList`], [`ManifestError::MissingName`],
/// [`ManifestError::LocalSourceNotFound`], or
/// [`ManifestError::LocalSourceNotDirectory`] for the first failing entry.
pub fn validate(manifest: &BuildManifest, manifest_dir: &Utf8Path) -> Result<()> {
    if manifest.policies.is_empty() {
        return Err(ManifestError::EmptyPolicyList);
    }

    for (index, entry) in manifest.policies.iter().enumerate() {
        if entry.name.trim().is_empty() {
            return Err(ManifestError::MissingName { index });
        }

        let Some(path) = entry.source.resolve_local(manifest_dir) else {
            continue;
        };
        let metadata = fs::metadata(&path).map_err(|_| ManifestError::LocalSourceNotFound {
            index,
            name: entry.name.clone(),
            path: path.clone(),
        })?;
        if !metadata.is_dir() {
            return Err(ManifestError::LocalSourceNotDirectory {
                index,
                name: entry.name.clone(),
                path,
            });
        }
        log::debug!("policy '{}' uses local source {path}", entry.name);
    }

    Ok(())
}

/// Check the layout and definition of every local source.
///
/// Returns the parsed definitions of the local entries in manifest order.
///
/// # Errors
///
/// Returns [`ManifestError::LocalSourceInvalid`] for the first source whose
/// layout or definition is wrong.
pub fn validate_local_sources(
    manifest: &BuildManifest,
    manifest_dir: &Utf8Path,
) -> Result<Vec<PolicyDefinition>> {
    manifest
        .local_entries()
        .filter_map(|(index, entry)| {
            entry
                .source
                .resolve_local(manifest_dir)
                .map(|path| (index, entry, path))
        })
        .map(|(index, entry, path)| {
            validate_local_source(path.as_std_path(), &entry.name).map_err(|source| {
                ManifestError::LocalSourceInvalid {
                    index,
                    name: entry.name.clone(),
                    source,
                }
            })
        })
        .collect()
}
