//! Version lock resolution.
//!
//! Each manifest entry is matched against the discovered candidates in a
//! fixed order:
//!
//! 1. exactly one candidate with the entry's name;
//! 2. for local entries, the candidate whose path is the entry's path;
//! 3. for module entries, the candidate whose descriptor declares the
//!    referenced module at an acceptable version, and failing that the
//!    candidate whose path is literally the raw reference.
//!
//! The first entry that matches nothing aborts resolution.

use super::error::{LockError, Result};
use super::model::{LockEntry, LockFile};
use super::module_descriptor::read_module_path;
use crate::LOCK_FILE_NAME;
use crate::discovery::DiscoveredCandidate;
use crate::manifest::{
    BuildManifest, ManifestEntry, ModuleRef, PolicySource, clean_path, manifest_dir,
    resolve_against,
};
use camino::{Utf8Path, Utf8PathBuf};
use std::io::Write;

/// Resolve every entry of the manifest at `manifest_path`.
///
/// # Errors
///
/// Returns [`LockError::Manifest`] if the manifest cannot be loaded, or
/// [`LockError::UnresolvedEntry`] for the first entry no rule can resolve.
pub fn resolve_locks(
    manifest_path: &Utf8Path,
    candidates: &[DiscoveredCandidate],
) -> Result<LockFile> {
    let manifest = BuildManifest::load(manifest_path)?;
    resolve_manifest(&manifest, &manifest_dir(manifest_path), candidates)
}

/// Resolve every entry of an already loaded manifest.
///
/// Relative local paths are resolved against `manifest_dir`.
///
/// # Errors
///
/// Returns [`LockError::UnresolvedEntry`] for the first entry no rule can
/// resolve.
pub fn resolve_manifest(
    manifest: &BuildManifest,
    manifest_dir: &Utf8Path,
    candidates: &[DiscoveredCandidate],
) -> Result<LockFile> {
    let policies = manifest
        .policies
        .iter()
        .map(|entry| {
            let candidate = select_candidate(entry, manifest_dir, candidates).ok_or_else(|| {
                LockError::UnresolvedEntry {
                    name: entry.name.clone(),
                }
            })?;
            log::debug!(
                "locked policy '{}' to {} from {}",
                entry.name,
                candidate.version,
                candidate.path
            );
            Ok(lock_entry(entry, candidate))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(LockFile {
        version: manifest.version.clone(),
        policies,
    })
}

fn lock_entry(entry: &ManifestEntry, candidate: &DiscoveredCandidate) -> LockEntry {
    LockEntry {
        name: entry.name.clone(),
        version: candidate.version.clone(),
        file_path: entry.source.file_path().map(str::to_owned),
        gomodule: entry.source.module_ref().map(|m| m.raw().to_owned()),
    }
}

fn select_candidate<'a>(
    entry: &ManifestEntry,
    manifest_dir: &Utf8Path,
    candidates: &'a [DiscoveredCandidate],
) -> Option<&'a DiscoveredCandidate> {
    let named: Vec<&DiscoveredCandidate> = candidates
        .iter()
        .filter(|candidate| candidate.name == entry.name)
        .collect();

    if let [only] = named.as_slice() {
        return Some(*only);
    }

    match &entry.source {
        PolicySource::Local { file_path } => {
            let wanted = comparable_path(&resolve_against(manifest_dir, file_path));
            named
                .into_iter()
                .find(|candidate| comparable_path(&candidate.path) == wanted)
        }
        PolicySource::Module { module_ref } => match_module(module_ref, &named),
        PolicySource::Named => None,
    }
}

fn match_module<'a>(
    module_ref: &ModuleRef,
    named: &[&'a DiscoveredCandidate],
) -> Option<&'a DiscoveredCandidate> {
    let declared = named.iter().copied().find(|candidate| {
        candidate
            .module_descriptor
            .as_deref()
            .and_then(read_module_path)
            .is_some_and(|path| path == module_ref.path())
            && module_ref.accepts_version(&candidate.version)
    });

    declared.or_else(|| {
        named
            .iter()
            .copied()
            .find(|candidate| candidate.path.as_str() == module_ref.raw())
    })
}

/// Make a path comparable: absolute, canonical when it exists, and
/// lexically normalised otherwise.
fn comparable_path(path: &Utf8Path) -> Utf8PathBuf {
    let absolute = std::path::absolute(path)
        .ok()
        .and_then(|absolute| Utf8PathBuf::from_path_buf(absolute).ok())
        .unwrap_or_else(|| path.to_owned());
    absolute
        .canonicalize_utf8()
        .unwrap_or_else(|_| clean_path(&absolute))
}

/// Write `lock` as `build-lock.yaml` beside the manifest at `manifest_path`.
///
/// The file is written to a temporary file in the same directory and then
/// renamed over the destination, so readers never see a partial lock file.
///
/// # Errors
///
/// Returns [`LockError::Serialize`] or [`LockError::Write`].
pub fn write_lock_file(manifest_path: &Utf8Path, lock: &LockFile) -> Result<Utf8PathBuf> {
    let dir = manifest_dir(manifest_path);
    let target = dir.join(LOCK_FILE_NAME);
    let yaml = lock.to_yaml()?;

    let mut temp = tempfile::Builder::new()
        .prefix(".build-lock-")
        .suffix(".yaml")
        .tempfile_in(&dir)
        .map_err(write_error("create temporary file in", &dir))?;
    temp.write_all(yaml.as_bytes())
        .map_err(write_error("write", &target))?;
    temp.as_file()
        .sync_all()
        .map_err(write_error("sync", &target))?;
    temp.persist(&target)
        .map_err(|err| write_error("replace", &target)(err.error))?;

    log::info!("wrote lock file {target}");
    Ok(target)
}

fn write_error(
    operation: &'static str,
    path: &Utf8Path,
) -> impl FnOnce(std::io::Error) -> LockError {
    let path = path.to_owned();
    move |source| LockError::Write {
        operation,
        path,
        source,
    }
}

#[cfg(test)]
#[path = "resolver_tests.rs"]
mod tests;
