//! Candidate discovery for lock resolution.
//!
//! The lock resolver only consumes a list of [`DiscoveredCandidate`]s. Where
//! that list comes from is behind the [`PolicyDiscovery`] trait; the default
//! [`DefinitionScanner`] walks directory trees for policy definitions.

use crate::POLICY_DEFINITION_FILE;
use crate::classifier::PolicyDefinition;
use crate::lock::module_descriptor::MODULE_DESCRIPTOR_FILE;
use camino::{Utf8Path, Utf8PathBuf};
use std::collections::BTreeSet;
use std::fs;
use thiserror::Error;
use walkdir::{DirEntry, WalkDir};

/// A concrete, versioned policy found on disk or in a module cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredCandidate {
    /// Declared policy name.
    pub name: String,
    /// Declared policy version.
    pub version: String,
    /// Location of the policy root, or an opaque identifier.
    pub path: Utf8PathBuf,
    /// The candidate's own module descriptor, if it has one.
    pub module_descriptor: Option<Utf8PathBuf>,
}

/// Directories a discovery pass should search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryScope {
    roots: Vec<Utf8PathBuf>,
}

impl DiscoveryScope {
    /// Create an empty scope.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a root directory, ignoring duplicates.
    #[must_use]
    pub fn with_root(mut self, root: impl Into<Utf8PathBuf>) -> Self {
        let root = root.into();
        if !self.roots.contains(&root) {
            self.roots.push(root);
        }
        self
    }

    /// Return the roots in insertion order.
    #[must_use]
    pub fn roots(&self) -> &[Utf8PathBuf] {
        &self.roots
    }
}

/// Errors that can occur during discovery.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// A search root could not be walked.
    #[error("failed to scan {root}: {source}")]
    Walk {
        /// The search root.
        root: Utf8PathBuf,
        /// The underlying walk error.
        #[source]
        source: walkdir::Error,
    },
}

/// Produces lock candidates for a scope.
#[cfg_attr(test, mockall::automock)]
pub trait PolicyDiscovery {
    /// Return every candidate found in `scope`.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError`] if the scope cannot be searched.
    fn discover(&self, scope: &DiscoveryScope) -> Result<Vec<DiscoveredCandidate>, DiscoveryError>;
}

/// Finds candidates by walking for `policy-definition.yaml` files.
///
/// Each definition with both a name and a version yields one candidate
/// rooted at the definition's directory. A sibling `go.mod` is recorded as
/// the module descriptor. Hidden directories are not entered, symbolic
/// links are not followed and paths that are not UTF-8 are skipped.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefinitionScanner;

impl PolicyDiscovery for DefinitionScanner {
    fn discover(&self, scope: &DiscoveryScope) -> Result<Vec<DiscoveredCandidate>, DiscoveryError> {
        let mut seen = BTreeSet::new();
        let mut candidates = Vec::new();

        for root in scope.roots() {
            if !root.exists() {
                log::debug!("skipping missing discovery root {root}");
                continue;
            }
            let walker = WalkDir::new(root)
                .follow_links(false)
                .sort_by_file_name()
                .into_iter()
                .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry));

            for item in walker {
                let item = item.map_err(|source| DiscoveryError::Walk {
                    root: root.clone(),
                    source,
                })?;
                if !item.file_type().is_file() || item.file_name() != POLICY_DEFINITION_FILE {
                    continue;
                }
                let Some(definition_path) = Utf8Path::from_path(item.path()) else {
                    log::warn!("skipping non-UTF-8 path {}", item.path().display());
                    continue;
                };
                let Some(candidate) = candidate_from_definition(definition_path) else {
                    continue;
                };
                if seen.insert(candidate.path.clone()) {
                    candidates.push(candidate);
                }
            }
        }

        log::info!("discovered {} policy candidate(s)", candidates.len());
        Ok(candidates)
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_string_lossy().starts_with('.')
}

fn candidate_from_definition(definition_path: &Utf8Path) -> Option<DiscoveredCandidate> {
    let root = definition_path.parent()?;
    let definition = match read_definition(definition_path) {
        Ok(definition) => definition,
        Err(reason) => {
            log::warn!("ignoring {definition_path}: {reason}");
            return None;
        }
    };

    let name = definition.name.trim();
    let Some(version) = definition.version.as_deref().map(str::trim).filter(|v| !v.is_empty())
    else {
        log::debug!("ignoring unversioned policy definition {definition_path}");
        return None;
    };
    if name.is_empty() {
        log::debug!("ignoring unnamed policy definition {definition_path}");
        return None;
    }

    let descriptor = root.join(MODULE_DESCRIPTOR_FILE);
    Some(DiscoveredCandidate {
        name: name.to_owned(),
        version: version.to_owned(),
        path: root.to_owned(),
        module_descriptor: descriptor.is_file().then_some(descriptor),
    })
}

fn read_definition(path: &Utf8Path) -> Result<PolicyDefinition, String> {
    let bytes = fs::read(path).map_err(|err| err.to_string())?;
    serde_yaml_ng::from_slice(&bytes).map_err(|err| err.to_string())
}
