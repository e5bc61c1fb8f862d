//! Typed build manifest.
//!
//! The YAML schema carries a policy's origin as two optional keys,
//! `filePath` and `gomodule`. Deserialisation folds them into a single
//! [`PolicySource`] and rejects entries that set both, so the rest of the
//! crate never has to re-check that rule.

use super::error::{ManifestError, Result};
use super::module_ref::ModuleRef;
use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use std::fs;

/// A parsed build manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawManifest", into = "RawManifest")]
pub struct BuildManifest {
    /// Manifest format or gateway platform version.
    pub version: String,
    /// Manifest-wide version resolution hint, carried through unchanged.
    pub version_resolution: Option<String>,
    /// Optional gateway image settings.
    pub gateway: Option<GatewaySection>,
    /// Policy entries in declaration order.
    pub policies: Vec<ManifestEntry>,
}

/// Gateway settings used when assembling build parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewaySection {
    /// Gateway platform version used to template default image names.
    #[serde(
        default,
        deserialize_with = "optional_scalar",
        skip_serializing_if = "Option::is_none"
    )]
    pub version: Option<String>,
    /// Per-image overrides.
    #[serde(default, skip_serializing_if = "GatewayImages::is_empty")]
    pub images: GatewayImages,
}

/// Base image overrides for the three gateway images.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayImages {
    /// Builder image reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub builder: Option<String>,
    /// Controller image reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller: Option<String>,
    /// Runtime image reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime: Option<String>,
}

impl GatewayImages {
    fn is_empty(&self) -> bool {
        self.builder.is_none() && self.controller.is_none() && self.runtime.is_none()
    }
}

/// One policy listed in the manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    /// Logical policy name. Duplicates across entries are allowed.
    pub name: String,
    /// Requested version, if any.
    pub version: Option<String>,
    /// Per-entry version resolution hint, carried through unchanged.
    pub version_resolution: Option<String>,
    /// Where the policy comes from.
    pub source: PolicySource,
}

impl ManifestEntry {
    /// Whether this entry is sourced from the local filesystem.
    #[must_use]
    pub fn is_local(&self) -> bool {
        matches!(self.source, PolicySource::Local { .. })
    }
}

/// Origin of a policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicySource {
    /// A directory on the local filesystem.
    Local {
        /// The path as written, absolute or relative to the manifest directory.
        file_path: String,
    },
    /// A module reference resolved by the build engine.
    Module {
        /// The parsed reference.
        module_ref: ModuleRef,
    },
    /// Neither path nor module; resolved by name alone.
    Named,
}

impl PolicySource {
    /// Return the local path as written, if this is a local source.
    #[must_use]
    pub fn file_path(&self) -> Option<&str> {
        match self {
            Self::Local { file_path } => Some(file_path),
            _ => None,
        }
    }

    /// Return the module reference, if this is a module source.
    #[must_use]
    pub fn module_ref(&self) -> Option<&ModuleRef> {
        match self {
            Self::Module { module_ref } => Some(module_ref),
            _ => None,
        }
    }

    /// Resolve a local path against `manifest_dir`.
    ///
    /// Absolute paths are not joined. The result is lexically cleaned but
    /// symbolic links are not resolved.
    #[must_use]
    pub fn resolve_local(&self, manifest_dir: &Utf8Path) -> Option<Utf8PathBuf> {
        self.file_path()
            .map(|file_path| resolve_against(manifest_dir, file_path))
    }
}

/// Resolve `file_path` against `base` unless it is already absolute.
#[must_use]
pub fn resolve_against(base: &Utf8Path, file_path: &str) -> Utf8PathBuf {
    let path = Utf8Path::new(file_path);
    if path.is_absolute() {
        clean_path(path)
    } else {
        clean_path(&base.join(path))
    }
}

/// Normalise `path` without touching the filesystem.
///
/// `.` segments are dropped and `..` removes the preceding segment. A `..`
/// directly under the root is dropped; leading `..` segments of a relative
/// path are kept.
///
/// # Examples
///
/// ```
/// use camino::Utf8Path;
/// use policy_builder::manifest::clean_path;
///
/// assert_eq!(clean_path(Utf8Path::new("./a/b/../c/")), "a/c");
/// assert_eq!(clean_path(Utf8Path::new("../x/./y")), "../x/y");
/// assert_eq!(clean_path(Utf8Path::new("/../etc")), "/etc");
/// ```
#[must_use]
pub fn clean_path(path: &Utf8Path) -> Utf8PathBuf {
    let mut cleaned = Utf8PathBuf::new();
    for component in path.components() {
        match component {
            Utf8Component::CurDir => {}
            Utf8Component::ParentDir => {
                let last = cleaned.components().next_back();
                match last {
                    Some(Utf8Component::Normal(_)) => {
                        cleaned.pop();
                    }
                    Some(Utf8Component::RootDir | Utf8Component::Prefix(_)) => {}
                    _ => cleaned.push(".."),
                }
            }
            other => cleaned.push(other),
        }
    }
    if cleaned.as_str().is_empty() {
        cleaned.push(".");
    }
    cleaned
}

/// Directory that relative `filePath` values are resolved against.
#[must_use]
pub fn manifest_dir(manifest_path: &Utf8Path) -> Utf8PathBuf {
    manifest_path
        .parent()
        .filter(|parent| !parent.as_str().is_empty())
        .map_or_else(|| Utf8PathBuf::from("."), Utf8Path::to_path_buf)
}

impl BuildManifest {
    /// Parse a manifest from YAML bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::Malformed`] if the YAML is invalid or an
    /// entry sets both `filePath` and `gomodule`.
    ///
    /// # Examples
    ///
    /// ```
    /// use policy_builder::manifest::BuildManifest;
    ///
    /// let yaml = b"version: 1.0.0\npolicies:\n  - name: cors\n    gomodule: github.com/acme/cors@v1.2.0\n";
    /// let manifest = BuildManifest::parse(yaml).expect("valid manifest");
    /// assert_eq!(manifest.policies.len(), 1);
    /// assert!(!manifest.policies[0].is_local());
    /// ```
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        serde_yaml_ng::from_slice(bytes).map_err(|source| ManifestError::Malformed { source })
    }

    /// Read and parse the manifest at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::Read`] if the file cannot be read, or
    /// [`ManifestError::Malformed`] if it cannot be parsed.
    pub fn load(path: &Utf8Path) -> Result<Self> {
        let bytes = fs::read(path).map_err(|source| ManifestError::Read {
            path: path.to_owned(),
            source,
        })?;
        Self::parse(&bytes)
    }

    /// Serialise the manifest back to YAML.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::Serialize`] if serialisation fails.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml_ng::to_string(self).map_err(|source| ManifestError::Serialize { source })
    }

    /// Iterate over local entries with their manifest indices.
    pub fn local_entries(&self) -> impl Iterator<Item = (usize, &ManifestEntry)> {
        self.policies
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.is_local())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawManifest {
    #[serde(default, deserialize_with = "scalar")]
    version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    version_resolution: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    gateway: Option<GatewaySection>,
    #[serde(default)]
    policies: Vec<RawEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEntry {
    #[serde(default)]
    name: String,
    #[serde(
        default,
        deserialize_with = "optional_scalar",
        skip_serializing_if = "Option::is_none"
    )]
    version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    version_resolution: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    file_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    gomodule: Option<String>,
}

/// Accept any YAML scalar as a string, so `version: 1` reads as `"1"`.
pub(crate) fn optional_scalar<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde_yaml_ng::Value;

    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) => Ok(Some(text)),
        Some(Value::Number(number)) => Ok(Some(number.to_string())),
        Some(Value::Bool(flag)) => Ok(Some(flag.to_string())),
        Some(_) => Err(D::Error::custom("expected a scalar version string")),
    }
}

pub(crate) fn scalar<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(optional_scalar(deserializer)?.unwrap_or_default())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl TryFrom<RawManifest> for BuildManifest {
    type Error = String;

    fn try_from(raw: RawManifest) -> std::result::Result<Self, Self::Error> {
        let policies = raw
            .policies
            .into_iter()
            .enumerate()
            .map(|(index, entry)| {
                let name = entry.name.clone();
                ManifestEntry::try_from(entry).map_err(|reason| {
                    format!("policy at index {index} ('{name}'): {reason}")
                })
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Self {
            version: raw.version,
            version_resolution: non_empty(raw.version_resolution),
            gateway: raw.gateway,
            policies,
        })
    }
}

impl TryFrom<RawEntry> for ManifestEntry {
    type Error = String;

    fn try_from(raw: RawEntry) -> std::result::Result<Self, Self::Error> {
        let source = match (non_empty(raw.file_path), non_empty(raw.gomodule)) {
            (Some(_), Some(_)) => {
                return Err("exactly one of filePath or gomodule may be set".to_owned());
            }
            (Some(file_path), None) => PolicySource::Local { file_path },
            (None, Some(module)) => PolicySource::Module {
                module_ref: ModuleRef::parse(&module),
            },
            (None, None) => PolicySource::Named,
        };
        Ok(Self {
            name: raw.name,
            version: non_empty(raw.version),
            version_resolution: non_empty(raw.version_resolution),
            source,
        })
    }
}

impl From<BuildManifest> for RawManifest {
    fn from(manifest: BuildManifest) -> Self {
        Self {
            version: manifest.version,
            version_resolution: manifest.version_resolution,
            gateway: manifest.gateway,
            policies: manifest.policies.into_iter().map(RawEntry::from).collect(),
        }
    }
}

impl From<ManifestEntry> for RawEntry {
    fn from(entry: ManifestEntry) -> Self {
        let (file_path, gomodule) = match entry.source {
            PolicySource::Local { file_path } => (Some(file_path), None),
            PolicySource::Module { module_ref } => (None, Some(module_ref.raw().to_owned())),
            PolicySource::Named => (None, None),
        };
        Self {
            name: entry.name,
            version: entry.version,
            version_resolution: entry.version_resolution,
            file_path,
            gomodule,
        }
    }
}

#[cfg(test)]
#[path = "model_tests.rs"]
mod tests;
