//! Lock file model and YAML I/O.

use super::error::{LockError, Result};
use crate::manifest::model::scalar;
use serde::{Deserialize, Serialize};
use camino::Utf8Path;
use std::fs;

/// A lock file pinning every manifest entry to one version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockFile {
    /// Version copied from the manifest.
    #[serde(default, deserialize_with = "scalar")]
    pub version: String,
    /// One entry per manifest entry, in manifest order.
    #[serde(default)]
    pub policies: Vec<LockEntry>,
}

/// A pinned manifest entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockEntry {
    /// Policy name.
    pub name: String,
    /// Concrete version of the selected candidate.
    #[serde(deserialize_with = "scalar")]
    pub version: String,
    /// Local path copied from the manifest entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    /// Module reference copied from the manifest entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gomodule: Option<String>,
}

impl LockFile {
    /// Parse a lock file from YAML bytes.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::Parse`] if the YAML is invalid or an entry has
    /// no version.
    pub fn parse(bytes: &[u8], origin: &Utf8Path) -> Result<Self> {
        serde_yaml_ng::from_slice(bytes).map_err(|source| LockError::Parse {
            path: origin.to_owned(),
            source,
        })
    }

    /// Read and parse the lock file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::Read`] or [`LockError::Parse`].
    pub fn load(path: &Utf8Path) -> Result<Self> {
        let bytes = fs::read(path).map_err(|source| LockError::Read {
            path: path.to_owned(),
            source,
        })?;
        Self::parse(&bytes, path)
    }

    /// Serialise the lock file to YAML.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::Serialize`] if serialisation fails.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml_ng::to_string(self).map_err(|source| LockError::Serialize { source })
    }

    /// Find the pinned entry for `name`, if any.
    #[must_use]
    pub fn entry(&self, name: &str) -> Option<&LockEntry> {
        self.policies.iter().find(|entry| entry.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;

    const LOCK_YAML: &str = "version: v1.0.0\npolicies:\n  - name: ratelimit\n    version: v1.0.0\n    filePath: ./policies/ratelimit\n  - name: cors\n    version: 1.2.0\n    gomodule: github.com/acme/cors@1.2.0\n";

    #[test]
    fn parses_lock_entries() {
        let lock = LockFile::parse(LOCK_YAML.as_bytes(), Utf8Path::new("build-lock.yaml"))
            .expect("valid lock");
        assert_eq!(lock.version, "v1.0.0");
        assert_eq!(lock.policies.len(), 2);
        let cors = lock.entry("cors").expect("cors entry");
        assert_eq!(cors.version, "1.2.0");
        assert_eq!(cors.gomodule.as_deref(), Some("github.com/acme/cors@1.2.0"));
        assert!(cors.file_path.is_none());
    }

    #[test]
    fn entry_without_version_is_rejected() {
        let err = LockFile::parse(
            b"version: v1\npolicies:\n  - name: ratelimit\n",
            Utf8Path::new("build-lock.yaml"),
        )
        .expect_err("version required");
        assert!(matches!(err, LockError::Parse { .. }));
    }

    #[test]
    fn serialises_schema_keys_and_omits_absent_fields() {
        let lock = LockFile::parse(LOCK_YAML.as_bytes(), Utf8Path::new("build-lock.yaml"))
            .expect("valid lock");
        let yaml = lock.to_yaml().expect("serialise");
        assert!(yaml.contains("filePath: ./policies/ratelimit"), "{yaml}");
        assert_eq!(yaml.matches("gomodule").count(), 1, "{yaml}");
        assert_eq!(
            LockFile::parse(yaml.as_bytes(), Utf8Path::new("x")).expect("reparse"),
            lock
        );
    }

    #[test]
    fn load_reports_missing_file() {
        let temp = tempfile::TempDir::new().expect("temp dir");
        let root = Utf8PathBuf::try_from(temp.path().to_owned()).expect("non-UTF8 temp path");
        let path = root.join("build-lock.yaml");
        assert!(matches!(LockFile::load(&path), Err(LockError::Read { .. })));
    }
}
