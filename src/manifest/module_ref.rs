//! Module references of the form `module/path` or `module/path@version`.

use std::fmt;

/// A parsed module reference.
///
/// The reference is split on the first `@`; everything before it is the
/// module path and everything after it is the requested version.
///
/// # Examples
///
/// ```
/// use policy_builder::manifest::ModuleRef;
///
/// let module_ref = ModuleRef::parse("github.com/acme/ratelimit@v1.0.0");
/// assert_eq!(module_ref.path(), "github.com/acme/ratelimit");
/// assert_eq!(module_ref.version(), Some("v1.0.0"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModuleRef {
    raw: String,
    path: String,
    version: Option<String>,
}

impl ModuleRef {
    /// Parse a raw module reference.
    ///
    /// An empty version after `@` is treated as no version.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        let (path, version) = match raw.split_once('@') {
            Some((path, version)) => (
                path.to_owned(),
                Some(version.to_owned()).filter(|v| !v.is_empty()),
            ),
            None => (raw.to_owned(), None),
        };
        Self {
            raw: raw.to_owned(),
            path,
            version,
        }
    }

    /// Return the reference exactly as written.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Return the module path without any version suffix.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Return the requested version, if any.
    #[must_use]
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Whether `candidate_version` satisfies this reference.
    ///
    /// A reference without a version accepts anything. Otherwise both sides
    /// are compared literally after stripping one leading `v`.
    #[must_use]
    pub fn accepts_version(&self, candidate_version: &str) -> bool {
        self.version().is_none_or(|wanted| {
            strip_version_prefix(wanted) == strip_version_prefix(candidate_version)
        })
    }
}

impl fmt::Display for ModuleRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Strip a single leading `v` from a version string.
#[must_use]
pub fn strip_version_prefix(version: &str) -> &str {
    version.strip_prefix('v').unwrap_or(version)
}
