//! Deterministic file names for packaged policy archives.
//!
//! A packaged policy is named `<kebab-name>-<version>.zip`, so the same
//! policy name and version always produce the same archive name.

use std::fmt;

/// The fixed file extension for policy archives.
const ARCHIVE_EXTENSION: &str = ".zip";

/// Convert a policy name to lowercase kebab case.
///
/// Spaces and underscores become hyphens, a hyphen is inserted before an
/// uppercase letter that follows a lowercase letter or digit, and runs of
/// hyphens collapse to one.
///
/// # Examples
///
/// ```
/// use policy_builder::archive::to_kebab_case;
///
/// assert_eq!(to_kebab_case("My Policy"), "my-policy");
/// assert_eq!(to_kebab_case("RateLimit"), "rate-limit");
/// ```
#[must_use]
pub fn to_kebab_case(name: &str) -> String {
    let mut kebab = String::with_capacity(name.len() + 4);
    let mut previous: Option<char> = None;

    for ch in name.trim().chars() {
        if matches!(ch, ' ' | '_' | '-') {
            push_separator(&mut kebab);
        } else {
            let after_word = previous.is_some_and(|p| p.is_lowercase() || p.is_ascii_digit());
            if ch.is_uppercase() && after_word {
                push_separator(&mut kebab);
            }
            kebab.extend(ch.to_lowercase());
        }
        previous = Some(ch);
    }

    while kebab.ends_with('-') {
        kebab.pop();
    }
    kebab
}

fn push_separator(kebab: &mut String) {
    if !kebab.is_empty() && !kebab.ends_with('-') {
        kebab.push('-');
    }
}

/// A packaged policy archive file name.
///
/// # Examples
///
/// ```
/// use policy_builder::archive::PolicyFileName;
///
/// let name = PolicyFileName::new("My Policy", "v1.0.0");
/// assert_eq!(name.to_string(), "my-policy-v1.0.0.zip");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PolicyFileName {
    stem: String,
    version: String,
}

impl PolicyFileName {
    /// Build a file name from a policy name and version.
    #[must_use]
    pub fn new(policy_name: &str, version: &str) -> Self {
        Self {
            stem: to_kebab_case(policy_name),
            version: version.to_owned(),
        }
    }

    /// Return the kebab-cased policy name.
    #[must_use]
    pub fn stem(&self) -> &str {
        &self.stem
    }

    /// Return the version component.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }
}

impl fmt::Display for PolicyFileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}{ARCHIVE_EXTENSION}", self.stem, self.version)
    }
}

/// Render the archive file name for `policy_name` at `version`.
#[must_use]
pub fn format_policy_file_name(policy_name: &str, version: &str) -> String {
    PolicyFileName::new(policy_name, version).to_string()
}
