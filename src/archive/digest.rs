//! SHA-256 digest newtype and file checksums.
//!
//! Checksums render as `sha256:<hex>`, the form recorded next to packaged
//! policy archives.

use super::error::{ArchiveError, Result};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs;
use std::io::Read;
use std::path::Path;

/// Algorithm prefix used in rendered checksums.
const ALGORITHM_PREFIX: &str = "sha256:";

/// Expected length of a hex-encoded SHA-256 digest.
const DIGEST_HEX_LEN: usize = 64;

/// A validated lowercase hex SHA-256 digest.
///
/// # Examples
///
/// ```
/// use policy_builder::archive::Sha256Digest;
///
/// let hex = "a".repeat(64);
/// let digest = Sha256Digest::try_from(hex.as_str()).expect("valid digest");
/// assert_eq!(digest.to_string(), format!("sha256:{hex}"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Sha256Digest(String);

impl Sha256Digest {
    /// Return the bare hex digest without the algorithm prefix.
    #[must_use]
    pub fn hex(&self) -> &str {
        &self.0
    }

    /// Parse a checksum of the form `sha256:<hex>`.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::InvalidChecksum`] when the prefix is missing
    /// or the hex part is malformed.
    pub fn parse_prefixed(value: &str) -> Result<Self> {
        let hex = value
            .strip_prefix(ALGORITHM_PREFIX)
            .ok_or_else(|| ArchiveError::InvalidChecksum {
                value: value.to_owned(),
                reason: format!("expected \"{ALGORITHM_PREFIX}\" prefix"),
            })?;
        Self::try_from(hex)
    }
}

impl TryFrom<&str> for Sha256Digest {
    type Error = ArchiveError;

    fn try_from(value: &str) -> Result<Self> {
        validate_hex(value)?;
        Ok(Self(value.to_owned()))
    }
}

impl fmt::Display for Sha256Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{ALGORITHM_PREFIX}{}", self.0)
    }
}

fn validate_hex(value: &str) -> Result<()> {
    if value.len() != DIGEST_HEX_LEN {
        return Err(ArchiveError::InvalidChecksum {
            value: value.to_owned(),
            reason: format!(
                "expected {DIGEST_HEX_LEN} hex characters, got {}",
                value.len()
            ),
        });
    }
    if let Some(bad) = value
        .chars()
        .find(|c| !c.is_ascii_hexdigit() || c.is_ascii_uppercase())
    {
        return Err(ArchiveError::InvalidChecksum {
            value: value.to_owned(),
            reason: format!("unexpected character '{bad}'"),
        });
    }
    Ok(())
}

/// Compute the SHA-256 digest of a file, reading it in chunks.
///
/// # Errors
///
/// Returns [`ArchiveError::Io`] if the file cannot be opened or read.
pub fn compute_sha256(path: &Path) -> Result<Sha256Digest> {
    let mut file = fs::File::open(path).map_err(ArchiveError::io("open", path))?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];
    loop {
        let bytes_read = file
            .read(&mut buffer)
            .map_err(ArchiveError::io("read", path))?;
        let Some(chunk) = buffer.get(..bytes_read).filter(|c| !c.is_empty()) else {
            break;
        };
        hasher.update(chunk);
    }
    Ok(Sha256Digest(format!("{:x}", hasher.finalize())))
}

/// Check whether the file at `path` matches `expected` (`sha256:<hex>`).
///
/// # Errors
///
/// Returns [`ArchiveError::InvalidChecksum`] if `expected` is malformed, or
/// [`ArchiveError::Io`] if the file cannot be read.
pub fn verify_checksum(path: &Path, expected: &str) -> Result<bool> {
    let expected = Sha256Digest::parse_prefixed(expected)?;
    Ok(compute_sha256(path)? == expected)
}
