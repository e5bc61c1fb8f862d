//! Archive utilities shared by validation, staging, and packaging.
//!
//! # Sub-modules
//!
//! - [`copy`] - Recursive directory copy preserving permission bits.
//! - [`digest`] - SHA-256 digest newtype and file checksums.
//! - [`error`] - Error type carrying the failed operation and path.
//! - [`extraction`] - Zip extraction with path traversal protection.
//! - [`naming`] - Deterministic policy archive file names.
//! - [`packaging`] - Zip creation from a directory tree.

pub mod copy;
pub mod digest;
pub mod error;
pub mod extraction;
pub mod naming;
pub mod packaging;

pub use copy::{copy_dir, ensure_dir};
pub use digest::{Sha256Digest, compute_sha256, verify_checksum};
pub use error::ArchiveError;
pub use extraction::{ArchiveExtractor, ZipExtractor, unzip};
#[cfg(test)]
pub use extraction::MockArchiveExtractor;
pub use naming::{PolicyFileName, format_policy_file_name, to_kebab_case};
pub use packaging::zip_dir;
