//! Version lock resolution and lock file I/O.
//!
//! After a build, every manifest entry is pinned to one discovered
//! candidate and the result is written as `build-lock.yaml` beside the
//! manifest, outside the ephemeral workspace.
//!
//! # Sub-modules
//!
//! - [`error`] - Resolution and lock file errors.
//! - [`model`] - Lock file schema.
//! - [`module_descriptor`] - `go.mod` module directive parsing.
//! - [`resolver`] - Candidate selection and atomic lock file writes.

pub mod error;
pub mod model;
pub mod module_descriptor;
pub mod resolver;

pub use error::LockError;
pub use model::{LockEntry, LockFile};
pub use resolver::{resolve_locks, resolve_manifest, write_lock_file};
