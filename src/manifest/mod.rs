//! Build manifest model and validation.
//!
//! A manifest lists the policies to bake into a gateway image. Each entry is
//! sourced from a local directory, a module reference, or by name alone.
//!
//! # Sub-modules
//!
//! - [`error`] - Parse and validation errors.
//! - [`model`] - Typed manifest and YAML mapping.
//! - [`module_ref`] - `module/path@version` references.
//! - [`validation`] - Structural and local source checks.

pub mod error;
pub mod model;
pub mod module_ref;
pub mod validation;

pub use error::ManifestError;
pub use model::{
    BuildManifest, GatewayImages, GatewaySection, ManifestEntry, PolicySource, clean_path,
    manifest_dir, resolve_against,
};
pub use module_ref::{ModuleRef, strip_version_prefix};
pub use validation::{validate, validate_local_sources};
