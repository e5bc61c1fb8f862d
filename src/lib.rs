//! Policy builder library.
//!
//! This crate resolves a gateway build manifest into a staged build workspace
//! and a lock file that pins every policy to one concrete version. It is used
//! by the `policy-builder` CLI binary and can be driven programmatically for
//! testing or custom build workflows.
//!
//! # Modules
//!
//! - [`archive`] - Zip packaging, guarded extraction, checksums, and copying
//! - [`build_info`] - Build metadata emitted next to the build output
//! - [`cancel`] - Workspace cleanup that survives Ctrl-C
//! - [`classifier`] - Local/remote classification and local source checks
//! - [`cli`] - Command-line argument definitions
//! - [`dirs`] - Home directory resolution abstraction
//! - [`discovery`] - Candidate discovery seam and definition scanner
//! - [`engine`] - External image build engine seam
//! - [`error`] - Pipeline-level error type
//! - [`lock`] - Version lock resolution and lock file I/O
//! - [`manifest`] - Build manifest model and validation
//! - [`orchestration`] - Parameter set handed to the build engine
//! - [`output`] - Progress and summary formatting
//! - [`pipeline`] - End-to-end build pipeline
//! - [`stager`] - Ephemeral build workspace staging

pub mod archive;
pub mod build_info;
pub mod cancel;
pub mod classifier;
pub mod cli;
pub mod dirs;
pub mod discovery;
pub mod engine;
pub mod error;
pub mod lock;
pub mod manifest;
pub mod orchestration;
pub mod output;
pub mod pipeline;
pub mod stager;

/// File name of a policy's own definition at the root of its source tree.
pub const POLICY_DEFINITION_FILE: &str = "policy-definition.yaml";

/// Default file name of the build manifest.
pub const BUILD_FILE_NAME: &str = "build.yaml";

/// File name of the lock file written beside the build manifest.
pub const LOCK_FILE_NAME: &str = "build-lock.yaml";
