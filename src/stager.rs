//! Ephemeral build workspace staging.
//!
//! Staging copies every local policy source into a fresh workspace and
//! writes a rewritten manifest whose local paths point at the copies. Module
//! and name-only entries pass through untouched.
//!
//! The workspace layout is:
//!
//! ```text
//! gateway-image-build-XXXXXX/
//! ├── build.yaml       rewritten manifest
//! ├── policies/<dir>/  copied local sources
//! ├── output/          build engine output
//! └── logs/            build engine logs
//! ```

use crate::BUILD_FILE_NAME;
use crate::archive::{ArchiveError, copy_dir};
use crate::cancel::CleanupRegistry;
use crate::dirs::BaseDirs;
use crate::manifest::{BuildManifest, ManifestError, PolicySource, manifest_dir};
use camino::{Utf8Path, Utf8PathBuf};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;
use thiserror::Error;

/// Prefix of every workspace directory name.
pub const WORKSPACE_PREFIX: &str = "gateway-image-build-";

/// Workspace sub-directory holding copied local policies.
pub const POLICIES_DIR: &str = "policies";

/// Workspace sub-directory the build engine writes artefacts into.
pub const OUTPUT_DIR: &str = "output";

/// Workspace sub-directory the build engine writes logs into.
pub const LOGS_DIR: &str = "logs";

/// Errors that can occur while staging a workspace.
#[derive(Debug, Error)]
pub enum StageError {
    /// No home directory could be resolved for the staging parent.
    #[error("cannot determine the home directory for build workspaces")]
    HomeUnavailable,

    /// A staging filesystem operation failed.
    #[error("failed to {operation} {path}: {source}")]
    Io {
        /// The operation that was attempted.
        operation: &'static str,
        /// The path the operation was attempted on.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The workspace was created at a path that is not valid UTF-8.
    #[error("build workspace path is not valid UTF-8: {}", path.display())]
    NonUtf8Path {
        /// The workspace path.
        path: PathBuf,
    },

    /// The manifest could not be loaded or written.
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    /// Copying a policy source failed.
    #[error(transparent)]
    Copy(#[from] ArchiveError),

    /// A local source has no usable directory name.
    #[error("policy '{name}': cannot derive a workspace directory from {path}")]
    UnnamedSource {
        /// Name of the manifest entry.
        name: String,
        /// The resolved source path.
        path: Utf8PathBuf,
    },

    /// Two different sources would be staged into the same directory.
    #[error(
        "local sources {first} and {second} would both be staged as policies/{name}; rename one of the directories"
    )]
    Collision {
        /// The shared directory name.
        name: String,
        /// The source staged first.
        first: Utf8PathBuf,
        /// The source that collided with it.
        second: Utf8PathBuf,
    },
}

impl StageError {
    fn io(operation: &'static str, path: &Utf8Path) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.to_owned();
        move |source| Self::Io {
            operation,
            path,
            source,
        }
    }
}

/// Result type alias using [`StageError`].
pub type Result<T> = std::result::Result<T, StageError>;

/// A staged build workspace.
///
/// The workspace owns its directory. It is removed by [`Workspace::cleanup`]
/// or when the value is dropped; removal failures are logged and ignored.
/// When created by a [`Stager`] with a [`CleanupRegistry`], the directory is
/// registered as soon as it exists and unregistered once it is removed.
#[derive(Debug)]
pub struct Workspace {
    root: Utf8PathBuf,
    dir: Option<TempDir>,
    manifest: BuildManifest,
    registry: Option<CleanupRegistry>,
}

impl Workspace {
    /// Create an empty workspace directory under `parent`.
    fn create(
        parent: &Utf8Path,
        manifest: BuildManifest,
        registry: Option<CleanupRegistry>,
    ) -> Result<Self> {
        fs::create_dir_all(parent).map_err(StageError::io("create directory", parent))?;
        let dir = tempfile::Builder::new()
            .prefix(WORKSPACE_PREFIX)
            .rand_bytes(6)
            .tempdir_in(parent)
            .map_err(StageError::io("create workspace in", parent))?;
        let root = Utf8PathBuf::try_from(dir.path().to_path_buf()).map_err(|err| {
            StageError::NonUtf8Path {
                path: err.into_path_buf(),
            }
        })?;

        if let Some(registry) = &registry {
            registry.register(root.as_std_path());
        }
        log::info!("staging build workspace at {root}");
        Ok(Self {
            root,
            dir: Some(dir),
            manifest,
            registry,
        })
    }

    /// Return the workspace root.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Return the directory holding copied local policies.
    #[must_use]
    pub fn policies_dir(&self) -> Utf8PathBuf {
        self.root.join(POLICIES_DIR)
    }

    /// Return the directory the build engine writes artefacts into.
    #[must_use]
    pub fn output_dir(&self) -> Utf8PathBuf {
        self.root.join(OUTPUT_DIR)
    }

    /// Return the directory the build engine writes logs into.
    #[must_use]
    pub fn logs_dir(&self) -> Utf8PathBuf {
        self.root.join(LOGS_DIR)
    }

    /// Return the path of the rewritten manifest.
    #[must_use]
    pub fn manifest_path(&self) -> Utf8PathBuf {
        self.root.join(BUILD_FILE_NAME)
    }

    /// Return the rewritten manifest.
    #[must_use]
    pub fn manifest(&self) -> &BuildManifest {
        &self.manifest
    }

    /// Remove the workspace directory.
    ///
    /// Calling this more than once is harmless.
    pub fn cleanup(&mut self) {
        let Some(dir) = self.dir.take() else {
            return;
        };
        match dir.close() {
            Ok(()) => log::debug!("removed build workspace {}", self.root),
            Err(err) => log::warn!("failed to remove build workspace {}: {err}", self.root),
        }
        if let Some(registry) = &self.registry {
            registry.unregister(self.root.as_std_path());
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        self.cleanup();
    }
}

/// Creates workspaces under a fixed parent directory.
#[derive(Debug, Clone)]
pub struct Stager {
    parent: Utf8PathBuf,
    registry: Option<CleanupRegistry>,
}

impl Stager {
    /// Create a stager placing workspaces under `parent`.
    #[must_use]
    pub fn new(parent: Utf8PathBuf) -> Self {
        Self {
            parent,
            registry: None,
        }
    }

    /// Create a stager using the staging parent from `dirs`.
    ///
    /// # Errors
    ///
    /// Returns [`StageError::HomeUnavailable`] if no home directory is known.
    pub fn from_dirs(dirs: &dyn BaseDirs) -> Result<Self> {
        dirs.staging_parent()
            .map(Self::new)
            .ok_or(StageError::HomeUnavailable)
    }

    /// Register every workspace with `registry` from the moment its
    /// directory is created.
    #[must_use]
    pub fn with_cleanup(mut self, registry: CleanupRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Return the directory workspaces are created under.
    #[must_use]
    pub fn parent(&self) -> &Utf8Path {
        &self.parent
    }

    /// Stage the manifest at `manifest_path` into a new workspace.
    ///
    /// The manifest is parsed before anything is created, so a malformed
    /// manifest leaves no trace on disk.
    ///
    /// # Errors
    ///
    /// Returns a [`StageError`] if the manifest cannot be read, a source
    /// cannot be copied, two sources collide, or the workspace cannot be
    /// written. Any partially built workspace is removed.
    pub fn stage(&self, manifest_path: &Utf8Path) -> Result<Workspace> {
        let manifest = BuildManifest::load(manifest_path)?;
        let source_dir = manifest_dir(manifest_path);

        let mut workspace = Workspace::create(&self.parent, manifest, self.registry.clone())?;
        for sub_dir in [POLICIES_DIR, OUTPUT_DIR, LOGS_DIR] {
            let path = workspace.root.join(sub_dir);
            fs::create_dir(&path).map_err(StageError::io("create directory", &path))?;
        }

        let policies_dir = workspace.policies_dir();
        stage_local_sources(&mut workspace.manifest, &source_dir, &policies_dir)?;

        let staged_manifest = workspace.manifest_path();
        fs::write(&staged_manifest, workspace.manifest.to_yaml()?)
            .map_err(StageError::io("write", &staged_manifest))?;

        Ok(workspace)
    }
}

/// Stage `manifest_path` under the staging parent resolved from `dirs`.
///
/// # Errors
///
/// See [`Stager::stage`] and [`Stager::from_dirs`].
pub fn stage(manifest_path: &Utf8Path, dirs: &dyn BaseDirs) -> Result<Workspace> {
    Stager::from_dirs(dirs)?.stage(manifest_path)
}

/// Copy each local source into `policies_dir` and rewrite its path.
///
/// A source is staged under the last segment of its declared path, so a
/// symlinked source keeps the link's name. Collisions are decided on the
/// canonical source, which lets two spellings of one directory share a copy.
fn stage_local_sources(
    manifest: &mut BuildManifest,
    source_dir: &Utf8Path,
    policies_dir: &Utf8Path,
) -> Result<()> {
    // Directory name -> canonical source staged under it.
    let mut staged: BTreeMap<String, Utf8PathBuf> = BTreeMap::new();

    for entry in &mut manifest.policies {
        let Some(declared) = entry.source.resolve_local(source_dir) else {
            continue;
        };
        let source = declared
            .canonicalize_utf8()
            .map_err(StageError::io("resolve", &declared))?;
        let dir_name = declared
            .file_name()
            .or_else(|| source.file_name())
            .map(str::to_owned)
            .ok_or_else(|| StageError::UnnamedSource {
                name: entry.name.clone(),
                path: declared.clone(),
            })?;

        match staged.get(&dir_name) {
            Some(first) if first == &source => {
                log::debug!("policy '{}' reuses staged policies/{dir_name}", entry.name);
            }
            Some(first) => {
                return Err(StageError::Collision {
                    name: dir_name,
                    first: first.clone(),
                    second: source,
                });
            }
            None => {
                copy_dir(
                    source.as_std_path(),
                    policies_dir.join(&dir_name).as_std_path(),
                )?;
                log::debug!(
                    "staged policy '{}' from {declared} as policies/{dir_name}",
                    entry.name
                );
                staged.insert(dir_name.clone(), source);
            }
        }

        entry.source = PolicySource::Local {
            file_path: format!("{POLICIES_DIR}/{dir_name}"),
        };
    }

    Ok(())
}

#[cfg(test)]
#[path = "stager_tests.rs"]
mod tests;
