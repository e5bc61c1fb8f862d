//! Workspace cleanup that survives Ctrl-C.
//!
//! A [`Workspace`](crate::stager::Workspace) removes itself on drop, but an
//! interrupt terminates the process without unwinding. Paths registered with
//! a [`CleanupRegistry`] are removed by the interrupt handler before the
//! process exits with [`EXIT_CODE_INTERRUPTED`].

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Exit code used when the run is interrupted.
pub const EXIT_CODE_INTERRUPTED: i32 = 130;

/// Shared set of directories to remove on interrupt.
#[derive(Debug, Clone, Default)]
pub struct CleanupRegistry {
    paths: Arc<Mutex<Vec<PathBuf>>>,
}

impl CleanupRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember `path` for removal on interrupt.
    pub fn register(&self, path: &Path) {
        if let Ok(mut paths) = self.paths.lock()
            && !paths.iter().any(|known| known == path)
        {
            paths.push(path.to_path_buf());
        }
    }

    /// Forget `path`; it has been cleaned up normally.
    pub fn unregister(&self, path: &Path) {
        if let Ok(mut paths) = self.paths.lock() {
            paths.retain(|known| known != path);
        }
    }

    /// Paths currently registered, in registration order.
    #[must_use]
    pub fn registered(&self) -> Vec<PathBuf> {
        self.paths
            .lock()
            .map(|paths| paths.clone())
            .unwrap_or_default()
    }

    /// Remove every registered directory and clear the registry.
    ///
    /// Returns the number of directories removed. Paths that no longer exist
    /// are skipped; other failures are logged.
    pub fn remove_all(&self) -> usize {
        let paths = match self.paths.lock() {
            Ok(mut paths) => std::mem::take(&mut *paths),
            Err(_) => return 0,
        };
        paths
            .iter()
            .filter(|path| match fs::remove_dir_all(path) {
                Ok(()) => true,
                Err(err) if err.kind() == io::ErrorKind::NotFound => false,
                Err(err) => {
                    log::warn!("failed to remove {}: {err}", path.display());
                    false
                }
            })
            .count()
    }
}

/// Install a Ctrl-C handler that cleans up `registry` and exits.
///
/// # Errors
///
/// Returns [`ctrlc::Error`] if a handler is already installed or the
/// platform handler cannot be set.
pub fn install_ctrlc_handler(registry: &CleanupRegistry) -> Result<(), ctrlc::Error> {
    let registry = registry.clone();
    ctrlc::set_handler(move || {
        let removed = registry.remove_all();
        log::warn!("interrupted; removed {removed} build workspace(s)");
        std::process::exit(EXIT_CODE_INTERRUPTED);
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn remove_all_deletes_registered_directories() {
        let temp = TempDir::new().expect("temp dir");
        let workspace = temp.path().join("gateway-image-build-abc");
        fs::create_dir_all(workspace.join("policies")).expect("mkdir");
        let registry = CleanupRegistry::new();
        registry.register(&workspace);

        assert_eq!(registry.remove_all(), 1);
        assert!(!workspace.exists());
        assert!(registry.registered().is_empty());
    }

    #[test]
    fn unregistered_paths_are_left_alone() {
        let temp = TempDir::new().expect("temp dir");
        let registry = CleanupRegistry::new();
        registry.register(temp.path());
        registry.unregister(temp.path());

        assert_eq!(registry.remove_all(), 0);
        assert!(temp.path().exists());
    }

    #[test]
    fn clones_share_registrations() {
        let registry = CleanupRegistry::new();
        let handle = registry.clone();
        handle.register(Path::new("/tmp/one"));
        handle.register(Path::new("/tmp/one"));

        assert_eq!(registry.registered(), [PathBuf::from("/tmp/one")]);
    }

    #[test]
    fn missing_paths_are_not_counted() {
        let registry = CleanupRegistry::new();
        registry.register(Path::new("/nonexistent/policy-builder/workspace"));
        assert_eq!(registry.remove_all(), 0);
    }
}
