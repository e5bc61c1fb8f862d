//! Home directory resolution.
//!
//! Build workspaces live under the invoking user's home directory rather
//! than the OS temporary directory, so container engines with restricted
//! file sharing can still mount them. Resolution goes through [`BaseDirs`]
//! so tests can point it at a temporary directory. A home directory that is
//! not valid UTF-8 is treated as unknown.

use camino::Utf8PathBuf;

/// Directory under the home directory that holds builder state.
pub const STATE_DIR_NAME: &str = ".policy-builder";

/// Directory under [`STATE_DIR_NAME`] that holds build workspaces.
pub const STAGING_DIR_NAME: &str = ".tmp";

/// Source of per-user base directories.
pub trait BaseDirs {
    /// Return the user's home directory, if known.
    fn home_dir(&self) -> Option<Utf8PathBuf>;

    /// Return the parent directory for build workspaces.
    fn staging_parent(&self) -> Option<Utf8PathBuf> {
        self.home_dir()
            .map(|home| home.join(STATE_DIR_NAME).join(STAGING_DIR_NAME))
    }
}

/// [`BaseDirs`] backed by the platform's user directories.
///
/// # Examples
///
/// ```
/// use policy_builder::dirs::{BaseDirs, SystemBaseDirs};
///
/// let dirs = SystemBaseDirs;
/// if let Some(parent) = dirs.staging_parent() {
///     assert!(parent.ends_with(".policy-builder/.tmp"));
/// }
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemBaseDirs;

impl BaseDirs for SystemBaseDirs {
    fn home_dir(&self) -> Option<Utf8PathBuf> {
        directories_next::BaseDirs::new()
            .and_then(|dirs| Utf8PathBuf::try_from(dirs.home_dir().to_path_buf()).ok())
    }
}
