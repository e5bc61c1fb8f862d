//! Recursive directory copying.
//!
//! Symbolic links are followed: a link to a file is copied as a regular file
//! and a link to a directory is copied as a directory tree. Links are never
//! recreated as links in the destination. A link that points back at one of
//! its own ancestors is reported as a walk error.

use super::error::{ArchiveError, Result};
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

/// Create `path` and any missing parents.
///
/// # Errors
///
/// Returns [`ArchiveError::Io`] if the directory cannot be created.
pub fn ensure_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(ArchiveError::io("create directory", path))
}

/// Recursively copy `src` into `dst`, preserving file permission bits.
///
/// `dst` is created if missing. Existing files in `dst` are overwritten.
///
/// # Errors
///
/// Returns [`ArchiveError::Walk`] if `src` cannot be walked or contains a
/// symlink loop, and [`ArchiveError::Io`] naming the failing path if a
/// directory cannot be created or a file cannot be copied.
pub fn copy_dir(src: &Path, dst: &Path) -> Result<()> {
    let walker = WalkDir::new(src).follow_links(true).sort_by_file_name();

    for item in walker {
        let item = item.map_err(|source| ArchiveError::Walk {
            path: src.to_path_buf(),
            source,
        })?;
        let relative = item.path().strip_prefix(src).unwrap_or(item.path());
        let target = dst.join(relative);

        if item.file_type().is_dir() {
            ensure_dir(&target)?;
        } else {
            copy_file(item.path(), &target)?;
        }
    }

    Ok(())
}

/// Copy a single file, then apply the source permissions to the copy.
fn copy_file(src: &Path, dst: &Path) -> Result<()> {
    fs::copy(src, dst).map_err(ArchiveError::io("copy file", src))?;

    let permissions = fs::metadata(src)
        .map_err(ArchiveError::io("stat", src))?
        .permissions();
    fs::set_permissions(dst, permissions).map_err(ArchiveError::io("set permissions on", dst))
}
