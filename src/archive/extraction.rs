//! Zip extraction with path traversal protection.
//!
//! Every entry name is validated before anything is written, so an archive
//! carrying a single hostile entry leaves the destination untouched.

use super::error::{ArchiveError, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Trait for extracting policy archives, enabling test mocking.
///
/// # Examples
///
/// ```
/// use policy_builder::archive::ZipExtractor;
///
/// let extractor = ZipExtractor;
/// // Use extractor.extract(archive_path, dest_dir) in production
/// ```
#[cfg_attr(test, mockall::automock)]
pub trait ArchiveExtractor {
    /// Extract the archive at `archive_path` into `dest_dir`.
    ///
    /// Returns the destination-relative paths of the extracted files.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::PathTraversal`] if any entry would land
    /// outside `dest_dir`. Returns [`ArchiveError::Zip`] or
    /// [`ArchiveError::Io`] on container or filesystem failures.
    fn extract(&self, archive_path: &Path, dest_dir: &Path) -> Result<Vec<PathBuf>>;
}

/// Default extractor backed by the `zip` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipExtractor;

impl ArchiveExtractor for ZipExtractor {
    fn extract(&self, archive_path: &Path, dest_dir: &Path) -> Result<Vec<PathBuf>> {
        unzip(archive_path, dest_dir)
    }
}

/// A validated archive entry ready to be written.
struct PlannedEntry {
    index: usize,
    relative: PathBuf,
    is_dir: bool,
}

/// Extract `archive_path` into `dest_dir`.
///
/// All entry names are checked first; extraction only starts once every
/// entry is known to stay inside `dest_dir`. Unix permission bits are
/// restored when the archive records them.
///
/// # Errors
///
/// Returns [`ArchiveError::PathTraversal`] for absolute entries, drive
/// prefixes, or entries that climb above `dest_dir` after cleaning.
pub fn unzip(archive_path: &Path, dest_dir: &Path) -> Result<Vec<PathBuf>> {
    let file = fs::File::open(archive_path).map_err(ArchiveError::io("open", archive_path))?;
    let mut archive = zip::ZipArchive::new(file).map_err(ArchiveError::zip(archive_path))?;

    let plan = plan_entries(&mut archive, archive_path)?;

    fs::create_dir_all(dest_dir).map_err(ArchiveError::io("create directory", dest_dir))?;
    let mut extracted = Vec::new();
    for entry in plan {
        let target = dest_dir.join(&entry.relative);
        if entry.is_dir {
            fs::create_dir_all(&target).map_err(ArchiveError::io("create directory", &target))?;
            continue;
        }
        let mut zipped = archive
            .by_index(entry.index)
            .map_err(ArchiveError::zip(archive_path))?;
        let mode = zipped.unix_mode();
        write_entry(&mut zipped, mode, &target)?;
        extracted.push(entry.relative);
    }

    log::debug!(
        "extracted {} file(s) from {} into {}",
        extracted.len(),
        archive_path.display(),
        dest_dir.display()
    );
    Ok(extracted)
}

fn plan_entries(
    archive: &mut zip::ZipArchive<fs::File>,
    archive_path: &Path,
) -> Result<Vec<PlannedEntry>> {
    let mut plan = Vec::with_capacity(archive.len());
    for index in 0..archive.len() {
        let entry = archive
            .by_index(index)
            .map_err(ArchiveError::zip(archive_path))?;
        let name = entry.name().to_owned();
        let is_dir = entry.is_dir();
        let relative = clean_entry_name(&name)?;

        // A directory entry such as "./" names the destination itself.
        if relative.as_os_str().is_empty() {
            if is_dir {
                continue;
            }
            return Err(ArchiveError::PathTraversal { entry: name });
        }
        plan.push(PlannedEntry {
            index,
            relative,
            is_dir,
        });
    }
    Ok(plan)
}

/// Lexically clean an entry name into a destination-relative path.
///
/// Both `/` and `\` are treated as separators. `.` segments are dropped and
/// `..` pops the previous segment; popping past the root is a traversal.
fn clean_entry_name(name: &str) -> Result<PathBuf> {
    let traversal = || ArchiveError::PathTraversal {
        entry: name.to_owned(),
    };

    if name.starts_with('/') || name.starts_with('\\') || has_drive_prefix(name) {
        return Err(traversal());
    }

    let mut segments: Vec<&str> = Vec::new();
    for segment in name.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop().ok_or_else(traversal)?;
            }
            other => segments.push(other),
        }
    }
    Ok(segments.iter().collect())
}

fn has_drive_prefix(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(
        (chars.next(), chars.next()),
        (Some(letter), Some(':')) if letter.is_ascii_alphabetic()
    )
}

fn write_entry<R: io::Read>(entry: &mut R, mode: Option<u32>, target: &Path) -> Result<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(ArchiveError::io("create directory", parent))?;
    }
    let mut out = fs::File::create(target).map_err(ArchiveError::io("create", target))?;
    io::copy(entry, &mut out).map_err(ArchiveError::io("write", target))?;

    #[cfg(unix)]
    if let Some(mode) = mode {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(target, fs::Permissions::from_mode(mode & 0o777))
            .map_err(ArchiveError::io("set permissions on", target))?;
    }
    #[cfg(not(unix))]
    let _ = mode;
    Ok(())
}
