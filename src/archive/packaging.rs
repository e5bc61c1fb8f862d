//! Zip creation from a directory tree.
//!
//! Entries are written in sorted walk order with `/` separators, so the
//! same tree always produces the same entry list.

use super::error::{ArchiveError, Result};
use std::fs;
use std::io;
use std::path::Path;
use walkdir::WalkDir;
use zip::CompressionMethod;
use zip::write::SimpleFileOptions;

/// Default mode recorded for directories when the platform has none.
#[cfg(not(unix))]
const DEFAULT_DIR_MODE: u32 = 0o755;

/// Default mode recorded for files when the platform has none.
#[cfg(not(unix))]
const DEFAULT_FILE_MODE: u32 = 0o644;

/// Zip the contents of `src_dir` into a new archive at `dest_zip`.
///
/// Entry names are relative to `src_dir`. Directory entries carry a
/// trailing `/`. Files are deflated and keep their Unix permission bits.
/// If `dest_zip` lies inside `src_dir` it is skipped.
///
/// # Errors
///
/// Returns [`ArchiveError::Walk`] if the tree cannot be walked,
/// [`ArchiveError::Zip`] if the archive cannot be written, or
/// [`ArchiveError::Io`] on other filesystem failures.
pub fn zip_dir(src_dir: &Path, dest_zip: &Path) -> Result<()> {
    if let Some(parent) = dest_zip.parent().filter(|p| !p.as_os_str().is_empty()) {
        super::ensure_dir(parent)?;
    }
    let file = fs::File::create(dest_zip).map_err(ArchiveError::io("create", dest_zip))?;
    let mut writer = zip::ZipWriter::new(file);
    let base_options =
        SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let walker = WalkDir::new(src_dir)
        .min_depth(1)
        .follow_links(true)
        .sort_by_file_name();

    let mut entries = 0usize;
    for item in walker {
        let item = item.map_err(|source| ArchiveError::Walk {
            path: src_dir.to_path_buf(),
            source,
        })?;
        let path = item.path();
        if path == dest_zip {
            continue;
        }
        let relative = path.strip_prefix(src_dir).unwrap_or(path);
        let name = entry_name(relative);
        let metadata = item
            .metadata()
            .map_err(|source| ArchiveError::Walk {
                path: path.to_path_buf(),
                source,
            })?;
        let options = base_options.unix_permissions(permission_bits(&metadata));

        if metadata.is_dir() {
            writer
                .add_directory(format!("{name}/"), options)
                .map_err(ArchiveError::zip(dest_zip))?;
        } else {
            writer
                .start_file(name, options)
                .map_err(ArchiveError::zip(dest_zip))?;
            let mut source = fs::File::open(path).map_err(ArchiveError::io("open", path))?;
            io::copy(&mut source, &mut writer).map_err(ArchiveError::io("compress", path))?;
        }
        entries += 1;
    }

    writer.finish().map_err(ArchiveError::zip(dest_zip))?;
    log::debug!(
        "packaged {} entries from {} into {}",
        entries,
        src_dir.display(),
        dest_zip.display()
    );
    Ok(())
}

/// Join path components with `/` regardless of the host separator.
fn entry_name(relative: &Path) -> String {
    relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(unix)]
fn permission_bits(metadata: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o777
}

#[cfg(not(unix))]
fn permission_bits(metadata: &fs::Metadata) -> u32 {
    if metadata.is_dir() {
        DEFAULT_DIR_MODE
    } else {
        DEFAULT_FILE_MODE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::{compute_sha256, unzip};
    use rstest::{fixture, rstest};
    use std::collections::BTreeMap;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[fixture]
    fn policy_tree() -> TempDir {
        let temp = TempDir::new().expect("temp dir");
        let root = temp.path().join("src");
        fs::create_dir_all(root.join("internal/handler")).expect("mkdir");
        fs::create_dir_all(root.join("empty")).expect("mkdir");
        fs::write(root.join("policy-definition.yaml"), b"name: ratelimit\nversion: v1.0.0\n")
            .expect("write");
        fs::write(root.join("go.mod"), b"module github.com/acme/ratelimit\n").expect("write");
        fs::write(root.join("internal/handler/handler.go"), vec![b'x'; 20_000]).expect("write");
        temp
    }

    fn hashes_under(root: &Path) -> BTreeMap<PathBuf, String> {
        WalkDir::new(root)
            .min_depth(1)
            .into_iter()
            .map(|e| e.expect("walk"))
            .filter(|e| e.file_type().is_file())
            .map(|e| {
                let rel = e.path().strip_prefix(root).expect("prefix").to_path_buf();
                let hash = compute_sha256(e.path()).expect("hash").to_string();
                (rel, hash)
            })
            .collect()
    }

    #[rstest]
    fn round_trip_preserves_files_and_contents(policy_tree: TempDir) {
        let src = policy_tree.path().join("src");
        let archive = policy_tree.path().join("ratelimit-v1.0.0.zip");
        zip_dir(&src, &archive).expect("zip");

        let dest = policy_tree.path().join("restored");
        unzip(&archive, &dest).expect("unzip");

        assert_eq!(hashes_under(&src), hashes_under(&dest));
        assert!(dest.join("empty").is_dir());
    }

    #[rstest]
    fn entries_are_sorted_with_directory_slashes(policy_tree: TempDir) {
        let src = policy_tree.path().join("src");
        let archive_path = policy_tree.path().join("out.zip");
        zip_dir(&src, &archive_path).expect("zip");

        let file = fs::File::open(&archive_path).expect("open");
        let mut archive = zip::ZipArchive::new(file).expect("read archive");
        let names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).expect("entry").name().to_owned())
            .collect();

        assert_eq!(
            names,
            vec![
                "empty/",
                "go.mod",
                "internal/",
                "internal/handler/",
                "internal/handler/handler.go",
                "policy-definition.yaml",
            ]
        );
    }

    #[rstest]
    fn skips_archive_written_inside_source(policy_tree: TempDir) {
        let src = policy_tree.path().join("src");
        let archive = src.join("self.zip");
        zip_dir(&src, &archive).expect("zip");

        let dest = policy_tree.path().join("restored");
        let files = unzip(&archive, &dest).expect("unzip");
        assert!(!files.contains(&PathBuf::from("self.zip")));
    }

    #[cfg(unix)]
    #[rstest]
    fn round_trip_keeps_permission_bits(policy_tree: TempDir) {
        use std::os::unix::fs::PermissionsExt;

        let src = policy_tree.path().join("src");
        let script = src.join("build.sh");
        fs::write(&script, b"#!/bin/sh\n").expect("write");
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).expect("chmod");

        let archive = policy_tree.path().join("out.zip");
        zip_dir(&src, &archive).expect("zip");
        let dest = policy_tree.path().join("restored");
        unzip(&archive, &dest).expect("unzip");

        let mode = fs::metadata(dest.join("build.sh"))
            .expect("stat")
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o755);
    }
}
