//! Unit tests for lock resolution.

use super::*;
use crate::BUILD_FILE_NAME;
use crate::lock::module_descriptor::MODULE_DESCRIPTOR_FILE;
use rstest::{fixture, rstest};
use std::fs;
use tempfile::TempDir;

struct Project {
    _temp: TempDir,
    root: Utf8PathBuf,
}

impl Project {
    fn path(&self) -> &Utf8Path {
        &self.root
    }
}

#[fixture]
fn project() -> Project {
    let temp = TempDir::new().expect("temp dir creation succeeds");
    let root = Utf8PathBuf::try_from(temp.path().to_owned()).expect("non-UTF8 temp path");
    Project { _temp: temp, root }
}

fn write_manifest(dir: &Utf8Path, yaml: &str) -> Utf8PathBuf {
    let path = dir.join(BUILD_FILE_NAME);
    fs::write(&path, yaml).expect("write manifest");
    path
}

fn candidate(name: &str, version: &str, path: impl Into<Utf8PathBuf>) -> DiscoveredCandidate {
    DiscoveredCandidate {
        name: name.to_owned(),
        version: version.to_owned(),
        path: path.into(),
        module_descriptor: None,
    }
}

/// A candidate whose descriptor declares `module_path`.
fn module_candidate(
    dir: &Utf8Path,
    name: &str,
    version: &str,
    module_path: &str,
) -> DiscoveredCandidate {
    let root = dir.join(format!("cache/{name}@{version}"));
    fs::create_dir_all(&root).expect("mkdir");
    let descriptor = root.join(MODULE_DESCRIPTOR_FILE);
    fs::write(&descriptor, format!("module {module_path}\n\ngo 1.22\n")).expect("write");
    DiscoveredCandidate {
        module_descriptor: Some(descriptor),
        ..candidate(name, version, root)
    }
}

#[rstest]
fn unique_name_resolves(project: Project) {
    let manifest = write_manifest(
        project.path(),
        "version: v1.0.0\npolicies:\n  - name: ratelimit\n    filePath: ./policies/ratelimit\n",
    );
    let candidates = [candidate(
        "ratelimit",
        "v1.0.0",
        project.path().join("policies/ratelimit"),
    )];

    let lock = resolve_locks(&manifest, &candidates).expect("resolves");
    assert_eq!(lock.version, "v1.0.0");
    assert_eq!(
        lock.policies,
        vec![LockEntry {
            name: "ratelimit".to_owned(),
            version: "v1.0.0".to_owned(),
            file_path: Some("./policies/ratelimit".to_owned()),
            gomodule: None,
        }]
    );
}

#[rstest]
fn file_path_disambiguates_duplicate_names(project: Project) {
    fs::create_dir_all(project.path().join("policies/ratelimit")).expect("mkdir");
    fs::create_dir_all(project.path().join("legacy/ratelimit")).expect("mkdir");
    let manifest = write_manifest(
        project.path(),
        "version: v1\npolicies:\n  - name: ratelimit\n    filePath: policies/./ratelimit\n",
    );
    let candidates = [
        candidate("ratelimit", "v0.9.0", project.path().join("legacy/ratelimit")),
        candidate("ratelimit", "v1.1.0", project.path().join("policies/ratelimit")),
    ];

    let lock = resolve_locks(&manifest, &candidates).expect("resolves");
    assert_eq!(lock.policies[0].version, "v1.1.0");
}

#[rstest]
fn file_path_match_works_for_paths_that_do_not_exist(project: Project) {
    let manifest = write_manifest(
        project.path(),
        "version: v1\npolicies:\n  - name: ratelimit\n    filePath: gone/../ghost\n",
    );
    let candidates = [
        candidate("ratelimit", "v1.0.0", project.path().join("other")),
        candidate("ratelimit", "v2.0.0", project.path().join("ghost")),
    ];

    let lock = resolve_locks(&manifest, &candidates).expect("resolves");
    assert_eq!(lock.policies[0].version, "v2.0.0");
}

#[rstest]
fn module_ref_matches_declared_path_ignoring_v_prefix(project: Project) {
    let manifest = write_manifest(
        project.path(),
        "version: v1\npolicies:\n  - name: ratelimit\n    gomodule: github.com/x/y@1.0.0\n",
    );
    let candidates = [
        module_candidate(project.path(), "ratelimit", "v0.9.0", "github.com/x/y"),
        module_candidate(project.path(), "ratelimit", "v1.0.0", "github.com/x/y"),
    ];

    let lock = resolve_locks(&manifest, &candidates).expect("resolves");
    let entry = &lock.policies[0];
    assert_eq!(entry.version, "v1.0.0");
    assert_eq!(entry.gomodule.as_deref(), Some("github.com/x/y@1.0.0"));
    assert!(entry.file_path.is_none());
}

#[rstest]
fn module_ref_requires_exact_version_text(project: Project) {
    let manifest = write_manifest(
        project.path(),
        "version: v1\npolicies:\n  - name: ratelimit\n    gomodule: github.com/x/y@1.0\n",
    );
    let candidates = [
        module_candidate(project.path(), "ratelimit", "v1.0.0", "github.com/x/y"),
        module_candidate(project.path(), "ratelimit", "v2.0.0", "github.com/x/y"),
    ];

    let err = resolve_locks(&manifest, &candidates).expect_err("1.0 is not 1.0.0");
    assert!(matches!(err, LockError::UnresolvedEntry { ref name } if name == "ratelimit"));
}

#[rstest]
fn module_ref_falls_back_to_literal_path(project: Project) {
    let manifest = write_manifest(
        project.path(),
        "version: v1\npolicies:\n  - name: ratelimit\n    gomodule: github.com/x/y@v2.0.0\n",
    );
    let candidates = [
        candidate("ratelimit", "v1.0.0", "github.com/x/y@v1.0.0"),
        candidate("ratelimit", "v2.0.0", "github.com/x/y@v2.0.0"),
    ];

    let lock = resolve_locks(&manifest, &candidates).expect("resolves");
    assert_eq!(lock.policies[0].version, "v2.0.0");
}

#[rstest]
fn ambiguous_name_without_disambiguator_fails(project: Project) {
    let manifest = write_manifest(
        project.path(),
        "version: v1\npolicies:\n  - name: ratelimit\n",
    );
    let candidates = [
        candidate("ratelimit", "v1.0.0", "/cache/ratelimit@v1.0.0"),
        candidate("ratelimit", "v2.0.0", "/cache/ratelimit@v2.0.0"),
    ];

    let err = resolve_locks(&manifest, &candidates).expect_err("ambiguous");
    assert!(matches!(err, LockError::UnresolvedEntry { ref name } if name == "ratelimit"));
    assert_eq!(
        err.to_string(),
        "failed to determine version for policy 'ratelimit'"
    );
}

#[rstest]
fn unversioned_module_ref_does_not_disambiguate_by_name_alone(project: Project) {
    let manifest = write_manifest(
        project.path(),
        "version: v1\npolicies:\n  - name: ratelimit\n    gomodule: github.com/x/other\n",
    );
    let candidates = [
        module_candidate(project.path(), "ratelimit", "v1.0.0", "github.com/x/y"),
        module_candidate(project.path(), "ratelimit", "v2.0.0", "github.com/x/y"),
    ];

    assert!(matches!(
        resolve_locks(&manifest, &candidates),
        Err(LockError::UnresolvedEntry { .. })
    ));
}

#[rstest]
fn first_unresolved_entry_aborts_in_manifest_order(project: Project) {
    let manifest = write_manifest(
        project.path(),
        "version: v1\npolicies:\n  - name: cors\n  - name: missing-a\n  - name: missing-b\n",
    );
    let candidates = [candidate("cors", "v1.0.0", "/cache/cors")];

    let err = resolve_locks(&manifest, &candidates).expect_err("unresolved");
    assert!(matches!(err, LockError::UnresolvedEntry { ref name } if name == "missing-a"));
}

#[rstest]
fn lock_entries_follow_manifest_order(project: Project) {
    let manifest = write_manifest(
        project.path(),
        "version: v1\npolicies:\n  - name: b\n  - name: a\n",
    );
    let candidates = [
        candidate("a", "1.0.0", "/cache/a"),
        candidate("b", "2.0.0", "/cache/b"),
    ];
    let lock = resolve_locks(&manifest, &candidates).expect("resolves");
    let names: Vec<&str> = lock.policies.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, ["b", "a"]);
}

#[rstest]
fn writes_lock_file_beside_manifest(project: Project) {
    let manifest = write_manifest(project.path(), "version: v1\npolicies:\n  - name: a\n");
    let lock = LockFile {
        version: "v1".to_owned(),
        policies: vec![LockEntry {
            name: "a".to_owned(),
            version: "1.0.0".to_owned(),
            file_path: None,
            gomodule: None,
        }],
    };

    let written = write_lock_file(&manifest, &lock).expect("write lock");
    assert_eq!(written, project.path().join(LOCK_FILE_NAME));
    assert_eq!(LockFile::load(&written).expect("reload"), lock);

    let leftovers: Vec<_> = fs::read_dir(project.path())
        .expect("read dir")
        .map(|e| e.expect("entry").file_name())
        .collect();
    assert_eq!(leftovers.len(), 2, "unexpected files: {leftovers:?}");
}

#[rstest]
fn rewriting_lock_file_replaces_previous_content(project: Project) {
    let manifest = write_manifest(project.path(), "version: v1\npolicies:\n  - name: a\n");
    fs::write(project.path().join(LOCK_FILE_NAME), "stale: true\n").expect("write stale");

    let lock = LockFile {
        version: "v2".to_owned(),
        policies: Vec::new(),
    };
    write_lock_file(&manifest, &lock).expect("write lock");
    assert_eq!(
        LockFile::load(&project.path().join(LOCK_FILE_NAME)).expect("reload"),
        lock
    );
}

#[rstest]
#[case::dots("/policy-builder-absent/./b/../c", "/policy-builder-absent/c")]
#[case::root_parent("/../policy-builder-absent", "/policy-builder-absent")]
fn missing_paths_compare_lexically(#[case] input: &str, #[case] expected: &str) {
    assert_eq!(comparable_path(Utf8Path::new(input)), Utf8PathBuf::from(expected));
}
