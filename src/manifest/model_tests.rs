//! Unit tests for manifest parsing and serialisation.

use super::*;
use rstest::rstest;

const FULL_MANIFEST: &str = r"
version: 1.0.0
versionResolution: exact
gateway:
  version: 0.9.0
  images:
    runtime: registry.example.com/runtime:custom
policies:
  - name: ratelimit
    version: v1.0.0
    filePath: ./policies/ratelimit
  - name: cors
    gomodule: github.com/acme/cors@v1.2.0
  - name: jwt-auth
    versionResolution: latest
";

#[test]
fn parses_all_sources_in_order() {
    let manifest = BuildManifest::parse(FULL_MANIFEST.as_bytes()).expect("valid manifest");

    assert_eq!(manifest.version, "1.0.0");
    assert_eq!(manifest.version_resolution.as_deref(), Some("exact"));
    let names: Vec<&str> = manifest.policies.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, ["ratelimit", "cors", "jwt-auth"]);

    assert_eq!(
        manifest.policies[0].source,
        PolicySource::Local {
            file_path: "./policies/ratelimit".to_owned()
        }
    );
    let module_ref = manifest.policies[1]
        .source
        .module_ref()
        .expect("module source");
    assert_eq!(module_ref.path(), "github.com/acme/cors");
    assert_eq!(module_ref.version(), Some("v1.2.0"));
    assert_eq!(manifest.policies[2].source, PolicySource::Named);
    assert_eq!(
        manifest.policies[2].version_resolution.as_deref(),
        Some("latest")
    );
}

#[test]
fn parses_gateway_section() {
    let manifest = BuildManifest::parse(FULL_MANIFEST.as_bytes()).expect("valid manifest");
    let gateway = manifest.gateway.expect("gateway section");
    assert_eq!(gateway.version.as_deref(), Some("0.9.0"));
    assert_eq!(
        gateway.images.runtime.as_deref(),
        Some("registry.example.com/runtime:custom")
    );
    assert!(gateway.images.builder.is_none());
}

#[test]
fn rejects_entry_with_both_sources() {
    let yaml = b"version: 1\npolicies:\n  - name: a\n    filePath: ./a\n    gomodule: github.com/x/a\n";
    let err = BuildManifest::parse(yaml).expect_err("both sources rejected");
    assert!(matches!(err, ManifestError::Malformed { .. }));
    let message = err.to_string();
    assert!(message.contains("exactly one of filePath or gomodule"), "{message}");
    assert!(message.contains("index 0"), "{message}");
}

#[rstest]
#[case::not_yaml(b"version: [unterminated".as_slice())]
#[case::wrong_shape(b"policies: 42".as_slice())]
fn rejects_malformed_yaml(#[case] bytes: &[u8]) {
    assert!(matches!(
        BuildManifest::parse(bytes),
        Err(ManifestError::Malformed { .. })
    ));
}

#[test]
fn empty_strings_count_as_absent() {
    let yaml = b"version: 1\npolicies:\n  - name: a\n    filePath: ''\n    gomodule: github.com/x/a\n";
    let manifest = BuildManifest::parse(yaml).expect("valid manifest");
    assert!(manifest.policies[0].source.module_ref().is_some());
}

#[test]
fn missing_name_parses_as_empty() {
    let yaml = b"version: 1\npolicies:\n  - filePath: ./a\n";
    let manifest = BuildManifest::parse(yaml).expect("valid manifest");
    assert!(manifest.policies[0].name.is_empty());
}

#[test]
fn yaml_round_trip_keeps_schema_keys() {
    let manifest = BuildManifest::parse(FULL_MANIFEST.as_bytes()).expect("valid manifest");
    let yaml = manifest.to_yaml().expect("serialise");

    assert!(yaml.contains("filePath: ./policies/ratelimit"), "{yaml}");
    assert!(yaml.contains("gomodule: github.com/acme/cors@v1.2.0"), "{yaml}");
    assert!(yaml.contains("versionResolution: exact"), "{yaml}");
    assert!(!yaml.contains("builder"), "{yaml}");

    let reparsed = BuildManifest::parse(yaml.as_bytes()).expect("reparse");
    assert_eq!(reparsed, manifest);
}

#[test]
fn load_reports_missing_file() {
    let temp = tempfile::TempDir::new().expect("temp dir");
    let root = Utf8PathBuf::try_from(temp.path().to_owned()).expect("non-UTF8 temp path");
    let path = root.join("build.yaml");
    let err = BuildManifest::load(&path).expect_err("missing file");
    assert!(matches!(err, ManifestError::Read { path: p, .. } if p == path));
}

#[rstest]
#[case::relative("./policies/a", "/work/policies/a")]
#[case::absolute("/opt/policies/a", "/opt/policies/a")]
#[case::dotted("./vendor/../policies/./a/", "/work/policies/a")]
#[case::parent("../shared/a", "/shared/a")]
fn resolves_local_paths_against_manifest_dir(#[case] file_path: &str, #[case] expected: &str) {
    let source = PolicySource::Local {
        file_path: file_path.to_owned(),
    };
    let resolved = source.resolve_local(Utf8Path::new("/work")).expect("local source");
    assert_eq!(resolved, Utf8PathBuf::from(expected));
}

#[rstest]
#[case::current("./alias", "alias")]
#[case::only_dots("./.", ".")]
#[case::leading_parents("../../a/./b", "../../a/b")]
#[case::above_root("/../../srv", "/srv")]
#[case::trailing_parent("a/b/..", "a")]
fn clean_path_is_lexical(#[case] input: &str, #[case] expected: &str) {
    assert_eq!(clean_path(Utf8Path::new(input)), Utf8PathBuf::from(expected));
}

#[rstest]
#[case::bare_name("build.yaml", ".")]
#[case::nested("/work/gateway/build.yaml", "/work/gateway")]
fn manifest_dir_of_path(#[case] path: &str, #[case] expected: &str) {
    assert_eq!(manifest_dir(Utf8Path::new(path)), Utf8PathBuf::from(expected));
}
