//! Reading the declared module path from a `go.mod` descriptor.

use camino::Utf8Path;
use std::fs;

/// File name of a module descriptor.
pub const MODULE_DESCRIPTOR_FILE: &str = "go.mod";

/// Read the `module` directive from the descriptor at `path`.
///
/// Returns `None` when the file cannot be read or declares no module.
#[must_use]
pub fn read_module_path(path: &Utf8Path) -> Option<String> {
    match fs::read_to_string(path) {
        Ok(contents) => parse_module_path(&contents),
        Err(err) => {
            log::debug!("cannot read module descriptor {path}: {err}");
            None
        }
    }
}

/// Extract the module path from descriptor text.
///
/// Accepts bare, double-quoted, and back-quoted paths and ignores `//`
/// comments.
///
/// # Examples
///
/// ```
/// use policy_builder::lock::module_descriptor::parse_module_path;
///
/// let go_mod = "// ratelimit policy\nmodule github.com/acme/ratelimit\n\ngo 1.22\n";
/// assert_eq!(
///     parse_module_path(go_mod).as_deref(),
///     Some("github.com/acme/ratelimit")
/// );
/// ```
#[must_use]
pub fn parse_module_path(contents: &str) -> Option<String> {
    contents.lines().find_map(|line| {
        let line = line.split("//").next().unwrap_or_default().trim();
        let rest = line.strip_prefix("module")?;
        if !rest.starts_with(char::is_whitespace) {
            return None;
        }
        let path = rest.trim().trim_matches(|c| c == '"' || c == '`');
        (!path.is_empty()).then(|| path.to_owned())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::bare("module github.com/x/y\n", Some("github.com/x/y"))]
    #[case::quoted("module \"github.com/x/y\"\n", Some("github.com/x/y"))]
    #[case::backquoted("module `github.com/x/y`\n", Some("github.com/x/y"))]
    #[case::trailing_comment("module github.com/x/y // policy\n", Some("github.com/x/y"))]
    #[case::after_comments("// header\n\nmodule github.com/x/y\ngo 1.22\n", Some("github.com/x/y"))]
    #[case::commented_out("// module github.com/x/y\n", None)]
    #[case::lookalike("modules github.com/x/y\n", None)]
    #[case::missing("go 1.22\n", None)]
    fn parses_module_directive(#[case] contents: &str, #[case] expected: Option<&str>) {
        assert_eq!(parse_module_path(contents).as_deref(), expected);
    }

    #[test]
    fn unreadable_descriptor_is_none() {
        let temp = tempfile::TempDir::new().expect("temp dir");
        let root = camino::Utf8PathBuf::try_from(temp.path().to_owned()).expect("non-UTF8 temp path");
        assert!(read_module_path(&root.join(MODULE_DESCRIPTOR_FILE)).is_none());
    }
}
