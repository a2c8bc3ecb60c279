//! Path/key model
//!
//! Hierarchical paths are emulated over flat keyspaces. A key is an opaque
//! string of `/`-separated segments with no leading, trailing or repeated
//! separators. A folder path is either empty (the root) or a key followed
//! by exactly one trailing separator, so that prefix matching never confuses
//! `a/` with `ab/`.
//!
//! No `.`/`..` resolution and no case folding is performed.

/// Segment separator
pub const SEPARATOR: char = '/';

/// Join `relative` onto `base`, collapsing repeated separators and dropping
/// leading/trailing ones.
///
/// ```
/// use backstow_storage::path::join;
/// assert_eq!(join("backups/", "/b1.json"), "backups/b1.json");
/// assert_eq!(join("a//b", "c/"), "a/b/c");
/// assert_eq!(join("", ""), "");
/// ```
pub fn join(base: &str, relative: &str) -> String {
    let mut out = String::with_capacity(base.len() + relative.len() + 1);
    for segment in segments(base).chain(segments(relative)) {
        if !out.is_empty() {
            out.push(SEPARATOR);
        }
        out.push_str(segment);
    }
    out
}

/// Normalize a folder path: segments joined by `/` with one trailing `/`,
/// or the empty string for the root.
pub fn normalize_dir(path: &str) -> String {
    let mut dir = join("", path);
    if !dir.is_empty() {
        dir.push(SEPARATOR);
    }
    dir
}

/// Join `relative` onto a folder path and return a normalized folder path
pub fn join_dir(base: &str, relative: &str) -> String {
    normalize_dir(&join(base, relative))
}

/// Strip `base` from `full`.
///
/// Defined only when `base` is a literal, case-sensitive prefix of `full`.
pub fn relative_to<'a>(base: &str, full: &'a str) -> Option<&'a str> {
    full.strip_prefix(base)
}

/// Iterate the non-empty segments of a path
pub fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split(SEPARATOR).filter(|s| !s.is_empty())
}

/// Where a key sits relative to a folder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Child<'a> {
    /// Directly inside the folder, with this name
    Object(&'a str),
    /// Inside the immediate sub-folder with this name
    Folder(&'a str),
}

/// Classify the remainder of a key after its folder prefix.
///
/// Returns `None` when nothing names a child (empty remainder).
pub fn classify(rest: &str) -> Option<Child<'_>> {
    let rest = rest.trim_start_matches(SEPARATOR);
    if rest.is_empty() {
        return None;
    }
    match rest.split_once(SEPARATOR) {
        Some((folder, _)) => Some(Child::Folder(folder)),
        None => Some(Child::Object(rest)),
    }
}

/// Directory part of a prefix: everything up to and including its last `/`
pub fn dir_prefix(prefix: &str) -> &str {
    match prefix.rfind(SEPARATOR) {
        Some(i) => &prefix[..=i],
        None => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    #[rstest]
    #[case("", "", "")]
    #[case("a/", "", "a")]
    #[case("a/", "b", "a/b")]
    #[case("a", "/b", "a/b")]
    #[case("a//", "//b//c//", "a/b/c")]
    #[case("/abs/", "x", "abs/x")]
    #[case("", "backups/b1.json", "backups/b1.json")]
    fn test_join(#[case] base: &str, #[case] rel: &str, #[case] expected: &str) {
        assert_eq!(join(base, rel), expected);
    }

    #[rstest]
    #[case("", "")]
    #[case("/", "")]
    #[case("a", "a/")]
    #[case("a/", "a/")]
    #[case("/a//b", "a/b/")]
    fn test_normalize_dir(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(normalize_dir(input), expected);
    }

    #[test]
    fn test_relative_to() {
        assert_eq!(relative_to("a/", "a/b/c"), Some("b/c"));
        assert_eq!(relative_to("a/", "ab/c"), None);
        assert_eq!(relative_to("A/", "a/b"), None);
        assert_eq!(relative_to("", "x"), Some("x"));
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify("b1.json"), Some(Child::Object("b1.json")));
        assert_eq!(classify("backups/b1.json"), Some(Child::Folder("backups")));
        assert_eq!(classify("x/y/z"), Some(Child::Folder("x")));
        assert_eq!(classify(""), None);
    }

    #[test]
    fn test_dir_prefix() {
        assert_eq!(dir_prefix("a/b/c"), "a/b/");
        assert_eq!(dir_prefix("a/b/"), "a/b/");
        assert_eq!(dir_prefix("abc"), "");
    }

    fn segment() -> impl Strategy<Value = String> {
        "[a-z0-9._-]{1,8}"
    }

    fn rel_path() -> impl Strategy<Value = String> {
        proptest::collection::vec(segment(), 0..4).prop_map(|s| s.join("/"))
    }

    proptest! {
        #[test]
        fn prop_nested_join_is_associative(a in rel_path(), b in rel_path(), c in rel_path()) {
            prop_assert_eq!(join(&join(&a, &b), &c), join(&a, &join(&b, &c)));
        }

        #[test]
        fn prop_join_dir_composes(a in rel_path(), b in rel_path()) {
            prop_assert_eq!(join_dir(&join_dir("", &a), &b), join_dir("", &join(&a, &b)));
        }

        #[test]
        fn prop_relative_to_inverts_join(base in rel_path(), rel in rel_path()) {
            let dir = normalize_dir(&base);
            let full = join(&dir, &rel);
            let expected = join("", &rel);
            if !expected.is_empty() {
                prop_assert_eq!(relative_to(&dir, &full), Some(expected.as_str()));
            }
        }

        #[test]
        fn prop_leading_separator_never_escapes(base in rel_path(), rel in rel_path()) {
            let dir = normalize_dir(&base);
            let joined = join(&dir, &format!("/{}", rel));
            prop_assert!(joined.starts_with(dir.trim_end_matches('/')));
        }
    }
}
