//! Path validation.
//!
//! Asset paths come from remote manifests and bundle records, so every path
//! is normalised and checked before it touches the output tree.

use crate::error::{ErrorKind, Result};
use std::path::{Component, Path, PathBuf};

/// Normalise a relative storage path, rejecting anything that would escape
/// the output root.
///
/// `.` components and repeated or trailing separators are dropped, `..`
/// pops the previous component, and a leading `/` is ignored. Null bytes,
/// platform prefixes, empty paths and traversal above the root are
/// [`InvalidPath`](crate::error::ErrorKind::InvalidPath).
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use sanity_storage::validate_path;
/// assert!(validate_path("cn/chararts/char_002_amiya.ab").is_ok());
/// assert!(validate_path("cn/../en/a.ab").is_ok());
/// assert!(validate_path("../etc/passwd").is_err());
/// assert!(validate_path("cn/../../b").is_err());
/// assert_eq!(
///     validate_path("/cn//./arts/../chararts/a.png/").unwrap(),
///     Path::new("cn/chararts/a.png")
/// );
/// ```
pub fn validate(path: impl AsRef<Path>) -> Result<PathBuf> {
    let original = path.as_ref();
    let invalid = || exn::Exn::from(ErrorKind::InvalidPath(original.to_path_buf()));
    let mut components = Vec::new();
    for component in original.components() {
        match component {
            Component::Normal(part) => {
                // Unix paths may carry NUL bytes that syscalls would truncate at.
                if part.as_encoded_bytes().contains(&0) {
                    return Err(invalid());
                }
                components.push(part);
            },
            Component::CurDir | Component::RootDir => {},
            Component::Prefix(_) => return Err(invalid()),
            Component::ParentDir => {
                components.pop().ok_or_else(invalid)?;
            },
        }
    }
    if components.is_empty() {
        return Err(invalid());
    }
    Ok(components.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("cn/chararts/a.ab", "cn/chararts/a.ab")]
    #[case("a//b//c", "a/b/c")]
    #[case("a/./b/./c", "a/b/c")]
    #[case("a/b/..", "a")]
    #[case("/cn/a.png", "cn/a.png")]
    #[case("cn/arts/", "cn/arts")]
    #[case("cn/portraits#0.json", "cn/portraits#0.json")]
    fn test_valid(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(validate(input).unwrap(), Path::new(expected));
    }

    #[rstest]
    #[case("../etc/passwd")]
    #[case("a/../../b")]
    #[case("..")]
    #[case("")]
    #[case(".")]
    #[case("./.")]
    #[case("//")]
    #[case("a\0b")]
    fn test_invalid(#[case] input: &str) {
        let err = validate(input).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidPath(_)));
    }
}
