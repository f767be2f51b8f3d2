//! Entry name normalization.
//!
//! User-supplied names are resolved as relative paths under a synthetic
//! `archive://<archive name>/` base. `a/./b`, `/a//b` and `x/../a/b` all map
//! to the key `archive://<archive name>/a/b`. `..` never climbs above the
//! archive root.
//!
//! The empty key is reserved for the catalog block and is never produced for
//! a user name.

use crate::error::{Error, Result};

/// Scheme prefix of every entry key
pub const SCHEME: &str = "archive://";

/// Key reserved for the catalog block
pub const CATALOG_KEY: &str = "";

/// Canonical path segments of `raw`, with `.`, `..` and empty segments resolved.
///
/// Only `/` separates segments; `\` is an ordinary character.
pub(crate) fn segments(raw: &str) -> Vec<&str> {
    let mut out = Vec::new();
    for segment in raw.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                out.pop();
            }
            s => out.push(s),
        }
    }
    out
}

/// Normalize `raw` into the catalog key used by an archive named `archive_name`.
///
/// Fails with [`Error::InvalidName`] when the name resolves to the archive
/// root, which would collide with the reserved catalog key.
pub fn normalize(raw: &str, archive_name: &str) -> Result<String> {
    let path = segments(raw).join("/");
    if path.is_empty() {
        return Err(Error::InvalidName(raw.to_string()));
    }
    Ok(format!("{SCHEME}{archive_name}/{path}"))
}

/// Reverse [`normalize`], yielding the user-facing relative path.
///
/// Keys without the scheme prefix are returned unchanged. The reserved
/// catalog key maps to an empty string.
pub fn denormalize(key: &str) -> &str {
    match key.strip_prefix(SCHEME) {
        Some(rest) => rest.split_once('/').map_or("", |(_, path)| path),
        None => key,
    }
}

/// Whether a key refers to a user entry rather than the catalog block
pub fn is_listable(key: &str) -> bool {
    !denormalize(key).is_empty()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_equivalent_spellings_share_a_key() {
        let expected = "archive://data/a/b.txt";
        for raw in ["a/b.txt", "/a/b.txt", "./a//b.txt", "x/../a/b.txt"] {
            assert_eq!(normalize(raw, "data").unwrap(), expected, "{raw}");
        }
    }

    #[test]
    fn test_backslash_is_part_of_the_name() {
        assert_eq!(
            normalize("a\\b.txt", "data").unwrap(),
            "archive://data/a\\b.txt"
        );
        assert_ne!(
            normalize("a\\b.txt", "data").unwrap(),
            normalize("a/b.txt", "data").unwrap()
        );
        assert_eq!(
            normalize("..\\x/../y", "data").unwrap(),
            "archive://data/y"
        );
    }

    #[test]
    fn test_parent_segments_stop_at_root() {
        assert_eq!(
            normalize("../../etc/passwd", "data").unwrap(),
            "archive://data/etc/passwd"
        );
    }

    #[test]
    fn test_root_names_are_rejected() {
        for raw in ["", "/", ".", "a/..", "../.."] {
            assert!(
                matches!(normalize(raw, "data"), Err(Error::InvalidName(_))),
                "{raw:?}"
            );
        }
    }

    #[test]
    fn test_denormalize_strips_base() {
        assert_eq!(denormalize("archive://data/a/b.txt"), "a/b.txt");
        assert_eq!(denormalize("archive://data/"), "");
        assert_eq!(denormalize(CATALOG_KEY), "");
        assert_eq!(denormalize("plain/name"), "plain/name");
    }

    #[test]
    fn test_catalog_key_is_not_listable() {
        assert!(!is_listable(CATALOG_KEY));
        assert!(!is_listable("archive://data/"));
        assert!(is_listable("archive://data/notes.txt"));
    }

    proptest! {
        #[test]
        fn prop_normalize_is_idempotent(raw in "[a-z./\\\\]{0,24}") {
            if let Ok(key) = normalize(&raw, "pkg") {
                let again = normalize(denormalize(&key), "pkg").unwrap();
                prop_assert_eq!(again, key);
            }
        }
    }
}
