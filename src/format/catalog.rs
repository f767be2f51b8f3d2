use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::name;
use crate::error::{Error, Result};

/// Location of one compressed block inside the archive file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryLocation {
    /// Absolute offset of the first compressed byte
    pub start: u64,
    /// Length of the compressed block
    pub length: u64,
}

/// Mapping from normalized entry key to block location.
///
/// Serialized as JSON:
///
/// ```text
/// {"name":"assets","entries":{"archive://assets/a.txt":{"start":24,"length":31}}}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(rename = "name")]
    archive_name: String,
    #[serde(default)]
    entries: BTreeMap<String, EntryLocation>,
}

impl Catalog {
    /// Create an empty catalog.
    ///
    /// A `/` in `archive_name` is replaced with `_` so the name stays a
    /// single segment of every entry key.
    pub fn new(archive_name: &str) -> Self {
        Self {
            archive_name: archive_name.replace('/', "_"),
            entries: BTreeMap::new(),
        }
    }

    pub fn archive_name(&self) -> &str {
        &self.archive_name
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Normalize a user-supplied name against this catalog's archive name
    pub fn key_for(&self, raw: &str) -> Result<String> {
        name::normalize(raw, &self.archive_name)
    }

    /// Look up a normalized key
    pub fn lookup(&self, key: &str) -> Result<EntryLocation> {
        self.entries
            .get(key)
            .copied()
            .ok_or_else(|| Error::EntryNotFound(name::denormalize(key).to_string()))
    }

    /// Record a block for `key`, replacing any previous location
    pub fn insert(&mut self, key: String, start: u64, length: u64) {
        self.entries.insert(key, EntryLocation { start, length });
    }

    /// All entries as `(key, location)` in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, EntryLocation)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// User-facing entry names, excluding the catalog block itself
    pub fn names(&self) -> Vec<String> {
        self.entries
            .keys()
            .filter(|key| name::is_listable(key))
            .map(|key| name::denormalize(key).to_string())
            .collect()
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_json(data: &[u8]) -> Result<Self> {
        serde_json::from_slice(data).map_err(|e| Error::CatalogCorrupt(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn test_lookup_and_insert() {
        let mut catalog = Catalog::new("assets");
        let key = catalog.key_for("img/logo.png").unwrap();
        catalog.insert(key.clone(), 24, 100);

        assert_eq!(
            catalog.lookup(&key).unwrap(),
            EntryLocation {
                start: 24,
                length: 100
            }
        );
        assert!(matches!(
            catalog.lookup("archive://assets/missing"),
            Err(Error::EntryNotFound(name)) if name == "missing"
        ));
    }

    #[test]
    fn test_insert_last_write_wins() {
        let mut catalog = Catalog::new("assets");
        let key = catalog.key_for("a").unwrap();
        catalog.insert(key.clone(), 24, 10);
        catalog.insert(key.clone(), 34, 12);
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.lookup(&key).unwrap().start, 34);
    }

    #[test]
    fn test_names_skip_catalog_key() {
        let mut catalog = Catalog::new("assets");
        catalog.insert(catalog.key_for("b/c").unwrap(), 40, 1);
        catalog.insert(catalog.key_for("a").unwrap(), 24, 16);
        catalog.insert(name::CATALOG_KEY.to_string(), 41, 9);
        assert_eq!(catalog.names(), vec!["a".to_string(), "b/c".to_string()]);
    }

    #[test]
    fn test_json_layout() {
        let mut catalog = Catalog::new("assets");
        catalog.insert(catalog.key_for("a.txt").unwrap(), 24, 31);
        let text = String::from_utf8(catalog.to_json().unwrap()).unwrap();
        assert_eq!(
            text,
            r#"{"name":"assets","entries":{"archive://assets/a.txt":{"start":24,"length":31}}}"#
        );
    }

    #[test]
    fn test_archive_name_separators_replaced() {
        assert_eq!(Catalog::new("a/b\\c").archive_name(), "a_b\\c");
    }

    #[test]
    fn test_malformed_catalog_rejected() {
        for bad in [&b"not json"[..], b"{\"entries\":{}}", b"{\"name\":1}", b""] {
            assert!(matches!(
                Catalog::from_json(bad),
                Err(Error::CatalogCorrupt(_))
            ));
        }
    }

    proptest! {
        #[test]
        fn prop_catalog_round_trip(
            archive_name in "[a-z]{1,8}",
            entries in proptest::collection::btree_map(
                "[a-z/]{1,16}",
                (any::<u64>(), any::<u64>()),
                0..16,
            ),
        ) {
            let mut catalog = Catalog::new(&archive_name);
            for (raw, (start, length)) in entries {
                if let Ok(key) = catalog.key_for(&raw) {
                    catalog.insert(key, start, length);
                }
            }
            let decoded = Catalog::from_json(&catalog.to_json().unwrap()).unwrap();
            prop_assert_eq!(decoded, catalog);
        }
    }
}
